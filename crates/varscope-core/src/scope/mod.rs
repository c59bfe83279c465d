// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Variable scopes.
//!
//! A [`VariableScope`] is an immutable record of the defaults that apply to
//! variables created under one path. Scopes are derived from their parent on
//! entry by [`ScopeStore`] and never change afterwards; the store simply swaps
//! which scope is current.

mod allocator;
mod options;
mod stack;

pub use allocator::ScopeNameAllocator;
pub use options::{ScopeOptions, VariableOptions};
pub use stack::ScopeStore;

use crate::config::RootDefaults;
use crate::error::{Error, Result};
use crate::getter::GetterChain;
use crate::init::{Initializer, Regularizer};
use crate::naming::{NamingContext, join};
use crate::partition::Partitioner;
use crate::reuse::Reuse;
use crate::store::VariableStore;
use crate::types::DataType;
use crate::variable::{CachingDevice, PartitionedVariable, Variable, VariableRequest, collections};
use std::fmt;
use std::rc::Rc;
use tracing::debug;
use varscope_macros::{defer, ensure};

/// Defaults for variables created under one scope path.
#[derive(Clone, Default)]
pub struct VariableScope {
    reuse: Reuse,
    full_name: String,
    name_scope: String,
    data_type: Option<DataType>,
    initializer: Option<Initializer>,
    regularizer: Option<Regularizer>,
    partitioner: Option<Rc<dyn Partitioner>>,
    caching_device: Option<CachingDevice>,
    getter: Option<GetterChain>,
}

impl VariableScope {
    /// The root scope: empty name, create-only, no defaults.
    pub fn root() -> Self {
        Self::default()
    }

    /// A root scope carrying configured defaults.
    pub fn from_config(defaults: &RootDefaults) -> Self {
        Self {
            reuse: defaults.reuse,
            data_type: defaults.data_type,
            initializer: defaults.initializer.clone(),
            regularizer: defaults.regularizer,
            ..Self::default()
        }
    }

    /// Derives the scope entered at `full_name` from `self`.
    ///
    /// Every override that is set replaces the inherited value; the getter is
    /// linked in front of the inherited chain.
    pub(crate) fn derive(&self, full_name: String, name_scope: String, options: ScopeOptions) -> Self {
        Self {
            reuse: options.reuse.unwrap_or(self.reuse),
            full_name,
            name_scope,
            data_type: options.data_type.or(self.data_type),
            initializer: options.initializer.or_else(|| self.initializer.clone()),
            regularizer: options.regularizer.or(self.regularizer),
            partitioner: options.partitioner.or_else(|| self.partitioner.clone()),
            caching_device: options.caching_device.or_else(|| self.caching_device.clone()),
            getter: GetterChain::compose(options.getter, self.getter.clone()),
        }
    }

    /// Slash-joined path of this scope, empty at the root.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Naming segment recorded when the scope was entered.
    pub fn name_scope(&self) -> &str {
        &self.name_scope
    }

    /// Reuse mode.
    pub fn reuse(&self) -> Reuse {
        self.reuse
    }

    /// Default data type, if any.
    pub fn data_type(&self) -> Option<DataType> {
        self.data_type
    }

    /// Default initializer, if any.
    pub fn initializer(&self) -> Option<&Initializer> {
        self.initializer.as_ref()
    }

    /// Default regularizer, if any.
    pub fn regularizer(&self) -> Option<Regularizer> {
        self.regularizer
    }

    /// Default partitioner, if any.
    pub fn partitioner(&self) -> Option<&Rc<dyn Partitioner>> {
        self.partitioner.as_ref()
    }

    /// Default caching device function, if any.
    pub fn caching_device(&self) -> Option<&CachingDevice> {
        self.caching_device.as_ref()
    }

    /// Getter chain active in this scope, if any.
    pub fn getter(&self) -> Option<&GetterChain> {
        self.getter.as_ref()
    }

    /// Resolves `name` under this scope.
    ///
    /// The naming context is suspended while the request travels through the
    /// getter chain and the store, so anything they name lands at the root.
    pub fn resolve(
        &self,
        naming: &dyn NamingContext,
        store: &dyn VariableStore,
        name: &str,
        options: VariableOptions,
    ) -> Result<Variable> {
        ensure!(!name.is_empty(), "Variable name must not be empty");
        let request = self.request(name, options);
        debug!(name = %request.name, reuse = %request.reuse, "resolving variable");

        let saved = naming.suspend();
        defer!(naming.restore(saved));
        match &self.getter {
            Some(chain) => chain.invoke(store, request),
            None => store.get_variable(&request),
        }
    }

    /// Resolves `name` as a partitioned variable.
    ///
    /// Uses the partitioner from `options`, falling back to the scope's.
    /// Custom getters cannot intercept slices, so the call fails while one is
    /// active.
    pub fn resolve_partitioned(
        &self,
        naming: &dyn NamingContext,
        store: &dyn VariableStore,
        name: &str,
        mut options: VariableOptions,
    ) -> Result<PartitionedVariable> {
        ensure!(!name.is_empty(), "Variable name must not be empty");
        ensure!(
            self.getter.is_none(),
            "Partitioned variable '{}' cannot be resolved while a custom getter is active",
            join(&self.full_name, name)
        );
        let partitioner = options
            .partitioner
            .take()
            .or_else(|| self.partitioner.clone())
            .ok_or_else(|| {
                Error::argument(format!(
                    "Partitioned variable '{}' requires a partitioner",
                    join(&self.full_name, name)
                ))
            })?;
        let request = self.request(name, options);
        debug!(name = %request.name, "resolving partitioned variable");

        let saved = naming.suspend();
        defer!(naming.restore(saved));
        store.get_partitioned_variable(&request, partitioner.as_ref())
    }

    /// Resolves `name` as a local variable: not trainable, and a member of
    /// the local collection instead of the global one.
    pub fn resolve_local(
        &self,
        naming: &dyn NamingContext,
        store: &dyn VariableStore,
        name: &str,
        options: VariableOptions,
    ) -> Result<Variable> {
        let options = options
            .trainable(false)
            .collection(collections::LOCAL_VARIABLES);
        self.resolve(naming, store, name, options)
    }

    fn request(&self, name: &str, options: VariableOptions) -> VariableRequest {
        VariableRequest {
            name: join(&self.full_name, name),
            data_type: options.data_type.or(self.data_type),
            shape: options.shape,
            initializer: options.initializer.or_else(|| self.initializer.clone()),
            regularizer: options.regularizer.or(self.regularizer),
            trainable: options.trainable.unwrap_or(true),
            reuse: options.reuse.unwrap_or(self.reuse),
            collections: options.collections,
            caching_device: options.caching_device.or_else(|| self.caching_device.clone()),
        }
    }
}

impl fmt::Debug for VariableScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableScope")
            .field("full_name", &self.full_name)
            .field("name_scope", &self.name_scope)
            .field("reuse", &self.reuse)
            .field("data_type", &self.data_type)
            .field("initializer", &self.initializer)
            .field("regularizer", &self.regularizer)
            .field("partitioner", &self.partitioner.is_some())
            .field("caching_device", &self.caching_device.is_some())
            .field("getter", &self.getter)
            .finish()
    }
}
