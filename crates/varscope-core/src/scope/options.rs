// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Builder-style arguments for scope entry and variable resolution.
//!
//! Every field is optional; an unset field means "take the value from the
//! enclosing scope".

use crate::getter::VariableGetter;
use crate::init::{Initializer, Regularizer};
use crate::partition::Partitioner;
use crate::reuse::Reuse;
use crate::types::{DataType, Shape};
use crate::variable::CachingDevice;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

/// Overrides applied when entering a scope.
#[derive(Clone, Default)]
pub struct ScopeOptions {
    pub(crate) reuse: Option<Reuse>,
    pub(crate) data_type: Option<DataType>,
    pub(crate) initializer: Option<Initializer>,
    pub(crate) regularizer: Option<Regularizer>,
    pub(crate) partitioner: Option<Rc<dyn Partitioner>>,
    pub(crate) caching_device: Option<CachingDevice>,
    pub(crate) getter: Option<Rc<dyn VariableGetter>>,
    pub(crate) default_name: bool,
    pub(crate) pure_naming: bool,
}

impl ScopeOptions {
    /// No overrides: everything is inherited.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reuse mode of the new scope.
    ///
    /// Any value set here replaces the parent's mode, including
    /// [`Reuse::ReuseOrCreateNew`]. Leave it unset to inherit.
    pub fn reuse(mut self, reuse: Reuse) -> Self {
        self.reuse = Some(reuse);
        self
    }

    /// Sets the default data type.
    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    /// Sets the default initializer.
    pub fn initializer(mut self, initializer: Initializer) -> Self {
        self.initializer = Some(initializer);
        self
    }

    /// Sets the default regularizer.
    pub fn regularizer(mut self, regularizer: Regularizer) -> Self {
        self.regularizer = Some(regularizer);
        self
    }

    /// Sets the default partitioner.
    pub fn partitioner(mut self, partitioner: impl Partitioner + 'static) -> Self {
        self.partitioner = Some(Rc::new(partitioner));
        self
    }

    /// Sets the default caching device function.
    pub fn caching_device(mut self, device: impl Fn(&str) -> String + 'static) -> Self {
        self.caching_device = Some(Rc::new(device));
        self
    }

    /// Installs a custom getter in front of the inherited chain.
    pub fn getter(mut self, getter: Rc<dyn VariableGetter>) -> Self {
        self.getter = Some(getter);
        self
    }

    /// Treats the scope name as a prefix to make unique (`name`, `name_1`, ...).
    pub fn default_name(mut self) -> Self {
        self.default_name = true;
        self
    }

    /// Runs the block without opening a matching naming context.
    pub fn pure_naming(mut self) -> Self {
        self.pure_naming = true;
        self
    }
}

impl fmt::Debug for ScopeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeOptions")
            .field("reuse", &self.reuse)
            .field("data_type", &self.data_type)
            .field("initializer", &self.initializer)
            .field("regularizer", &self.regularizer)
            .field("partitioner", &self.partitioner.is_some())
            .field("caching_device", &self.caching_device.is_some())
            .field("getter", &self.getter.is_some())
            .field("default_name", &self.default_name)
            .field("pure_naming", &self.pure_naming)
            .finish()
    }
}

/// Arguments of a single variable resolution.
#[derive(Clone, Default)]
pub struct VariableOptions {
    pub(crate) data_type: Option<DataType>,
    pub(crate) shape: Option<Shape>,
    pub(crate) initializer: Option<Initializer>,
    pub(crate) regularizer: Option<Regularizer>,
    pub(crate) trainable: Option<bool>,
    pub(crate) reuse: Option<Reuse>,
    pub(crate) collections: BTreeSet<String>,
    pub(crate) caching_device: Option<CachingDevice>,
    pub(crate) partitioner: Option<Rc<dyn Partitioner>>,
}

impl VariableOptions {
    /// No arguments: everything comes from the scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the data type.
    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    /// Sets the shape.
    pub fn shape(mut self, shape: impl Into<Shape>) -> Self {
        self.shape = Some(shape.into());
        self
    }

    /// Sets the initializer.
    pub fn initializer(mut self, initializer: Initializer) -> Self {
        self.initializer = Some(initializer);
        self
    }

    /// Sets the regularizer.
    pub fn regularizer(mut self, regularizer: Regularizer) -> Self {
        self.regularizer = Some(regularizer);
        self
    }

    /// Sets whether a new variable is trainable (default true).
    pub fn trainable(mut self, trainable: bool) -> Self {
        self.trainable = Some(trainable);
        self
    }

    /// Overrides the scope's reuse mode for this lookup.
    pub fn reuse(mut self, reuse: Reuse) -> Self {
        self.reuse = Some(reuse);
        self
    }

    /// Adds a collection for a new variable.
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collections.insert(collection.into());
        self
    }

    /// Sets the caching device function.
    pub fn caching_device(mut self, device: impl Fn(&str) -> String + 'static) -> Self {
        self.caching_device = Some(Rc::new(device));
        self
    }

    /// Sets the partitioner used by partitioned resolution.
    pub fn partitioner(mut self, partitioner: impl Partitioner + 'static) -> Self {
        self.partitioner = Some(Rc::new(partitioner));
        self
    }
}

impl fmt::Debug for VariableOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableOptions")
            .field("data_type", &self.data_type)
            .field("shape", &self.shape)
            .field("initializer", &self.initializer)
            .field("regularizer", &self.regularizer)
            .field("trainable", &self.trainable)
            .field("reuse", &self.reuse)
            .field("collections", &self.collections)
            .field("caching_device", &self.caching_device.is_some())
            .field("partitioner", &self.partitioner.is_some())
            .finish()
    }
}
