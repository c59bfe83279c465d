// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The scope store: current scope, open counts and naming context of one
//! logical thread of scope entry.

use super::allocator::ScopeNameAllocator;
use super::options::{ScopeOptions, VariableOptions};
use super::VariableScope;
use crate::config::ScopeConfig;
use crate::error::{Error, Result};
use crate::naming::{NameScopeStack, NamingContext, join};
use crate::reuse::Reuse;
use crate::store::VariableStore;
use crate::variable::{PartitionedVariable, Variable};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace};
use varscope_macros::defer;

/// Tracks the current [`VariableScope`] and restores it when a scoped block
/// ends, whether the block returns, fails or panics.
///
/// A store is single-threaded (`!Send`); independent threads of graph
/// construction each use their own.
pub struct ScopeStore {
    current: RefCell<VariableScope>,
    counters: RefCell<ScopeNameAllocator>,
    naming: Rc<dyn NamingContext>,
}

impl ScopeStore {
    /// Creates a store positioned at a default root scope.
    pub fn new() -> Self {
        Self::with_config(&ScopeConfig::default())
    }

    /// Creates a store whose root scope carries the configured defaults.
    pub fn with_config(config: &ScopeConfig) -> Self {
        Self {
            current: RefCell::new(VariableScope::from_config(&config.root)),
            counters: RefCell::new(ScopeNameAllocator::new()),
            naming: Rc::new(NameScopeStack::new()),
        }
    }

    /// Replaces the naming context.
    pub fn with_naming(mut self, naming: Rc<dyn NamingContext>) -> Self {
        self.naming = naming;
        self
    }

    /// The current scope.
    pub fn current(&self) -> VariableScope {
        self.current.borrow().clone()
    }

    /// The naming context.
    pub fn naming(&self) -> &dyn NamingContext {
        self.naming.as_ref()
    }

    /// How often the scope at `full_name` has been opened since its parent
    /// was last closed.
    pub fn scope_count(&self, full_name: &str) -> usize {
        self.counters.borrow().count(full_name)
    }

    /// The local name a default-named scope entered now would receive.
    pub fn unique_name(&self, prefix: &str) -> String {
        let current = self.current.borrow();
        self.counters.borrow().unique(prefix, current.full_name())
    }

    /// Runs `block` inside naming segment `segment`.
    pub fn with_naming_context<R>(&self, segment: &str, block: impl FnOnce() -> R) -> R {
        let previous = self.naming.push(segment);
        defer!(self.naming.restore(previous));
        block()
    }

    /// Enters the child scope `name` of the current scope, runs `block`, and
    /// restores the previous scope.
    ///
    /// With [`ScopeOptions::default_name`], `name` is a prefix and the scope
    /// gets the first unused name among `name`, `name_1`, `name_2`, ...
    /// Counts below the entered scope are cleared on exit, so re-entering the
    /// same path restarts default names beneath it.
    pub fn enter<T, E, F>(&self, name: &str, options: ScopeOptions, block: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&ScopeStore) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        if options.default_name && options.reuse == Some(Reuse::ReuseExistingOnly) {
            return Err(Error::argument(format!(
                "Scope '{}' has a default name, which cannot be combined with reuse '{}'",
                name,
                Reuse::ReuseExistingOnly
            ))
            .into());
        }

        let local = if options.default_name {
            self.unique_name(name)
        } else {
            name.to_string()
        };
        let pure_naming = options.pure_naming;
        let scope = {
            let parent = self.current.borrow();
            let full_name = join(parent.full_name(), &local);
            parent.derive(full_name, local.clone(), options)
        };
        let full_name = scope.full_name().to_string();

        // An empty name stays at the parent's path, which is still open.
        let owns_path = !local.is_empty();
        if owns_path {
            let opened = self.counters.borrow_mut().open(&full_name);
            debug!(scope = %full_name, count = opened, "entering variable scope");
        } else {
            debug!(scope = %full_name, "entering variable scope without a new path");
        }
        let previous = self.current.replace(scope);
        defer!(self.leave(&full_name, owns_path, previous));

        if pure_naming {
            block(self)
        } else {
            self.with_naming_context(&local, || block(self))
        }
    }

    /// Re-enters an existing scope object, with optional overrides, runs
    /// `block`, and restores the previous scope.
    ///
    /// The scope keeps its own full name regardless of the current scope.
    /// The whole counter table is restored on exit to what it was right after
    /// the scope was opened.
    pub fn enter_with_scope<T, E, F>(
        &self,
        scope: &VariableScope,
        options: ScopeOptions,
        block: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(&ScopeStore) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        if options.default_name {
            return Err(Error::argument(format!(
                "A default name cannot be used when re-entering scope '{}'",
                scope.full_name()
            ))
            .into());
        }

        let full_name = scope.full_name().to_string();
        let segment = full_name.rsplit('/').next().unwrap_or("").to_string();
        let pure_naming = options.pure_naming;
        let entered = scope.derive(full_name.clone(), scope.name_scope().to_string(), options);

        let snapshot = {
            let mut counters = self.counters.borrow_mut();
            counters.open(&full_name);
            counters.clone()
        };
        debug!(scope = %full_name, "re-entering variable scope");
        let previous = self.current.replace(entered);
        defer!(self.restore(&full_name, snapshot, previous));

        if pure_naming {
            block(self)
        } else {
            self.with_naming_context(&segment, || block(self))
        }
    }

    /// Resolves `name` in the current scope.
    pub fn get_variable(
        &self,
        store: &dyn VariableStore,
        name: &str,
        options: VariableOptions,
    ) -> Result<Variable> {
        self.current().resolve(self.naming(), store, name, options)
    }

    /// Resolves `name` as a partitioned variable in the current scope.
    pub fn get_partitioned_variable(
        &self,
        store: &dyn VariableStore,
        name: &str,
        options: VariableOptions,
    ) -> Result<PartitionedVariable> {
        self.current()
            .resolve_partitioned(self.naming(), store, name, options)
    }

    /// Resolves `name` as a local variable in the current scope.
    pub fn get_local_variable(
        &self,
        store: &dyn VariableStore,
        name: &str,
        options: VariableOptions,
    ) -> Result<Variable> {
        self.current().resolve_local(self.naming(), store, name, options)
    }

    fn leave(&self, full_name: &str, owns_path: bool, previous: VariableScope) {
        if owns_path {
            self.counters.borrow_mut().close_descendants(full_name);
        }
        self.current.replace(previous);
        trace!(scope = %full_name, "left variable scope");
    }

    fn restore(&self, full_name: &str, snapshot: ScopeNameAllocator, previous: VariableScope) {
        *self.counters.borrow_mut() = snapshot;
        self.current.replace(previous);
        trace!(scope = %full_name, "left re-entered variable scope");
    }
}

impl Default for ScopeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ScopeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeStore")
            .field("current", &self.current.borrow().full_name())
            .field("counters", &self.counters.borrow().len())
            .field("naming", &self.naming.current())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::DataType;

    fn ok<T>(value: T) -> Result<T> {
        Ok(value)
    }

    #[test]
    fn test_enter_sets_and_restores_current() {
        let scopes = ScopeStore::new();
        let inner = scopes
            .enter("a", ScopeOptions::new(), |s| {
                s.enter("b", ScopeOptions::new(), |s| ok(s.current().full_name().to_string()))
            })
            .unwrap();
        assert_eq!(inner, "a/b");
        assert_eq!(scopes.current().full_name(), "");
    }

    #[test]
    fn test_enter_restores_on_error() {
        let scopes = ScopeStore::new();
        let result: Result<()> = scopes.enter("a", ScopeOptions::new(), |_| {
            Err(Error::argument("block failed"))
        });
        assert!(result.is_err());
        assert_eq!(scopes.current().full_name(), "");
        assert_eq!(scopes.naming().current(), "");
    }

    #[test]
    fn test_enter_restores_on_panic() {
        let scopes = ScopeStore::new();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<()> = scopes.enter("a", ScopeOptions::new(), |s| {
                s.enter("b", ScopeOptions::new(), |_| -> Result<()> { panic!("boom") })
            });
        }));
        assert!(outcome.is_err());
        assert_eq!(scopes.current().full_name(), "");
        assert_eq!(scopes.naming().current(), "");
        assert_eq!(scopes.scope_count("a/b"), 0);
    }

    #[test]
    fn test_default_name_rejects_reuse_existing_only() {
        let scopes = ScopeStore::new();
        let ran = std::cell::Cell::new(false);
        let result: Result<()> = scopes.enter(
            "layer",
            ScopeOptions::new().default_name().reuse(Reuse::ReuseExistingOnly),
            |_| {
                ran.set(true);
                Ok(())
            },
        );
        assert!(result.unwrap_err().is_argument());
        assert!(!ran.get());
        assert_eq!(scopes.scope_count("layer"), 0);
    }

    #[test]
    fn test_default_names_are_unique() {
        let scopes = ScopeStore::new();
        let names: Vec<String> = (0..3)
            .map(|_| {
                scopes
                    .enter("layer", ScopeOptions::new().default_name(), |s| {
                        ok(s.current().full_name().to_string())
                    })
                    .unwrap()
            })
            .collect();
        assert_eq!(names, vec!["layer", "layer_1", "layer_2"]);
    }

    #[test]
    fn test_empty_name_does_not_open_parent_again() {
        let scopes = ScopeStore::new();
        scopes
            .enter("a", ScopeOptions::new(), |s| {
                s.enter("x", ScopeOptions::new(), |_| ok(()))?;
                s.enter("", ScopeOptions::new(), |s| {
                    assert_eq!(s.current().full_name(), "a");
                    ok(())
                })?;
                assert_eq!(s.scope_count("a"), 1);
                assert_eq!(s.scope_count("a/x"), 1);
                ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_pure_naming_skips_naming_context() {
        let scopes = ScopeStore::new();
        let prefix = scopes
            .enter("a", ScopeOptions::new().pure_naming(), |s| ok(s.naming().current()))
            .unwrap();
        assert_eq!(prefix, "");

        let prefix = scopes
            .enter("a", ScopeOptions::new(), |s| ok(s.naming().current()))
            .unwrap();
        assert_eq!(prefix, "a");
    }

    #[test]
    fn test_enter_with_scope_rejects_default_name() {
        let scopes = ScopeStore::new();
        let scope = scopes.enter("a", ScopeOptions::new(), |s| ok(s.current())).unwrap();
        let result: Result<()> =
            scopes.enter_with_scope(&scope, ScopeOptions::new().default_name(), |_| Ok(()));
        assert!(result.unwrap_err().is_argument());
    }

    #[test]
    fn test_enter_with_scope_applies_overrides() {
        let scopes = ScopeStore::new();
        let scope = scopes
            .enter("a", ScopeOptions::new().data_type(DataType::Int32), |s| ok(s.current()))
            .unwrap();
        let (name, data_type, reuse) = scopes
            .enter_with_scope(&scope, ScopeOptions::new().reuse(Reuse::ReuseExistingOnly), |s| {
                let current = s.current();
                ok((current.full_name().to_string(), current.data_type(), current.reuse()))
            })
            .unwrap();
        assert_eq!(name, "a");
        assert_eq!(data_type, Some(DataType::Int32));
        assert_eq!(reuse, Reuse::ReuseExistingOnly);
    }

    #[test]
    fn test_get_variable_in_current_scope() {
        let scopes = ScopeStore::new();
        let store = MemoryStore::new();
        let variable = scopes
            .enter("dense", ScopeOptions::new(), |s| {
                s.get_variable(&store, "w", VariableOptions::new().shape([3, 3]))
            })
            .unwrap();
        assert_eq!(variable.name, "dense/w");
        assert!(store.variable("dense/w").is_some());
    }

    #[test]
    fn test_block_error_type_can_wrap_scope_errors() {
        #[derive(Debug)]
        enum AppError {
            Scope(Error),
        }
        impl From<Error> for AppError {
            fn from(err: Error) -> Self {
                AppError::Scope(err)
            }
        }

        let scopes = ScopeStore::new();
        let store = MemoryStore::new();
        let result: std::result::Result<Variable, AppError> =
            scopes.enter("a", ScopeOptions::new(), |s| {
                Ok(s.get_variable(&store, "w", VariableOptions::new())?)
            });
        assert!(matches!(result, Err(AppError::Scope(err)) if err.is_argument()));
    }
}
