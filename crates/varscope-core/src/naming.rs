// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Naming contexts for side-effecting operations.
//!
//! A naming context is independent of variable paths: entering the same
//! variable scope twice yields the same variable prefix, while the naming
//! context hands out `a` and then `a_1`.

use rustc_hash::FxHashMap;
use std::cell::RefCell;

/// The op-naming prefix that is active while a scope block runs.
///
/// Implementations hand back the previous prefix from [`push`](Self::push)
/// and [`suspend`](Self::suspend); callers return it through
/// [`restore`](Self::restore) in LIFO order.
pub trait NamingContext {
    /// The active prefix, empty at the root.
    fn current(&self) -> String;

    /// Opens `segment` below the active prefix and returns the previous one.
    /// An empty segment leaves the prefix unchanged.
    fn push(&self, segment: &str) -> String;

    /// Clears the active prefix and returns it.
    fn suspend(&self) -> String;

    /// Reinstates a prefix returned by `push` or `suspend`.
    fn restore(&self, previous: String);
}

/// Default [`NamingContext`] handing out graph-style unique names.
#[derive(Debug, Default)]
pub struct NameScopeStack {
    current: RefCell<String>,
    names_in_use: RefCell<FxHashMap<String, usize>>,
}

impl NameScopeStack {
    /// Creates a context positioned at the root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a unique op name for `base` below the active prefix and marks
    /// it as used.
    pub fn op_name(&self, base: &str) -> String {
        let current = self.current.borrow().clone();
        self.unique(&join(&current, base))
    }

    /// Marks `name` (or its first free `name_<n>` variant) as used.
    fn unique(&self, name: &str) -> String {
        let mut in_use = self.names_in_use.borrow_mut();
        let count = in_use.get(name).copied().unwrap_or(0);
        in_use.insert(name.to_string(), count + 1);
        if count == 0 {
            return name.to_string();
        }
        let mut i = count;
        loop {
            let candidate = format!("{}_{}", name, i);
            if !in_use.contains_key(&candidate) {
                in_use.insert(candidate.clone(), 1);
                return candidate;
            }
            i += 1;
        }
    }
}

impl NamingContext for NameScopeStack {
    fn current(&self) -> String {
        self.current.borrow().clone()
    }

    fn push(&self, segment: &str) -> String {
        let previous = self.current.borrow().clone();
        if !segment.is_empty() {
            let next = self.unique(&join(&previous, segment));
            *self.current.borrow_mut() = next;
        }
        previous
    }

    fn suspend(&self) -> String {
        std::mem::take(&mut *self.current.borrow_mut())
    }

    fn restore(&self, previous: String) {
        *self.current.borrow_mut() = previous;
    }
}

/// Joins two path pieces with `/`, skipping empty ones.
pub(crate) fn join(prefix: &str, segment: &str) -> String {
    match (prefix.is_empty(), segment.is_empty()) {
        (true, _) => segment.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}/{}", prefix, segment),
    }
}
