// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Per-path open counts and default-name allocation.

use crate::naming::join;
use rustc_hash::FxHashMap;
use tracing::trace;

/// Counts how often each full scope path has been opened, and derives
/// unique default names from those counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeNameAllocator {
    counts: FxHashMap<String, usize>,
}

impl ScopeNameAllocator {
    /// Creates an allocator with no recorded paths.
    pub fn new() -> Self {
        Self::default()
    }

    /// How often `path` has been opened since its parent was last closed.
    pub fn count(&self, path: &str) -> usize {
        self.counts.get(path).copied().unwrap_or(0)
    }

    /// Records one more opening of `path` and returns the new count.
    pub fn open(&mut self, path: &str) -> usize {
        let count = self.counts.entry(path.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Forgets every path strictly below `path`; `path` itself is kept.
    ///
    /// The root path is never closed, so an empty `path` forgets nothing.
    pub fn close_descendants(&mut self, path: &str) {
        if path.is_empty() {
            return;
        }
        let prefix = format!("{}/", path);
        self.counts.retain(|key, _| !key.starts_with(&prefix));
    }

    /// Returns a local name derived from `prefix` that has not been opened
    /// below `parent`: `prefix` itself on first use, otherwise the first free
    /// `prefix_<n>` for n = 1, 2, ...
    pub fn unique(&self, prefix: &str, parent: &str) -> String {
        let path = join(parent, prefix);
        if self.count(&path) == 0 {
            return prefix.to_string();
        }
        let mut index = 1;
        while self.count(&format!("{}_{}", path, index)) > 0 {
            index += 1;
        }
        let name = format!("{}_{}", prefix, index);
        trace!(prefix = %prefix, parent = %parent, name = %name, "allocated default scope name");
        name
    }

    /// Number of recorded paths.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns true if no path has been recorded.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
