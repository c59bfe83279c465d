// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # varscope-core
//!
//! Hierarchical variable scopes for graph construction.
//!
//! ## Overview
//!
//! This crate resolves named variables against a tree of scopes:
//! - Scopes compose slash-separated variable paths and carry inherited
//!   defaults (data type, initializer, regularizer, partitioner, caching
//!   device)
//! - A reuse mode decides whether a lookup may create, must reuse, or may do
//!   either
//! - Custom getters compose across nested scopes, innermost first
//! - Default-named scopes get unique names (`layer`, `layer_1`, ...)
//! - The previous scope is restored when a block ends, even on error or panic
//!
//! ## Quick Start
//!
//! ```
//! use varscope_core::{MemoryStore, Reuse, ScopeOptions, ScopeStore, VariableOptions};
//!
//! let scopes = ScopeStore::new();
//! let store = MemoryStore::new();
//!
//! let w = scopes.enter("dense", ScopeOptions::new(), |s| {
//!     s.get_variable(&store, "w", VariableOptions::new().shape([4, 2]))
//! })?;
//! assert_eq!(w.name, "dense/w");
//!
//! let again = scopes.enter("dense", ScopeOptions::new().reuse(Reuse::ReuseExistingOnly), |s| {
//!     s.get_variable(&store, "w", VariableOptions::new())
//! })?;
//! assert_eq!(w, again);
//! # Ok::<(), varscope_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod getter;
pub mod init;
pub mod naming;
pub mod partition;
pub mod reuse;
pub mod scope;
pub mod store;
pub mod types;
pub mod variable;

// Re-exports for convenience
pub use config::{RootDefaults, ScopeConfig};
pub use error::{Error, Result};
pub use getter::{BaseGetter, GetterChain, VariableGetter, getter_fn};
pub use init::{Initializer, Regularizer};
pub use naming::{NameScopeStack, NamingContext};
pub use partition::{FixedSizePartitioner, MinMaxPartitioner, Partitioner, SliceLayout};
pub use reuse::Reuse;
pub use scope::{ScopeNameAllocator, ScopeOptions, ScopeStore, VariableOptions, VariableScope};
pub use store::{MemoryStore, VariableStore};
pub use types::{DataType, Shape};
pub use variable::{
    CachingDevice, PartitionedVariable, SliceInfo, Variable, VariableRequest, collections,
};
