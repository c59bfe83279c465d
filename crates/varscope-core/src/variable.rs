// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Variables, partitioned variables, and the request that resolves them.

use crate::init::{Initializer, Regularizer};
use crate::reuse::Reuse;
use crate::types::{DataType, Shape};
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

/// Standard collection keys.
pub mod collections {
    /// Every global variable
    pub const GLOBAL_VARIABLES: &str = "variables";
    /// Variables updated by optimizers
    pub const TRAINABLE_VARIABLES: &str = "trainable_variables";
    /// Variables local to one process (counters, caches)
    pub const LOCAL_VARIABLES: &str = "local_variables";
    /// Variables carrying a regularizer
    pub const REGULARIZATION_LOSSES: &str = "regularization_losses";
}

/// Maps a variable's full name to the device its reads are cached on.
pub type CachingDevice = Rc<dyn Fn(&str) -> String>;

/// Position of a variable inside a partitioned parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceInfo {
    /// Full name of the partitioned variable
    pub full_name: String,
    /// Shape of the partitioned variable
    pub full_shape: Shape,
    /// Offset of this slice within it
    pub offset: Vec<i64>,
}

/// A named, stateful entity held by a [`VariableStore`](crate::store::VariableStore).
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Full `/`-joined name
    pub name: String,
    /// Element type
    pub data_type: DataType,
    /// Shape (always fully defined)
    pub shape: Shape,
    /// Initializer the variable was created with
    pub initializer: Initializer,
    /// Attached regularizer
    pub regularizer: Option<Regularizer>,
    /// Whether optimizers update this variable
    pub trainable: bool,
    /// Collections the variable was added to
    pub collections: BTreeSet<String>,
    /// Device reads are cached on
    pub caching_device: Option<String>,
    /// Set for slices of a partitioned variable
    pub slice: Option<SliceInfo>,
}

impl Variable {
    /// Last path segment of the variable name.
    pub fn local_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Returns true if the variable belongs to `collection`.
    pub fn in_collection(&self, collection: &str) -> bool {
        self.collections.contains(collection)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}{}", self.name, self.data_type, self.shape)
    }
}

/// A variable stored as several slices along one axis.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionedVariable {
    /// Full `/`-joined name
    pub name: String,
    /// Element type
    pub data_type: DataType,
    /// Shape of the whole variable
    pub shape: Shape,
    /// Partition count per axis
    pub partitions: Vec<usize>,
    /// Slices in offset order, named `<name>/part_<i>`
    pub slices: Vec<Variable>,
}

impl PartitionedVariable {
    /// Number of slices.
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    /// Returns true if there are no slices.
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Iterates over the slices.
    pub fn iter(&self) -> std::slice::Iter<'_, Variable> {
        self.slices.iter()
    }
}

impl fmt::Display for PartitionedVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}{} partitions={:?}",
            self.name, self.data_type, self.shape, self.partitions
        )
    }
}

/// Everything a store (or a getter) needs to resolve one variable.
///
/// Built by [`VariableScope`](crate::scope::VariableScope) after composing the
/// full name and substituting scope defaults. Getters receive it by value and
/// may rewrite any field before delegating.
#[derive(Clone)]
pub struct VariableRequest {
    /// Full `/`-joined name
    pub name: String,
    /// Requested element type
    pub data_type: Option<DataType>,
    /// Requested shape
    pub shape: Option<Shape>,
    /// Initializer for a new variable
    pub initializer: Option<Initializer>,
    /// Regularizer for a new variable
    pub regularizer: Option<Regularizer>,
    /// Whether a new variable is trainable
    pub trainable: bool,
    /// Reuse policy for this lookup
    pub reuse: Reuse,
    /// Extra collections for a new variable
    pub collections: BTreeSet<String>,
    /// Caching device function
    pub caching_device: Option<CachingDevice>,
}

impl VariableRequest {
    /// A request for `name` with every optional field unset.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: None,
            shape: None,
            initializer: None,
            regularizer: None,
            trainable: true,
            reuse: Reuse::default(),
            collections: BTreeSet::new(),
            caching_device: None,
        }
    }
}

impl fmt::Debug for VariableRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableRequest")
            .field("name", &self.name)
            .field("data_type", &self.data_type)
            .field("shape", &self.shape)
            .field("initializer", &self.initializer)
            .field("regularizer", &self.regularizer)
            .field("trainable", &self.trainable)
            .field("reuse", &self.reuse)
            .field("collections", &self.collections)
            .field("caching_device", &self.caching_device.is_some())
            .finish()
    }
}
