// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Variable stores: the collaborator that owns variables and enforces reuse.

use crate::error::{Error, Result};
use crate::init::Initializer;
use crate::partition::{Partitioner, slice_layout};
use crate::types::Shape;
use crate::variable::{PartitionedVariable, SliceInfo, Variable, VariableRequest, collections};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use tracing::{debug, trace};
use varscope_macros::ensure;

/// Owns variables by full name.
///
/// Scopes compose names and substitute defaults; the store decides whether a
/// request creates a variable, returns an existing one, or fails.
pub trait VariableStore {
    /// Resolves a single variable.
    fn get_variable(&self, request: &VariableRequest) -> Result<Variable>;

    /// Resolves a variable split by `partitioner`.
    fn get_partitioned_variable(
        &self,
        request: &VariableRequest,
        partitioner: &dyn Partitioner,
    ) -> Result<PartitionedVariable>;
}

/// In-memory [`VariableStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Single variables and slices, by full name
    variables: RefCell<FxHashMap<String, Variable>>,
    /// Partitioned variables, by full name
    partitioned: RefCell<FxHashMap<String, PartitionedVariable>>,
    /// Creation order of `variables`
    order: RefCell<Vec<String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a single variable (or slice) by full name.
    pub fn variable(&self, name: &str) -> Option<Variable> {
        self.variables.borrow().get(name).cloned()
    }

    /// Looks up a partitioned variable by full name.
    pub fn partitioned_variable(&self, name: &str) -> Option<PartitionedVariable> {
        self.partitioned.borrow().get(name).cloned()
    }

    /// Variables in `collection`, in creation order.
    pub fn collection(&self, collection: &str) -> Vec<Variable> {
        let variables = self.variables.borrow();
        self.order
            .borrow()
            .iter()
            .filter_map(|name| variables.get(name))
            .filter(|v| v.in_collection(collection))
            .cloned()
            .collect()
    }

    /// Full names of all single variables and slices, in creation order.
    pub fn names(&self) -> Vec<String> {
        self.order.borrow().clone()
    }

    /// Number of single variables and slices.
    pub fn len(&self) -> usize {
        self.variables.borrow().len()
    }

    /// Returns true if nothing has been created yet.
    pub fn is_empty(&self) -> bool {
        self.variables.borrow().is_empty()
    }

    fn create(&self, request: &VariableRequest, slice: Option<SliceInfo>) -> Result<Variable> {
        let name = &request.name;
        let shape = request.shape.clone().unwrap_or_else(Shape::unknown);
        ensure!(
            shape.is_fully_defined(),
            "Shape of new variable '{}' must be fully defined, but instead was {}",
            name,
            shape
        );
        let data_type = request.data_type.unwrap_or_default();
        let initializer = request
            .initializer
            .clone()
            .or_else(|| Initializer::default_for(data_type))
            .ok_or_else(|| {
                Error::argument(format!(
                    "An initializer for variable '{}' of type {} is required",
                    name, data_type
                ))
            })?;

        let mut member_of = request.collections.clone();
        if member_of.is_empty() {
            member_of.insert(collections::GLOBAL_VARIABLES.to_string());
        }
        if request.trainable {
            member_of.insert(collections::TRAINABLE_VARIABLES.to_string());
        }
        if request.regularizer.is_some() {
            member_of.insert(collections::REGULARIZATION_LOSSES.to_string());
        }

        let variable = Variable {
            name: name.clone(),
            data_type,
            shape,
            initializer,
            regularizer: request.regularizer,
            trainable: request.trainable,
            collections: member_of,
            caching_device: request.caching_device.as_ref().map(|device| device(name)),
            slice,
        };
        debug!(name = %variable.name, data_type = %variable.data_type, shape = %variable.shape, "created variable");
        self.variables
            .borrow_mut()
            .insert(name.clone(), variable.clone());
        self.order.borrow_mut().push(name.clone());
        Ok(variable)
    }
}

impl VariableStore for MemoryStore {
    fn get_variable(&self, request: &VariableRequest) -> Result<Variable> {
        let name = &request.name;
        ensure!(!name.is_empty(), "Variable name must not be empty");
        ensure!(
            !self.partitioned.borrow().contains_key(name),
            "Variable '{}' is partitioned and must be resolved with a partitioner",
            name
        );

        if let Some(existing) = self.variables.borrow().get(name) {
            ensure!(
                request.reuse.allows_existing(),
                "Variable '{}' already exists, but reuse is set to '{}'",
                name,
                request.reuse
            );
            check_existing(existing, request)?;
            trace!(name = %name, "reusing variable");
            return Ok(existing.clone());
        }

        ensure!(
            request.reuse.allows_new(),
            "Variable '{}' does not exist, but reuse is set to '{}'",
            name,
            request.reuse
        );
        self.create(request, None)
    }

    fn get_partitioned_variable(
        &self,
        request: &VariableRequest,
        partitioner: &dyn Partitioner,
    ) -> Result<PartitionedVariable> {
        let name = &request.name;
        ensure!(!name.is_empty(), "Variable name must not be empty");
        ensure!(
            !self.variables.borrow().contains_key(name),
            "A partitioner was provided, but an unpartitioned version of variable '{}' was found",
            name
        );

        if let Some(existing) = self.partitioned.borrow().get(name) {
            ensure!(
                request.reuse.allows_existing(),
                "Partitioned variable '{}' already exists, but reuse is set to '{}'",
                name,
                request.reuse
            );
            if let Some(shape) = &request.shape {
                if !shape.is_compatible_with(&existing.shape) {
                    return Err(Error::ShapeMismatch {
                        name: name.clone(),
                        existing: existing.shape.clone(),
                        requested: shape.clone(),
                    });
                }
            }
            if let Some(data_type) = request.data_type {
                if data_type != existing.data_type {
                    return Err(Error::DataTypeMismatch {
                        name: name.clone(),
                        existing: existing.data_type,
                        requested: data_type,
                    });
                }
            }
            let partitions = partitioner.partition(&existing.shape, existing.data_type);
            ensure!(
                partitions == existing.partitions,
                "Trying to reuse partitioned variable '{}', but specified partitions {:?} and found partitions {:?}",
                name,
                partitions,
                existing.partitions
            );
            trace!(name = %name, "reusing partitioned variable");
            return Ok(existing.clone());
        }

        ensure!(
            request.reuse.allows_new(),
            "Partitioned variable '{}' does not exist, but reuse is set to '{}'",
            name,
            request.reuse
        );
        let shape = request.shape.clone().unwrap_or_else(Shape::unknown);
        let data_type = request.data_type.unwrap_or_default();
        let partitions = partitioner.partition(&shape, data_type);
        let layout = slice_layout(name, &shape, &partitions)?;

        let slice_names: Vec<String> = (0..layout.len())
            .map(|i| format!("{}/part_{}", name, i))
            .collect();
        {
            let variables = self.variables.borrow();
            if let Some(taken) = slice_names.iter().find(|n| variables.contains_key(*n)) {
                return Err(Error::argument(format!(
                    "Cannot create partitioned variable '{}': slice '{}' already exists",
                    name, taken
                )));
            }
        }

        let mut slices = Vec::with_capacity(layout.len());
        for (slice_name, slice) in slice_names.into_iter().zip(layout) {
            let mut slice_request = request.clone();
            slice_request.name = slice_name;
            slice_request.shape = Some(slice.shape);
            slice_request.data_type = Some(data_type);
            let info = SliceInfo {
                full_name: name.clone(),
                full_shape: shape.clone(),
                offset: slice.offset,
            };
            slices.push(self.create(&slice_request, Some(info))?);
        }

        let partitioned = PartitionedVariable {
            name: name.clone(),
            data_type,
            shape,
            partitions,
            slices,
        };
        debug!(name = %name, partitions = ?partitioned.partitions, "created partitioned variable");
        self.partitioned
            .borrow_mut()
            .insert(name.clone(), partitioned.clone());
        Ok(partitioned)
    }
}

/// Checks a request against the variable it resolved to.
fn check_existing(existing: &Variable, request: &VariableRequest) -> Result<()> {
    if let Some(shape) = &request.shape {
        if !shape.is_compatible_with(&existing.shape) {
            return Err(Error::ShapeMismatch {
                name: existing.name.clone(),
                existing: existing.shape.clone(),
                requested: shape.clone(),
            });
        }
    }
    if let Some(data_type) = request.data_type {
        if data_type != existing.data_type {
            return Err(Error::DataTypeMismatch {
                name: existing.name.clone(),
                existing: existing.data_type,
                requested: data_type,
            });
        }
    }
    Ok(())
}
