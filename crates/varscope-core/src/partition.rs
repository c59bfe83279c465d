// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Partitioners decide how a large variable is split into slices.

use crate::error::{Error, Result};
use crate::types::{DataType, Shape};
use varscope_macros::{bail, ensure};

/// Computes the number of partitions along every axis of a variable.
///
/// The returned list has one entry per dimension of `shape`. At most one
/// entry may exceed 1.
pub trait Partitioner {
    /// Partition counts for a variable of `shape` and `data_type`.
    fn partition(&self, shape: &Shape, data_type: DataType) -> Vec<usize>;
}

impl<F> Partitioner for F
where
    F: Fn(&Shape, DataType) -> Vec<usize>,
{
    fn partition(&self, shape: &Shape, data_type: DataType) -> Vec<usize> {
        self(shape, data_type)
    }
}

/// Splits one axis into a fixed number of shards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSizePartitioner {
    /// Requested number of shards
    pub num_shards: usize,
    /// Axis to split
    pub axis: usize,
}

impl FixedSizePartitioner {
    /// Splits axis 0 into `num_shards` shards.
    pub fn new(num_shards: usize) -> Self {
        Self { num_shards, axis: 0 }
    }
}

impl Partitioner for FixedSizePartitioner {
    fn partition(&self, shape: &Shape, _data_type: DataType) -> Vec<usize> {
        let dims = shape.dims().unwrap_or_default();
        let mut partitions = vec![1; dims.len()];
        if let Some(&dim) = dims.get(self.axis) {
            partitions[self.axis] = self.num_shards.min(dim.max(1) as usize);
        }
        partitions
    }
}

/// Splits one axis into as many shards as needed to keep every slice at or
/// above `min_slice_size` bytes, capped at `max_partitions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinMaxPartitioner {
    /// Upper bound on the number of shards
    pub max_partitions: usize,
    /// Axis to split
    pub axis: usize,
    /// Minimum slice size in bytes
    pub min_slice_size: usize,
}

impl MinMaxPartitioner {
    /// Default minimum slice size: 256 KiB.
    pub const DEFAULT_MIN_SLICE_SIZE: usize = 256 << 10;

    /// Splits axis 0 into at most `max_partitions` shards.
    pub fn new(max_partitions: usize) -> Self {
        Self {
            max_partitions,
            axis: 0,
            min_slice_size: Self::DEFAULT_MIN_SLICE_SIZE,
        }
    }
}

impl Partitioner for MinMaxPartitioner {
    fn partition(&self, shape: &Shape, data_type: DataType) -> Vec<usize> {
        let dims = shape.dims().unwrap_or_default();
        let mut partitions = vec![1; dims.len()];
        let (Some(&axis_dim), Some(elements)) = (dims.get(self.axis), shape.num_elements()) else {
            return partitions;
        };
        if axis_dim <= 0 {
            return partitions;
        }
        let element_size = data_type.byte_size().unwrap_or(1) as f64;
        let bytes_per_slice = (elements as f64 / axis_dim as f64) * element_size;
        let slices_per_shard = if bytes_per_slice > 0.0 {
            (self.min_slice_size as f64 / bytes_per_slice).ceil().max(1.0)
        } else {
            1.0
        };
        let shards = (axis_dim as f64 / slices_per_shard).ceil() as usize;
        partitions[self.axis] = shards.min(self.max_partitions).max(1);
        partitions
    }
}

/// One slice of a partitioned variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceLayout {
    /// Offset of the slice within the full variable
    pub offset: Vec<i64>,
    /// Shape of the slice
    pub shape: Shape,
}

/// Validates `partitions` against `shape` and lays out the resulting slices.
///
/// The split axis is divided as evenly as possible; the first
/// `dim % count` slices receive one extra row.
pub fn slice_layout(name: &str, shape: &Shape, partitions: &[usize]) -> Result<Vec<SliceLayout>> {
    let dims = match shape.dims() {
        Some(dims) if shape.is_fully_defined() => dims,
        _ => bail!(
            "Shape of partitioned variable '{}' must be fully defined, but instead was {}",
            name,
            shape
        ),
    };
    ensure!(
        partitions.len() == dims.len(),
        "Partitioner returned {} partition counts for variable '{}' of rank {}",
        partitions.len(),
        name,
        dims.len()
    );
    ensure!(
        partitions.iter().all(|&p| p >= 1),
        "Partitioner returned zero partitions for some axis of variable '{}': {:?}",
        name,
        partitions
    );
    let split_axes: Vec<usize> = (0..partitions.len()).filter(|&i| partitions[i] > 1).collect();
    ensure!(
        split_axes.len() <= 1,
        "Variable '{}' can only be partitioned along one axis, but partitions were {:?}",
        name,
        partitions
    );

    let Some(&axis) = split_axes.first() else {
        return Ok(vec![SliceLayout {
            offset: vec![0; dims.len()],
            shape: shape.clone(),
        }]);
    };
    let count = partitions[axis] as i64;
    let axis_dim = dims[axis];
    if count > axis_dim {
        return Err(Error::argument(format!(
            "Variable '{}' has only {} elements along axis {}, which cannot be split into {} partitions",
            name, axis_dim, axis, count
        )));
    }

    let base = axis_dim / count;
    let excess = axis_dim % count;
    let mut offset = 0;
    let mut slices = Vec::with_capacity(count as usize);
    for i in 0..count {
        let len = base + i64::from(i < excess);
        let mut slice_offset = vec![0; dims.len()];
        slice_offset[axis] = offset;
        let mut slice_dims = dims.to_vec();
        slice_dims[axis] = len;
        slices.push(SliceLayout {
            offset: slice_offset,
            shape: Shape::new(slice_dims),
        });
        offset += len;
    }
    Ok(slices)
}
