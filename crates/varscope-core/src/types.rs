// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Element data types and shapes of variables.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Element type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// 16-bit IEEE float
    Float16,
    /// 16-bit brain float
    #[serde(rename = "bfloat16")]
    BFloat16,
    /// 32-bit IEEE float
    #[default]
    Float32,
    /// 64-bit IEEE float
    Float64,
    /// 8-bit signed integer
    Int8,
    /// 16-bit signed integer
    Int16,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 8-bit unsigned integer
    #[serde(rename = "uint8")]
    UInt8,
    /// Boolean
    Bool,
    /// Variable-length byte string
    String,
}

impl DataType {
    /// Returns true for floating point types.
    pub fn is_floating(self) -> bool {
        matches!(
            self,
            DataType::Float16 | DataType::BFloat16 | DataType::Float32 | DataType::Float64
        )
    }

    /// Returns true for signed and unsigned integer types.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 | DataType::UInt8
        )
    }

    /// Size of one element in bytes, or `None` for variable-length types.
    pub fn byte_size(self) -> Option<usize> {
        match self {
            DataType::Int8 | DataType::UInt8 | DataType::Bool => Some(1),
            DataType::Float16 | DataType::BFloat16 | DataType::Int16 => Some(2),
            DataType::Float32 | DataType::Int32 => Some(4),
            DataType::Float64 | DataType::Int64 => Some(8),
            DataType::String => None,
        }
    }

    /// Short lowercase name, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            DataType::Float16 => "float16",
            DataType::BFloat16 => "bfloat16",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::Int8 => "int8",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::UInt8 => "uint8",
            DataType::Bool => "bool",
            DataType::String => "string",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "float16" | "f16" | "half" => Ok(DataType::Float16),
            "bfloat16" | "bf16" => Ok(DataType::BFloat16),
            "float32" | "f32" | "float" => Ok(DataType::Float32),
            "float64" | "f64" | "double" => Ok(DataType::Float64),
            "int8" | "i8" => Ok(DataType::Int8),
            "int16" | "i16" => Ok(DataType::Int16),
            "int32" | "i32" => Ok(DataType::Int32),
            "int64" | "i64" => Ok(DataType::Int64),
            "uint8" | "u8" => Ok(DataType::UInt8),
            "bool" => Ok(DataType::Bool),
            "string" | "str" => Ok(DataType::String),
            other => Err(format!("unknown data type '{}'", other)),
        }
    }
}

/// Shape of a variable.
///
/// The rank may be unknown, and individual dimensions may be unknown (stored
/// as `-1`). Only fully defined shapes can back a newly created variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape {
    dims: Option<Vec<i64>>,
}

impl Shape {
    /// A shape of unknown rank.
    pub fn unknown() -> Self {
        Self { dims: None }
    }

    /// A scalar (rank 0) shape.
    pub fn scalar() -> Self {
        Self { dims: Some(Vec::new()) }
    }

    /// A shape with the given dimensions; `-1` marks an unknown dimension.
    pub fn new(dims: impl Into<Vec<i64>>) -> Self {
        Self {
            dims: Some(dims.into()),
        }
    }

    /// Dimensions, or `None` if the rank is unknown.
    pub fn dims(&self) -> Option<&[i64]> {
        self.dims.as_deref()
    }

    /// Rank, or `None` if unknown.
    pub fn rank(&self) -> Option<usize> {
        self.dims.as_ref().map(Vec::len)
    }

    /// Returns true when the rank and every dimension are known.
    pub fn is_fully_defined(&self) -> bool {
        self.dims
            .as_ref()
            .is_some_and(|dims| dims.iter().all(|&d| d >= 0))
    }

    /// Number of elements, when fully defined and representable as `i64`.
    pub fn num_elements(&self) -> Option<i64> {
        if !self.is_fully_defined() {
            return None;
        }
        self.dims
            .as_ref()?
            .iter()
            .try_fold(1i64, |acc, &d| acc.checked_mul(d))
    }

    /// Two shapes are compatible when they could describe the same value:
    /// unknown ranks and unknown dimensions match anything.
    pub fn is_compatible_with(&self, other: &Shape) -> bool {
        match (&self.dims, &other.dims) {
            (Some(a), Some(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(&x, &y)| x < 0 || y < 0 || x == y)
            }
            _ => true,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.dims {
            None => f.write_str("<unknown>"),
            Some(dims) => {
                f.write_str("[")?;
                for (i, d) in dims.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if *d < 0 {
                        f.write_str("?")?;
                    } else {
                        write!(f, "{}", d)?;
                    }
                }
                f.write_str("]")
            }
        }
    }
}

impl<const N: usize> From<[i64; N]> for Shape {
    fn from(dims: [i64; N]) -> Self {
        Shape::new(dims.to_vec())
    }
}

impl From<Vec<i64>> for Shape {
    fn from(dims: Vec<i64>) -> Self {
        Shape::new(dims)
    }
}

impl From<&[i64]> for Shape {
    fn from(dims: &[i64]) -> Self {
        Shape::new(dims.to_vec())
    }
}
