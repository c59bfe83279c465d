// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Initializer and regularizer descriptors.
//!
//! These are plain values: the engine records which initializer and
//! regularizer a variable was created with, but never materializes tensors.

use crate::types::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Describes how a new variable's initial value is produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Initializer {
    /// All zeros
    Zeros,
    /// All ones
    Ones,
    /// Every element set to `value`
    Constant {
        /// Fill value
        value: f64,
    },
    /// Uniform samples in `[min, max)`
    RandomUniform {
        /// Lower bound
        min: f64,
        /// Upper bound
        max: f64,
        /// Optional op-level seed
        #[serde(default)]
        seed: Option<u64>,
    },
    /// Normal samples
    RandomNormal {
        /// Mean
        mean: f64,
        /// Standard deviation
        stddev: f64,
        /// Optional op-level seed
        #[serde(default)]
        seed: Option<u64>,
    },
    /// Normal samples re-drawn beyond two standard deviations
    TruncatedNormal {
        /// Mean
        mean: f64,
        /// Standard deviation
        stddev: f64,
        /// Optional op-level seed
        #[serde(default)]
        seed: Option<u64>,
    },
    /// Glorot (Xavier) uniform
    GlorotUniform {
        /// Optional op-level seed
        #[serde(default)]
        seed: Option<u64>,
    },
}

impl Initializer {
    /// The initializer used when neither the caller nor any enclosing scope
    /// supplied one: Glorot uniform for floating point types, zeros for
    /// integers and booleans, nothing for other types.
    pub fn default_for(data_type: DataType) -> Option<Initializer> {
        if data_type.is_floating() {
            Some(Initializer::GlorotUniform { seed: None })
        } else if data_type.is_integer() || data_type == DataType::Bool {
            Some(Initializer::Zeros)
        } else {
            None
        }
    }
}

impl fmt::Display for Initializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Initializer::Zeros => f.write_str("zeros"),
            Initializer::Ones => f.write_str("ones"),
            Initializer::Constant { value } => write!(f, "constant({})", value),
            Initializer::RandomUniform { min, max, .. } => {
                write!(f, "random_uniform({}, {})", min, max)
            }
            Initializer::RandomNormal { mean, stddev, .. } => {
                write!(f, "random_normal({}, {})", mean, stddev)
            }
            Initializer::TruncatedNormal { mean, stddev, .. } => {
                write!(f, "truncated_normal({}, {})", mean, stddev)
            }
            Initializer::GlorotUniform { .. } => f.write_str("glorot_uniform"),
        }
    }
}

/// Weight penalty attached to a variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Regularizer {
    /// `scale * sum(|w|)`
    L1 {
        /// Penalty scale
        scale: f64,
    },
    /// `scale * sum(w^2) / 2`
    L2 {
        /// Penalty scale
        scale: f64,
    },
    /// Sum of an L1 and an L2 penalty
    L1L2 {
        /// L1 scale
        l1: f64,
        /// L2 scale
        l2: f64,
    },
}

impl Regularizer {
    /// Penalty for a flat slice of weights.
    pub fn penalty(&self, weights: &[f64]) -> f64 {
        let l1 = || weights.iter().map(|w| w.abs()).sum::<f64>();
        let l2 = || weights.iter().map(|w| w * w).sum::<f64>() / 2.0;
        match *self {
            Regularizer::L1 { scale } => scale * l1(),
            Regularizer::L2 { scale } => scale * l2(),
            Regularizer::L1L2 { l1: a, l2: b } => a * l1() + b * l2(),
        }
    }
}

impl fmt::Display for Regularizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regularizer::L1 { scale } => write!(f, "l1({})", scale),
            Regularizer::L2 { scale } => write!(f, "l2({})", scale),
            Regularizer::L1L2 { l1, l2 } => write!(f, "l1_l2({}, {})", l1, l2),
        }
    }
}
