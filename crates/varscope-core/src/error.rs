// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for scope entry and variable resolution.

use crate::types::{DataType, Shape};
use thiserror::Error;

/// Result type for scope and variable operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while entering scopes or resolving variables.
#[derive(Debug, Error)]
pub enum Error {
    /// Illegal combination of reuse, name, getter, or partitioner arguments
    #[error("ArgumentError: {0}")]
    Argument(String),

    /// A requested shape disagrees with the stored variable
    #[error("ShapeMismatchError: variable '{name}' has shape {existing}, but {requested} was requested")]
    ShapeMismatch {
        /// Full name of the variable
        name: String,
        /// Shape of the stored variable
        existing: Shape,
        /// Shape passed by the caller
        requested: Shape,
    },

    /// A requested data type disagrees with the stored variable
    #[error("DataTypeMismatchError: variable '{name}' has data type {existing}, but {requested} was requested")]
    DataTypeMismatch {
        /// Full name of the variable
        name: String,
        /// Data type of the stored variable
        existing: DataType,
        /// Data type passed by the caller
        requested: DataType,
    },

    /// Malformed configuration file
    #[error("ConfigError: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O error while reading configuration
    #[error("IOError: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new ArgumentError
    pub fn argument(msg: impl Into<String>) -> Self {
        Self::Argument(msg.into())
    }

    /// Returns true for errors caused by illegal arguments.
    pub fn is_argument(&self) -> bool {
        matches!(self, Self::Argument(_))
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Argument(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Argument(s.to_string())
    }
}
