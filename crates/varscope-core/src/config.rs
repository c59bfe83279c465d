// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Configuration for the root scope of a [`ScopeStore`](crate::ScopeStore).
//!
//! ```toml
//! log_level = "debug"
//!
//! [root]
//! reuse = "reuse_or_create_new"
//! data_type = "float64"
//!
//! [root.initializer]
//! kind = "random_normal"
//! mean = 0.0
//! stddev = 0.02
//! ```

use crate::error::Result;
use crate::init::{Initializer, Regularizer};
use crate::reuse::Reuse;
use crate::types::DataType;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Configuration for a scope store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Defaults of the root scope
    pub root: RootDefaults,

    /// Log level used by front ends when `RUST_LOG` is unset
    pub log_level: String,
}

/// Defaults installed on the root scope and inherited by every scope below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootDefaults {
    /// Reuse mode of the root scope
    pub reuse: Reuse,

    /// Default data type
    pub data_type: Option<DataType>,

    /// Default initializer
    pub initializer: Option<Initializer>,

    /// Default regularizer
    pub regularizer: Option<Regularizer>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            root: RootDefaults::default(),
            log_level: "warn".to_string(),
        }
    }
}

impl ScopeConfig {
    /// Parses configuration from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        debug!("Loaded scope configuration from {}", path.display());
        Ok(config)
    }
}
