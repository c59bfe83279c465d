// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Reuse policy for variable lookups.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether a lookup must create a new variable, must find an existing one,
/// or may do either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reuse {
    /// Fail if the variable already exists
    #[default]
    #[serde(alias = "create", alias = "new", alias = "false")]
    CreateNewOnly,
    /// Fail if the variable does not exist yet
    #[serde(alias = "reuse", alias = "existing", alias = "true")]
    ReuseExistingOnly,
    /// Return the existing variable or create it
    #[serde(alias = "auto", alias = "either")]
    ReuseOrCreateNew,
}

impl Reuse {
    /// Returns true if an existing variable may be returned.
    pub fn allows_existing(self) -> bool {
        !matches!(self, Reuse::CreateNewOnly)
    }

    /// Returns true if a missing variable may be created.
    pub fn allows_new(self) -> bool {
        !matches!(self, Reuse::ReuseExistingOnly)
    }
}

impl fmt::Display for Reuse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Reuse::CreateNewOnly => "create_new_only",
            Reuse::ReuseExistingOnly => "reuse_existing_only",
            Reuse::ReuseOrCreateNew => "reuse_or_create_new",
        })
    }
}

impl FromStr for Reuse {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create_new_only" | "create" | "new" | "false" => Ok(Reuse::CreateNewOnly),
            "reuse_existing_only" | "reuse" | "existing" | "true" => Ok(Reuse::ReuseExistingOnly),
            "reuse_or_create_new" | "auto" | "either" => Ok(Reuse::ReuseOrCreateNew),
            other => Err(format!("unknown reuse mode '{}'", other)),
        }
    }
}
