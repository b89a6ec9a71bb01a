// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Patient metadata echoed back with every detection response

use serde::{Deserialize, Serialize};

pub const DEFAULT_NAME: &str = "Anonymous";
pub const DEFAULT_AGE: &str = "N/A";
pub const DEFAULT_GENDER: &str = "N/A";

/// Free-form user details; never interpreted, only echoed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetails {
    pub name: String,
    pub age: String,
    pub gender: String,
}

impl Default for UserDetails {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            age: DEFAULT_AGE.to_string(),
            gender: DEFAULT_GENDER.to_string(),
        }
    }
}

impl UserDetails {
    /// Build from optional form fields, substituting defaults for missing ones
    pub fn from_fields(name: Option<String>, age: Option<String>, gender: Option<String>) -> Self {
        Self {
            name: name.unwrap_or_else(|| DEFAULT_NAME.to_string()),
            age: age.unwrap_or_else(|| DEFAULT_AGE.to_string()),
            gender: gender.unwrap_or_else(|| DEFAULT_GENDER.to_string()),
        }
    }
}
