// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present Flowalloc Contributors

//! Application process naming
//!
//! RINA names applications with a four-part structured name rather than an
//! address: the process name/instance identify the application process, the
//! entity name/instance identify an entity within it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured application process name
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationProcessNamingInfo {
    /// Application process name
    pub process_name: String,
    /// Application process instance
    pub process_instance: String,
    /// Application entity name
    pub entity_name: String,
    /// Application entity instance
    pub entity_instance: String,
}

impl ApplicationProcessNamingInfo {
    /// Creates a name with process name and instance; entity parts empty
    pub fn new(process_name: impl Into<String>, process_instance: impl Into<String>) -> Self {
        Self {
            process_name: process_name.into(),
            process_instance: process_instance.into(),
            entity_name: String::new(),
            entity_instance: String::new(),
        }
    }

    /// Creates a fully qualified name
    pub fn with_entity(
        process_name: impl Into<String>,
        process_instance: impl Into<String>,
        entity_name: impl Into<String>,
        entity_instance: impl Into<String>,
    ) -> Self {
        Self {
            process_name: process_name.into(),
            process_instance: process_instance.into(),
            entity_name: entity_name.into(),
            entity_instance: entity_instance.into(),
        }
    }
}

impl fmt::Display for ApplicationProcessNamingInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.process_name, self.process_instance)?;
        if !self.entity_name.is_empty() || !self.entity_instance.is_empty() {
            write!(f, ":{}:{}", self.entity_name, self.entity_instance)?;
        }
        Ok(())
    }
}
