// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present Flowalloc Contributors

//! DIF configuration for the flow allocator
//!
//! The configuration arrives when the IPCP is assigned to a DIF, either
//! built programmatically by the enrollment machinery or loaded from a TOML
//! file. The flow allocator consumes the EFCP section: the QoS-cube
//! catalogue and the data-transfer constants.

use crate::error::ConfigError;
use crate::qos::QoSCube;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

/// Fixed-size field lengths and limits of the DIF's data transfer protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTransferConstants {
    /// Length of the address field in bytes
    pub address_length: u32,
    /// Length of the port-id field in bytes
    pub port_id_length: u32,
    /// Length of the cep-id field in bytes
    pub cep_id_length: u32,
    /// Length of the qos-id field in bytes
    pub qos_id_length: u32,
    /// Length of the sequence-number field in bytes
    pub sequence_number_length: u32,
    /// Length of the length field in bytes
    pub length_length: u32,
    /// Maximum PDU size in bytes
    pub max_pdu_size: u32,
    /// Maximum packet lifetime in ms
    pub max_pdu_lifetime_ms: u32,
    /// Whether PDUs carry an integrity check
    pub dif_integrity: bool,
}

impl Default for DataTransferConstants {
    fn default() -> Self {
        Self {
            address_length: 2,
            port_id_length: 2,
            cep_id_length: 2,
            qos_id_length: 1,
            sequence_number_length: 4,
            length_length: 2,
            max_pdu_size: 10_000,
            max_pdu_lifetime_ms: 2_500,
            dif_integrity: false,
        }
    }
}

impl fmt::Display for DataTransferConstants {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Address length: {}; Port-id length: {}; Cep-id length: {}",
            self.address_length, self.port_id_length, self.cep_id_length
        )?;
        writeln!(
            f,
            "Qos-id length: {}; Sequence number length: {}; Length length: {}",
            self.qos_id_length, self.sequence_number_length, self.length_length
        )?;
        write!(
            f,
            "Max PDU size: {}; Max PDU lifetime (ms): {}; DIF integrity: {}",
            self.max_pdu_size, self.max_pdu_lifetime_ms, self.dif_integrity
        )
    }
}

/// EFCP section of the DIF configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EfcpConfiguration {
    /// QoS cubes offered by the DIF
    #[serde(default)]
    pub qos_cubes: Vec<QoSCube>,
    /// Data-transfer constants of the DIF
    #[serde(default)]
    pub data_transfer_constants: DataTransferConstants,
}

/// Configuration received on assignment to a DIF
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DifConfiguration {
    /// Name of the DIF
    pub dif_name: String,
    /// EFCP parameters
    #[serde(default)]
    pub efcp: EfcpConfiguration,
}

impl DifConfiguration {
    /// Loads a configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: DifConfiguration = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dif_name.is_empty() {
            return Err(ConfigError::Invalid("DIF name must not be empty".into()));
        }

        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        for cube in &self.efcp.qos_cubes {
            if !names.insert(cube.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate QoS cube name: {}",
                    cube.name
                )));
            }
            if !ids.insert(cube.id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate QoS cube id: {}",
                    cube.id
                )));
            }
        }
        Ok(())
    }
}
