// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present Flowalloc Contributors

//! QoS cubes
//!
//! A QoS cube is a named bundle of service parameters and EFCP policies,
//! configured when the IPCP is assigned to a DIF. Flow allocation picks one
//! cube per flow and derives the connection policies from it. Cubes are
//! owned by the flow allocator's RIB registry and handed out by reference.

use crate::flow::ConnectionPolicies;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable QoS catalogue entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QoSCube {
    /// Numeric identifier, unique within the DIF
    pub id: u32,
    /// Human-readable name, unique within the DIF
    pub name: String,
    /// EFCP policies connections built from this cube start with
    pub efcp_policies: ConnectionPolicies,
    /// Average bandwidth in bytes/s
    pub average_bandwidth: u32,
    /// Average bandwidth in SDUs/s
    pub average_sdu_bandwidth: u32,
    /// Duration of peak bandwidth in ms
    pub peak_bandwidth_duration: u32,
    /// Duration of peak SDU bandwidth in ms
    pub peak_sdu_bandwidth_duration: u32,
    /// Undetected bit error rate the cube guarantees
    pub undetected_bit_error_rate: f64,
    /// Incomplete SDUs may be delivered
    pub partial_delivery: bool,
    /// SDUs are delivered in order
    pub ordered_delivery: bool,
    /// Maximum gap between delivered SDUs
    pub max_allowable_gap: i32,
    /// Delay bound in ms
    pub delay: u32,
    /// Jitter bound in ms
    pub jitter: u32,
}

impl QoSCube {
    /// Unreliable best-effort cube: no DTCP, gaps allowed
    pub fn unreliable() -> Self {
        Self {
            id: 1,
            name: "unreliable".to_string(),
            efcp_policies: ConnectionPolicies {
                dtcp_present: false,
                max_sdu_gap: -1,
                ..Default::default()
            },
            max_allowable_gap: -1,
            ..Default::default()
        }
    }

    /// Reliable cube: DTCP with retransmission and flow control, no gaps
    pub fn reliable() -> Self {
        Self {
            id: 2,
            name: "reliable".to_string(),
            efcp_policies: ConnectionPolicies {
                dtcp_present: true,
                dtcp_config: crate::flow::DtcpConfig {
                    flow_control: true,
                    rtx_control: true,
                    initial_rtx_time_ms: 1000,
                },
                in_order_delivery: true,
                partial_delivery: false,
                max_sdu_gap: 0,
            },
            ordered_delivery: true,
            max_allowable_gap: 0,
            ..Default::default()
        }
    }
}

impl fmt::Display for QoSCube {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Name: {}; Id: {}", self.name, self.id)?;
        writeln!(f, "Jitter: {}; Delay: {}", self.jitter, self.delay)?;
        writeln!(
            f,
            "In order delivery: {}; Partial delivery allowed: {}",
            self.ordered_delivery, self.partial_delivery
        )?;
        writeln!(
            f,
            "Max allowed gap between SDUs: {}; Undetected bit error rate: {}",
            self.max_allowable_gap, self.undetected_bit_error_rate
        )?;
        write!(
            f,
            "Average bandwidth (bytes/s): {}; Average SDU bandwidth (bytes/s): {}",
            self.average_bandwidth, self.average_sdu_bandwidth
        )
    }
}
