// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present Flowalloc Contributors

//! Flow data model
//!
//! A `Flow` describes a provisioned or in-progress flow between two
//! applications in a DIF: the naming of both endpoints, their addresses and
//! port-ids, the EFCP connections supporting the flow, and the negotiated
//! QoS. The flow allocator instance that owns a `Flow` is the only component
//! allowed to mutate it.

use crate::naming::ApplicationProcessNamingInfo;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a flow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowState {
    /// No allocation attempted yet
    #[default]
    Null,
    /// Allocation negotiation underway
    AllocationInProgress,
    /// Flow is usable by the application
    Allocated,
    /// Deallocation requested; waiting 2·MPL before tearing down
    WaitingTwoMplBeforeTearingDown,
    /// Flow is gone
    Deallocated,
}

/// DTCP configuration of an EFCP connection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DtcpConfig {
    /// Window-based flow control enabled
    pub flow_control: bool,
    /// Retransmission control enabled
    pub rtx_control: bool,
    /// Initial retransmission timeout in milliseconds
    pub initial_rtx_time_ms: u32,
}

/// EFCP policies applied to a connection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionPolicies {
    /// Whether DTCP runs on this connection
    pub dtcp_present: bool,
    /// DTCP parameters, meaningful only when `dtcp_present`
    pub dtcp_config: DtcpConfig,
    /// Deliver SDUs in order
    pub in_order_delivery: bool,
    /// Deliver incomplete SDUs
    pub partial_delivery: bool,
    /// Maximum gap between delivered SDUs; `i32::MAX` means unbounded
    pub max_sdu_gap: i32,
}

/// QoS parameters requested by the flow-allocating application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSpecification {
    /// Average bandwidth in bytes/s; 0 means don't care
    pub average_bandwidth: u32,
    /// Average bandwidth in SDUs/s; 0 means don't care
    pub average_sdu_bandwidth: u32,
    /// Duration of peak bandwidth in ms
    pub peak_bandwidth_duration: u32,
    /// Duration of peak SDU bandwidth in ms
    pub peak_sdu_bandwidth_duration: u32,
    /// Acceptable undetected bit error rate
    pub undetected_bit_error_rate: f64,
    /// Incomplete SDUs may be delivered
    pub partial_delivery: bool,
    /// SDUs must be delivered in order
    pub ordered_delivery: bool,
    /// Maximum acceptable gap in SDUs; negative means any gap is acceptable
    pub max_allowable_gap: i32,
    /// Maximum acceptable delay in ms; 0 means don't care
    pub delay: u32,
    /// Maximum acceptable jitter in ms; 0 means don't care
    pub jitter: u32,
    /// Maximum SDU size the flow must carry
    pub max_sdu_size: u32,
}

impl Default for FlowSpecification {
    fn default() -> Self {
        Self {
            average_bandwidth: 0,
            average_sdu_bandwidth: 0,
            peak_bandwidth_duration: 0,
            peak_sdu_bandwidth_duration: 0,
            undetected_bit_error_rate: 0.0,
            partial_delivery: false,
            ordered_delivery: false,
            max_allowable_gap: -1,
            delay: 0,
            jitter: 0,
            max_sdu_size: 0,
        }
    }
}

/// An EFCP connection endpoint pair supporting a flow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Port-id of the flow this connection supports
    pub port_id: i32,
    /// Address of the connection's source IPCP
    pub source_address: u32,
    /// Address of the connection's destination IPCP
    pub dest_address: u32,
    /// Connection endpoint id assigned by the local EFCP engine
    pub source_cep_id: i32,
    /// Connection endpoint id assigned by the remote EFCP engine
    pub dest_cep_id: i32,
    /// Identifier of the QoS cube this connection was built from
    pub qos_id: u32,
    /// Id of the IPC process using the flow (0 for an application)
    pub flow_user_ipcp_id: u16,
    /// EFCP policies governing the connection
    pub policies: ConnectionPolicies,
}

/// A provisioned or in-progress flow between two applications
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    /// Name of the application that requested the flow
    pub source_naming: ApplicationProcessNamingInfo,
    /// Name of the application the flow targets
    pub destination_naming: ApplicationProcessNamingInfo,
    /// Port-id on the initiating side
    pub source_port_id: i32,
    /// Port-id on the responding side
    pub destination_port_id: i32,
    /// Address of the initiating IPCP
    pub source_address: u32,
    /// Address of the responding IPCP
    pub destination_address: u32,
    /// Connections supporting this flow; exactly one is active
    pub connections: Vec<Connection>,
    /// Index of the active connection in `connections`
    pub current_connection_index: usize,
    /// Lifecycle state
    pub state: FlowState,
    /// QoS requested by the allocating application
    pub flow_specification: FlowSpecification,
    /// Remaining hops a create request may traverse
    pub hop_count: i32,
    /// Maximum retries of the create-flow request (reserved)
    pub max_create_flow_retries: u32,
    /// Retries performed so far (reserved)
    pub create_flow_retries: u32,
    /// True on the side that initiated the allocation
    pub source: bool,
    /// Opaque access-control information, if any
    pub access_control: Option<Vec<u8>>,
}

impl Flow {
    /// Returns the active connection, if any connection exists
    pub fn active_connection(&self) -> Option<&Connection> {
        self.connections.get(self.current_connection_index)
    }

    /// Returns the active connection mutably
    pub fn active_connection_mut(&mut self) -> Option<&mut Connection> {
        self.connections.get_mut(self.current_connection_index)
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "* State: {:?}; Initiated locally: {}",
            self.state, self.source
        )?;
        writeln!(
            f,
            "* Source app: {}; Destination app: {}",
            self.source_naming, self.destination_naming
        )?;
        writeln!(
            f,
            "* Source address: {}; Source port-id: {}",
            self.source_address, self.source_port_id
        )?;
        write!(
            f,
            "* Destination address: {}; Destination port-id: {}",
            self.destination_address, self.destination_port_id
        )?;
        if let Some(conn) = self.active_connection() {
            write!(
                f,
                "\n* Active connection: qos-id {}, cep-ids {}/{}",
                conn.qos_id, conn.source_cep_id, conn.dest_cep_id
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow_with_connections(n: usize) -> Flow {
        Flow {
            connections: (0..n)
                .map(|i| Connection {
                    qos_id: i as u32 + 1,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_active_connection_follows_index() {
        let mut flow = flow_with_connections(2);
        assert_eq!(flow.active_connection().unwrap().qos_id, 1);
        flow.current_connection_index = 1;
        assert_eq!(flow.active_connection().unwrap().qos_id, 2);
    }

    #[test]
    fn test_active_connection_empty() {
        let flow = Flow::default();
        assert!(flow.active_connection().is_none());
    }

    #[test]
    fn test_default_state_is_null() {
        assert_eq!(Flow::default().state, FlowState::Null);
    }

    #[test]
    fn test_display_names_endpoints() {
        let mut flow = flow_with_connections(1);
        flow.source_naming = ApplicationProcessNamingInfo::new("client", "1");
        flow.destination_naming = ApplicationProcessNamingInfo::new("server", "1");
        let rendered = flow.to_string();
        assert!(rendered.contains("client:1"));
        assert!(rendered.contains("server:1"));
    }
}
