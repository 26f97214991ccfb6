// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present Flowalloc Contributors

//! Wire codec for the Flow object
//!
//! A flow crosses the wire as a compact binary record carried in the value
//! field of a CDAP create request or response. Connections travel as
//! (qos-id, source-cep-id, dest-cep-id) triples plus the active connection's
//! policies; the decoder rebuilds full `Connection` values using the
//! flow-level addresses. Any bytes left over after the record ends mean the
//! peer speaks a newer dialect, and the message is rejected.

use crate::error::FlowAllocatorError;
use crate::flow::{Connection, ConnectionPolicies, Flow, FlowSpecification, FlowState};
use crate::naming::ApplicationProcessNamingInfo;
use serde::{Deserialize, Serialize};

/// Connection identifier triple as it appears on the wire
#[derive(Debug, Serialize, Deserialize)]
struct WireConnectionId {
    qos_id: u32,
    source_cep_id: i32,
    dest_cep_id: i32,
}

/// Flow record as it appears on the wire, fields in transmission order
#[derive(Debug, Serialize, Deserialize)]
struct WireFlow {
    source_naming: ApplicationProcessNamingInfo,
    destination_naming: ApplicationProcessNamingInfo,
    source_port_id: i32,
    destination_port_id: i32,
    source_address: u32,
    destination_address: u32,
    connection_ids: Vec<WireConnectionId>,
    current_connection_index: u32,
    state: FlowState,
    qos_parameters: FlowSpecification,
    connection_policies: ConnectionPolicies,
    access_control: Option<Vec<u8>>,
    max_create_flow_retries: u32,
    create_flow_retries: u32,
    hop_count: i32,
}

/// Encodes a flow into its wire representation.
///
/// The flow must have an active connection; its policies are the ones
/// transmitted.
pub fn encode_flow(flow: &Flow) -> Result<Vec<u8>, FlowAllocatorError> {
    let active = flow.active_connection().ok_or_else(|| {
        FlowAllocatorError::MalformedMessage("flow has no active connection".to_string())
    })?;

    let wire = WireFlow {
        source_naming: flow.source_naming.clone(),
        destination_naming: flow.destination_naming.clone(),
        source_port_id: flow.source_port_id,
        destination_port_id: flow.destination_port_id,
        source_address: flow.source_address,
        destination_address: flow.destination_address,
        connection_ids: flow
            .connections
            .iter()
            .map(|c| WireConnectionId {
                qos_id: c.qos_id,
                source_cep_id: c.source_cep_id,
                dest_cep_id: c.dest_cep_id,
            })
            .collect(),
        current_connection_index: flow.current_connection_index as u32,
        state: flow.state,
        qos_parameters: flow.flow_specification.clone(),
        connection_policies: active.policies.clone(),
        access_control: flow.access_control.clone(),
        max_create_flow_retries: flow.max_create_flow_retries,
        create_flow_retries: flow.create_flow_retries,
        hop_count: flow.hop_count,
    };

    Ok(postcard::to_allocvec(&wire)?)
}

/// Decodes a flow from its wire representation.
///
/// Rejects records with trailing bytes. The rebuilt connections carry the
/// flow-level addresses; port-id and flow-user ipcp-id are local knowledge
/// the receiver fills in afterwards.
pub fn decode_flow(bytes: &[u8]) -> Result<Flow, FlowAllocatorError> {
    let (wire, rest) = postcard::take_from_bytes::<WireFlow>(bytes)?;
    if !rest.is_empty() {
        return Err(FlowAllocatorError::MalformedMessage(format!(
            "{} trailing bytes after flow record",
            rest.len()
        )));
    }

    let current_connection_index = wire.current_connection_index as usize;
    let mut connections: Vec<Connection> = wire
        .connection_ids
        .iter()
        .map(|id| Connection {
            port_id: 0,
            source_address: wire.source_address,
            dest_address: wire.destination_address,
            source_cep_id: id.source_cep_id,
            dest_cep_id: id.dest_cep_id,
            qos_id: id.qos_id,
            flow_user_ipcp_id: 0,
            policies: ConnectionPolicies::default(),
        })
        .collect();
    if let Some(active) = connections.get_mut(current_connection_index) {
        active.policies = wire.connection_policies;
    }

    Ok(Flow {
        source_naming: wire.source_naming,
        destination_naming: wire.destination_naming,
        source_port_id: wire.source_port_id,
        destination_port_id: wire.destination_port_id,
        source_address: wire.source_address,
        destination_address: wire.destination_address,
        connections,
        current_connection_index,
        state: wire.state,
        flow_specification: wire.qos_parameters,
        hop_count: wire.hop_count,
        max_create_flow_retries: wire.max_create_flow_retries,
        create_flow_retries: wire.create_flow_retries,
        source: false,
        access_control: wire.access_control,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::DtcpConfig;

    fn sample_flow() -> Flow {
        let policies = ConnectionPolicies {
            dtcp_present: true,
            dtcp_config: DtcpConfig {
                flow_control: true,
                rtx_control: true,
                initial_rtx_time_ms: 1000,
            },
            in_order_delivery: true,
            partial_delivery: false,
            max_sdu_gap: 4,
        };
        Flow {
            source_naming: ApplicationProcessNamingInfo::new("rina.apps.echo", "1"),
            destination_naming: ApplicationProcessNamingInfo::new("rina.apps.echo-server", "1"),
            source_port_id: 430,
            destination_port_id: 0,
            source_address: 10,
            destination_address: 20,
            connections: vec![Connection {
                port_id: 430,
                source_address: 10,
                dest_address: 20,
                source_cep_id: 7,
                dest_cep_id: 0,
                qos_id: 1,
                flow_user_ipcp_id: 0,
                policies,
            }],
            current_connection_index: 0,
            state: FlowState::AllocationInProgress,
            flow_specification: FlowSpecification {
                max_allowable_gap: 4,
                delay: 150,
                jitter: 20,
                ..Default::default()
            },
            hop_count: 3,
            max_create_flow_retries: 1,
            create_flow_retries: 0,
            source: true,
            access_control: Some(vec![0xDE, 0xAD]),
        }
    }

    #[test]
    fn test_round_trip_preserves_every_wire_field() {
        let flow = sample_flow();
        let decoded = decode_flow(&encode_flow(&flow).unwrap()).unwrap();

        assert_eq!(decoded.source_naming, flow.source_naming);
        assert_eq!(decoded.destination_naming, flow.destination_naming);
        assert_eq!(decoded.source_port_id, flow.source_port_id);
        assert_eq!(decoded.destination_port_id, flow.destination_port_id);
        assert_eq!(decoded.source_address, flow.source_address);
        assert_eq!(decoded.destination_address, flow.destination_address);
        assert_eq!(decoded.connections.len(), 1);
        let conn = &decoded.connections[0];
        let orig = &flow.connections[0];
        assert_eq!(conn.qos_id, orig.qos_id);
        assert_eq!(conn.source_cep_id, orig.source_cep_id);
        assert_eq!(conn.dest_cep_id, orig.dest_cep_id);
        assert_eq!(conn.policies, orig.policies);
        assert_eq!(
            decoded.current_connection_index,
            flow.current_connection_index
        );
        assert_eq!(decoded.state, flow.state);
        assert_eq!(decoded.flow_specification, flow.flow_specification);
        assert_eq!(decoded.access_control, flow.access_control);
        assert_eq!(
            decoded.max_create_flow_retries,
            flow.max_create_flow_retries
        );
        assert_eq!(decoded.create_flow_retries, flow.create_flow_retries);
        assert_eq!(decoded.hop_count, flow.hop_count);
    }

    #[test]
    fn test_absent_access_control_round_trips() {
        let mut flow = sample_flow();
        flow.access_control = None;
        let decoded = decode_flow(&encode_flow(&flow).unwrap()).unwrap();
        assert_eq!(decoded.access_control, None);
    }

    #[test]
    fn test_decoded_connections_carry_flow_addresses() {
        let flow = sample_flow();
        let decoded = decode_flow(&encode_flow(&flow).unwrap()).unwrap();
        let conn = decoded.active_connection().unwrap();
        assert_eq!(conn.source_address, 10);
        assert_eq!(conn.dest_address, 20);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = encode_flow(&sample_flow()).unwrap();
        bytes.push(0x42);
        let err = decode_flow(&bytes).unwrap_err();
        assert!(matches!(err, FlowAllocatorError::MalformedMessage(_)));
    }

    #[test]
    fn test_truncated_record_rejected() {
        let bytes = encode_flow(&sample_flow()).unwrap();
        let err = decode_flow(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, FlowAllocatorError::MalformedMessage(_)));
    }

    #[test]
    fn test_encode_requires_active_connection() {
        let flow = Flow::default();
        assert!(matches!(
            encode_flow(&flow),
            Err(FlowAllocatorError::MalformedMessage(_))
        ));
    }
}
