// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present Flowalloc Contributors

//! New-flow-request policy
//!
//! Turns an application's allocation request into a `Flow`: picks a QoS
//! cube from the catalogue and derives the initial EFCP connection from it.

use crate::error::FlowAllocatorError;
use crate::events::FlowRequestEvent;
use crate::flow::{Connection, Flow, FlowSpecification, FlowState};
use crate::qos::QoSCube;
use std::sync::Arc;

/// Policy that builds the source-side flow for an allocation request
pub trait NewFlowRequestPolicy: Send + Sync {
    /// Builds a flow from the request, drawing policies from the catalogue
    fn generate_flow(
        &self,
        source_address: u32,
        qos_cubes: &[Arc<QoSCube>],
        event: &FlowRequestEvent,
    ) -> Result<Flow, FlowAllocatorError>;

    /// Returns the policy name
    fn name(&self) -> &str;
}

/// Default policy
///
/// Cube selection: a request that tolerates any gap takes the first cube in
/// the catalogue; otherwise the first cube whose DTCP runs retransmission
/// control is taken. Requests with bounded gap and no retransmitting cube
/// fail.
#[derive(Debug, Default)]
pub struct SimpleNewFlowRequestPolicy;

impl SimpleNewFlowRequestPolicy {
    fn select_qos_cube<'a>(
        qos_cubes: &'a [Arc<QoSCube>],
        flow_spec: &FlowSpecification,
    ) -> Result<&'a Arc<QoSCube>, FlowAllocatorError> {
        if flow_spec.max_allowable_gap < 0 {
            return qos_cubes
                .first()
                .ok_or(FlowAllocatorError::NoSuitableQoSCube);
        }

        qos_cubes
            .iter()
            .find(|cube| {
                cube.efcp_policies.dtcp_present && cube.efcp_policies.dtcp_config.rtx_control
            })
            .ok_or(FlowAllocatorError::NoSuitableQoSCube)
    }
}

impl NewFlowRequestPolicy for SimpleNewFlowRequestPolicy {
    fn generate_flow(
        &self,
        source_address: u32,
        qos_cubes: &[Arc<QoSCube>],
        event: &FlowRequestEvent,
    ) -> Result<Flow, FlowAllocatorError> {
        let cube = Self::select_qos_cube(qos_cubes, &event.flow_specification)?;
        tracing::debug!(cube = %cube.name, "selected qos cube");

        let mut policies = cube.efcp_policies.clone();
        policies.in_order_delivery = cube.ordered_delivery;
        policies.partial_delivery = cube.partial_delivery;
        policies.max_sdu_gap = if event.flow_specification.max_allowable_gap < 0 {
            i32::MAX
        } else {
            cube.max_allowable_gap
        };

        let connection = Connection {
            port_id: event.port_id,
            source_address,
            dest_address: 0,
            source_cep_id: 0,
            dest_cep_id: 0,
            qos_id: 1,
            flow_user_ipcp_id: event.flow_requestor_ipcp_id,
            policies,
        };

        Ok(Flow {
            source_naming: event.local_app_name.clone(),
            destination_naming: event.remote_app_name.clone(),
            source_port_id: 0,
            destination_port_id: 0,
            source_address: 0,
            destination_address: 0,
            connections: vec![connection],
            current_connection_index: 0,
            state: FlowState::AllocationInProgress,
            flow_specification: event.flow_specification.clone(),
            hop_count: 3,
            max_create_flow_retries: 1,
            create_flow_retries: 0,
            source: true,
            access_control: None,
        })
    }

    fn name(&self) -> &str {
        "simple-new-flow-request"
    }
}
