// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present Flowalloc Contributors

//! Events delivered to the flow allocator
//!
//! The IPCP main loop reads events from the IPC-Manager daemon and from the
//! kernel netlink channel and hands them to the flow allocator. Each event
//! carries the port-id (or response handle) used to locate the flow
//! allocator instance it belongs to.

use crate::flow::FlowSpecification;
use crate::naming::ApplicationProcessNamingInfo;
use serde::{Deserialize, Serialize};

/// Application request to allocate a flow, relayed by the IPC-Manager
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowRequestEvent {
    /// Name of the requesting application
    pub local_app_name: ApplicationProcessNamingInfo,
    /// Name of the application the flow targets
    pub remote_app_name: ApplicationProcessNamingInfo,
    /// QoS the application asked for
    pub flow_specification: FlowSpecification,
    /// Port-id assigned to the flow; set by the flow allocator
    pub port_id: i32,
    /// Id of the IPC process requesting the flow (0 for an application)
    pub flow_requestor_ipcp_id: u16,
}

/// Application answer to an incoming flow request
#[derive(Debug, Clone, Copy)]
pub struct AllocateFlowResponseEvent {
    /// Handle of the notification this event answers
    pub sequence_number: u32,
    /// 0 accepts the flow, anything else rejects it
    pub result: i32,
}

/// Kernel answer to a `create_connection` request
#[derive(Debug, Clone, Copy)]
pub struct CreateConnectionResponseEvent {
    /// Port-id of the flow the connection belongs to
    pub port_id: i32,
    /// Cep-id assigned by the EFCP engine; negative on failure
    pub cep_id: i32,
}

/// Kernel answer to a `create_connection_arrived` request
#[derive(Debug, Clone, Copy)]
pub struct CreateConnectionResultEvent {
    /// Port-id of the flow the connection belongs to
    pub port_id: i32,
    /// Cep-id assigned by the EFCP engine; negative on failure
    pub source_cep_id: i32,
}

/// Kernel answer to an `update_connection` request
#[derive(Debug, Clone, Copy)]
pub struct UpdateConnectionResponseEvent {
    /// Port-id of the flow the connection belongs to
    pub port_id: i32,
    /// 0 on success
    pub result: i32,
}

/// Application request to deallocate a flow
#[derive(Debug, Clone, Copy)]
pub struct FlowDeallocateRequestEvent {
    /// Port-id of the flow to deallocate
    pub port_id: i32,
}
