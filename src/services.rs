// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present Flowalloc Contributors

//! Capability traits for the flow allocator's external collaborators
//!
//! The flow allocator never talks to a global singleton: every outside
//! subsystem it depends on is handed to it at construction as a trait
//! object. Calls that cross into another subsystem enqueue work and
//! return; the answer, when there is one, comes back later as an event
//! through the IPCP main loop.

use crate::error::ServiceError;
use crate::events::{FlowDeallocateRequestEvent, FlowRequestEvent};
use crate::flow::{Connection, Flow, FlowSpecification};
use crate::naming::ApplicationProcessNamingInfo;
use std::sync::Arc;

/// Kernel IPC-manager interface: port-id accounting and the EFCP
/// connection engine.
///
/// `create_connection`, `create_connection_arrived` and `update_connection`
/// are asynchronous: acceptance of the request is immediate, the outcome
/// arrives later as a kernel event.
pub trait KernelIpcProcess: Send + Sync {
    /// Reserves a port-id for the named application
    fn allocate_port_id(
        &self,
        app_name: &ApplicationProcessNamingInfo,
    ) -> Result<i32, ServiceError>;

    /// Returns a port-id to the kernel
    fn deallocate_port_id(&self, port_id: i32) -> Result<(), ServiceError>;

    /// Requests creation of an EFCP connection on the initiating side
    fn create_connection(&self, connection: &Connection) -> Result<(), ServiceError>;

    /// Requests creation of an EFCP connection on the responding side
    fn create_connection_arrived(&self, connection: &Connection) -> Result<(), ServiceError>;

    /// Requests an update of an existing EFCP connection
    fn update_connection(&self, connection: &Connection) -> Result<(), ServiceError>;
}

/// IPC-Manager daemon interface: application-facing notifications
pub trait IpcManager: Send + Sync {
    /// Reports the outcome of a local allocation request
    fn allocate_flow_request_result(
        &self,
        event: &FlowRequestEvent,
        result: i32,
    ) -> Result<(), ServiceError>;

    /// Notifies the target application of an incoming flow request and
    /// returns the handle its answer will carry
    fn allocate_flow_request_arrived(
        &self,
        dest_app_name: &ApplicationProcessNamingInfo,
        source_app_name: &ApplicationProcessNamingInfo,
        flow_specification: &FlowSpecification,
        port_id: i32,
    ) -> Result<u32, ServiceError>;

    /// Reports the outcome of a local deallocation request
    fn notify_flow_deallocated(
        &self,
        event: &FlowDeallocateRequestEvent,
        result: i32,
    ) -> Result<(), ServiceError>;

    /// Tells the application its flow is gone after a local failure
    fn flow_deallocated(&self, port_id: i32) -> Result<(), ServiceError>;

    /// Tells the application the remote peer deallocated the flow
    fn flow_deallocated_remotely(&self, port_id: i32, reason: i32) -> Result<(), ServiceError>;
}

/// Access-control decisions on incoming flows
pub trait SecurityManager: Send + Sync {
    /// Returns true when the flow may be established
    fn accept_flow(&self, flow: &Flow) -> bool;
}

/// View of the management CDAP sessions this IPCP keeps with its neighbors
pub trait CdapSessions: Send + Sync {
    /// Returns the id of the session whose peer is at `address`
    fn session_to_address(&self, address: u32) -> Option<i32>;

    /// Returns all open session ids
    fn session_ids(&self) -> Vec<i32>;
}

/// The collaborators a flow allocator is constructed with
#[derive(Clone)]
pub struct FaServices {
    pub kernel: Arc<dyn KernelIpcProcess>,
    pub ipc_manager: Arc<dyn IpcManager>,
    pub rib_daemon: Arc<dyn crate::rib::RibDaemon>,
    pub namespace: Arc<dyn crate::dft::NamespaceManager>,
    pub security: Arc<dyn SecurityManager>,
    pub cdap: Arc<dyn CdapSessions>,
}
