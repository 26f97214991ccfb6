// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present Flowalloc Contributors

//! Flow allocator of a RINA IPC Process.
//!
//! Applications in a DIF communicate through flows. This crate implements
//! the control-plane subsystem that negotiates, establishes and tears down
//! those flows between two IPC Processes: the per-flow state machines, the
//! process-wide allocator that owns them, the QoS-cube catalogue, the wire
//! codec for the flow object exchanged between peers, and the directory
//! based routing of create requests across hops.
//!
//! The kernel EFCP engine, the IPC-Manager daemon, the RIB daemon, the
//! namespace manager and the security manager are collaborators reached
//! through the capability traits in [`services`]; an embedding IPCP (or a
//! test suite) provides the implementations.

// Public module declarations
pub mod codec;
pub mod config;
pub mod dft;
pub mod error;
pub mod events;
pub mod fa;
pub mod fai;
pub mod flow;
pub mod naming;
pub mod policies;
pub mod qos;
pub mod rib;
pub mod services;
pub mod timer;

// Re-export commonly used types
pub use codec::{decode_flow, encode_flow};
pub use config::{DataTransferConstants, DifConfiguration, EfcpConfiguration};
pub use dft::{DirectoryForwardingTable, NamespaceManager};
pub use error::{ConfigError, FlowAllocatorError, RibError, ServiceError};
pub use events::{
    AllocateFlowResponseEvent, CreateConnectionResponseEvent, CreateConnectionResultEvent,
    FlowDeallocateRequestEvent, FlowRequestEvent, UpdateConnectionResponseEvent,
};
pub use fa::{FlowAllocator, InstanceTable};
pub use fai::{FaiState, FlowAllocatorInstance};
pub use flow::{Connection, ConnectionPolicies, DtcpConfig, Flow, FlowSpecification, FlowState};
pub use naming::ApplicationProcessNamingInfo;
pub use policies::{NewFlowRequestPolicy, SimpleNewFlowRequestPolicy};
pub use qos::QoSCube;
pub use rib::{FaRibObject, RemoteId, RibDaemon, RibObjectOps, RibRegistry, RibValue};
pub use services::{CdapSessions, FaServices, IpcManager, KernelIpcProcess, SecurityManager};
pub use timer::{TeardownTimer, TEARDOWN_DELAY};
