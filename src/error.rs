// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present Flowalloc Contributors

//! Error types for the flow allocator
//!
//! Every failure the allocator can observe is a typed error. Event
//! callbacks that must not propagate (log-and-drop paths) convert these
//! into log records instead of returning them.

use thiserror::Error;

/// Main error type for flow allocation operations
#[derive(Error, Debug)]
pub enum FlowAllocatorError {
    /// A port-id could not be obtained from the kernel IPC manager.
    #[error("could not allocate a port-id: {0}")]
    ResourceExhaustion(String),

    /// A lookup (DFT entry, flow allocator instance, CDAP session) found
    /// nothing.
    #[error("{0}")]
    NotFound(String),

    /// A forwarded create request ran out of hops before reaching the
    /// destination application.
    #[error("hop count expired while looking for {0}")]
    HopCountExpired(String),

    /// The security manager refused the incoming flow.
    #[error("security manager denied the flow request")]
    SecurityDenied,

    /// The kernel EFCP engine rejected a connection operation.
    #[error("kernel rejected the connection operation: {0}")]
    KernelFailure(String),

    /// A message to the peer flow allocator could not be sent.
    #[error("could not reach the peer flow allocator: {0}")]
    TransportFailure(String),

    /// An event arrived in a state that does not accept it. The event is
    /// dropped without a transition.
    #[error("event {event} received in state {state}")]
    ProtocolViolation {
        event: &'static str,
        state: &'static str,
    },

    /// A flow message failed to decode, or carried trailing data.
    #[error("malformed flow message: {0}")]
    MalformedMessage(String),

    /// No configured QoS cube satisfies the requested flow specification.
    #[error("no QoS cube satisfies the requested flow specification")]
    NoSuitableQoSCube,

    /// Source and destination resolve to the same IPC process.
    #[error("allocation of flows between local applications is not supported")]
    LocalFlowNotSupported,

    #[error("RIB error: {0}")]
    Rib(#[from] RibError),

    #[error("collaborator error: {0}")]
    Service(#[from] ServiceError),
}

impl From<postcard::Error> for FlowAllocatorError {
    fn from(e: postcard::Error) -> Self {
        FlowAllocatorError::MalformedMessage(e.to_string())
    }
}

/// Errors raised by the flow allocator's RIB object registry
#[derive(Error, Debug, Clone)]
pub enum RibError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("object already exists: {0}")]
    AlreadyExists(String),

    #[error("parent object not found: {0}")]
    NoSuchParent(String),

    #[error("operation {operation} not supported on {name}")]
    OperationNotSupported {
        operation: &'static str,
        name: String,
    },

    #[error("value of unexpected kind for object {0}")]
    BadValue(String),
}

/// Errors reported by external collaborators (kernel, IPC manager, RIB
/// daemon, CDAP layer)
#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    #[error("port-id space exhausted")]
    PortIdsExhausted,

    #[error("{0}")]
    Unavailable(String),
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
