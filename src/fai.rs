// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present Flowalloc Contributors

//! Flow allocator instance
//!
//! One instance per port-id drives a single flow through its life: the
//! initiating side walks create-connection, peer negotiation and
//! connection update; the responding side walks connection arrival,
//! application notification and the peer response; both sides share the
//! delayed teardown path.
//!
//! The state machine itself is a pure function: `FaiCore::transition`
//! maps (state, event) to a new state plus a list of effects, and the
//! instance executes the effects through the capability objects it was
//! built with. A failed outbound send is fed back in as
//! `FaiEvent::TransportFailed`, which yields the cleanup effects for the
//! state the failure happened in. Events that arrive in a state that does
//! not accept them are logged and dropped without a transition.

use crate::codec;
use crate::error::FlowAllocatorError;
use crate::events::{
    AllocateFlowResponseEvent, CreateConnectionResponseEvent, CreateConnectionResultEvent,
    FlowDeallocateRequestEvent, FlowRequestEvent, UpdateConnectionResponseEvent,
};
use crate::fa::InstanceTable;
use crate::flow::{Flow, FlowState};
use crate::policies::NewFlowRequestPolicy;
use crate::rib::{self, FaRibObject, RemoteId, RibRegistry, RibValue};
use crate::services::FaServices;
use crate::timer::TeardownTimer;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, warn};

/// Security-denial reason sent to the peer. The token name is what peers
/// in the field match on, so it stays verbatim.
const SECURITY_DENIAL_REASON: &str = "EncoderConstants::FLOW_RIB_OBJECT_CLASS";

/// Reason sent to the peer when the application turns the flow down
const APPLICATION_REJECTED_REASON: &str = "Application rejected the flow";

/// States of a flow allocator instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaiState {
    /// Nothing happened yet
    Null,
    /// Waiting for the kernel to create the EFCP connection
    ConnectionCreateRequested,
    /// Create request sent to the peer flow allocator; no response
    /// timeout exists, so a silent peer parks the instance here
    MessageToPeerFaiSent,
    /// Target application has been told about the incoming flow
    AppNotifiedOfIncomingFlow,
    /// Waiting for the kernel to update the EFCP connection
    ConnectionUpdateRequested,
    /// Flow is up
    FlowAllocated,
    /// Deallocated; waiting 2·MPL before tearing down
    WaitingTwoMplBeforeTearingDown,
    /// Torn down
    Finished,
}

impl FaiState {
    fn name(&self) -> &'static str {
        match self {
            FaiState::Null => "Null",
            FaiState::ConnectionCreateRequested => "ConnectionCreateRequested",
            FaiState::MessageToPeerFaiSent => "MessageToPeerFaiSent",
            FaiState::AppNotifiedOfIncomingFlow => "AppNotifiedOfIncomingFlow",
            FaiState::ConnectionUpdateRequested => "ConnectionUpdateRequested",
            FaiState::FlowAllocated => "FlowAllocated",
            FaiState::WaitingTwoMplBeforeTearingDown => "WaitingTwoMplBeforeTearingDown",
            FaiState::Finished => "Finished",
        }
    }
}

/// Events driving the state machine
#[derive(Debug)]
enum FaiEvent {
    /// Local allocation request; the flow is fully prepared by the caller
    AllocateRequested { flow: Flow },
    /// Kernel answered `create_connection`
    ConnectionCreated { cep_id: i32 },
    /// Peer answered our create request
    PeerAnswered { result: i32, flow: Option<Flow> },
    /// Kernel answered `update_connection`
    ConnectionUpdated { result: i32 },
    /// Peer create request arrived; access decision already made
    CreateRequestArrived {
        flow: Flow,
        registered_ipcp_id: u16,
        accepted: bool,
    },
    /// Kernel answered `create_connection_arrived`
    ConnectionArrived { source_cep_id: i32 },
    /// Application answered the incoming-flow notification
    AllocateResponded { result: i32 },
    /// Local deallocation request
    DeallocateRequested,
    /// Peer deleted the flow object
    DeleteRequestArrived,
    /// 2·MPL elapsed
    TeardownTimerFired,
    /// An outbound send of the previous transition failed
    TransportFailed,
}

impl FaiEvent {
    fn name(&self) -> &'static str {
        match self {
            FaiEvent::AllocateRequested { .. } => "submitAllocateRequest",
            FaiEvent::ConnectionCreated { .. } => "createConnectionResponse",
            FaiEvent::PeerAnswered { .. } => "createResponse",
            FaiEvent::ConnectionUpdated { .. } => "updateConnectionResponse",
            FaiEvent::CreateRequestArrived { .. } => "createFlowRequestMessageReceived",
            FaiEvent::ConnectionArrived { .. } => "createConnectionResult",
            FaiEvent::AllocateResponded { .. } => "submitAllocateResponse",
            FaiEvent::DeallocateRequested => "submitDeallocate",
            FaiEvent::DeleteRequestArrived => "deleteFlowRequestMessageReceived",
            FaiEvent::TeardownTimerFired => "teardownTimerFired",
            FaiEvent::TransportFailed => "transportFailed",
        }
    }
}

/// Effects a transition asks the instance to perform
#[derive(Debug)]
enum FaiEffect {
    RequestCreateConnection,
    RequestCreateConnectionArrived,
    RequestUpdateConnection,
    SendCreateRequestToPeer,
    SendCreateResponseToPeer {
        result: i32,
        reason: Option<&'static str>,
        /// Whether a send failure tears the flow down
        fatal_on_failure: bool,
    },
    NotifyAllocateResult { result: i32 },
    NotifyIncomingFlow,
    NotifyFlowDeallocated,
    NotifyDeallocatedRemotely,
    AddFlowRibObject,
    RemoveFlowRibObject,
    SendDeleteToPeer,
    ScheduleTeardown,
    ReleasePortId,
    RemoveInstance,
}

/// Mutable state of an instance, guarded by the instance mutex
struct FaiCore {
    state: FaiState,
    port_id: i32,
    local_address: u32,
    flow: Option<Flow>,
    request_event: Option<FlowRequestEvent>,
    object_name: String,
    invoke_id: i32,
    underlying_port_id: i32,
    allocate_response_message_handle: Option<u32>,
}

impl FaiCore {
    fn new(port_id: i32, local_address: u32) -> Self {
        Self {
            state: FaiState::Null,
            port_id,
            local_address,
            flow: None,
            request_event: None,
            object_name: String::new(),
            invoke_id: 0,
            underlying_port_id: 0,
            allocate_response_message_handle: None,
        }
    }

    fn violation(&self, event: &FaiEvent) -> FlowAllocatorError {
        FlowAllocatorError::ProtocolViolation {
            event: event.name(),
            state: self.state.name(),
        }
    }

    /// True on the side that initiated the flow
    fn initiator(&self) -> bool {
        self.flow.as_ref().is_some_and(|f| f.source)
    }

    /// Applies one event, returning the effects to perform.
    ///
    /// Pure with respect to the outside world: the only thing this touches
    /// is the core itself.
    fn transition(&mut self, event: FaiEvent) -> Result<Vec<FaiEffect>, FlowAllocatorError> {
        match (self.state, event) {
            (FaiState::Null, FaiEvent::AllocateRequested { flow }) => {
                self.flow = Some(flow);
                self.state = FaiState::ConnectionCreateRequested;
                Ok(vec![FaiEffect::RequestCreateConnection])
            }

            (FaiState::ConnectionCreateRequested, FaiEvent::ConnectionCreated { cep_id }) => {
                if cep_id < 0 {
                    error!(
                        port_id = self.port_id,
                        cep_id, "kernel could not create a connection instance"
                    );
                    self.state = FaiState::Finished;
                    return Ok(vec![
                        FaiEffect::NotifyAllocateResult { result: -1 },
                        FaiEffect::ReleasePortId,
                        FaiEffect::RemoveInstance,
                    ]);
                }
                debug!(port_id = self.port_id, cep_id, "connection created");
                if let Some(conn) = self.flow.as_mut().and_then(|f| f.active_connection_mut()) {
                    conn.source_cep_id = cep_id;
                }
                self.state = FaiState::MessageToPeerFaiSent;
                Ok(vec![FaiEffect::SendCreateRequestToPeer])
            }

            (FaiState::MessageToPeerFaiSent, FaiEvent::PeerAnswered { result, flow }) => {
                if result != 0 {
                    debug!(
                        port_id = self.port_id,
                        result, "peer refused the flow allocation"
                    );
                    self.state = FaiState::Finished;
                    return Ok(vec![
                        FaiEffect::NotifyAllocateResult { result },
                        FaiEffect::ReleasePortId,
                        FaiEffect::RemoveInstance,
                    ]);
                }
                if let (Some(own), Some(received)) = (self.flow.as_mut(), flow) {
                    own.destination_port_id = received.destination_port_id;
                    let peer_cep = received
                        .active_connection()
                        .map(|c| c.dest_cep_id)
                        .unwrap_or(0);
                    if let Some(conn) = own.active_connection_mut() {
                        conn.dest_cep_id = peer_cep;
                    }
                }
                self.state = FaiState::ConnectionUpdateRequested;
                Ok(vec![FaiEffect::RequestUpdateConnection])
            }

            (FaiState::ConnectionUpdateRequested, FaiEvent::ConnectionUpdated { result }) => {
                if result != 0 {
                    error!(
                        port_id = self.port_id,
                        result, "kernel denied the connection update"
                    );
                    self.state = FaiState::Finished;
                    return Ok(vec![
                        FaiEffect::NotifyAllocateResult { result: -1 },
                        FaiEffect::ReleasePortId,
                        FaiEffect::RemoveInstance,
                    ]);
                }
                if let Some(flow) = self.flow.as_mut() {
                    flow.state = FlowState::Allocated;
                }
                self.state = FaiState::FlowAllocated;
                Ok(vec![
                    FaiEffect::AddFlowRibObject,
                    FaiEffect::NotifyAllocateResult { result: 0 },
                ])
            }

            (
                FaiState::Null,
                FaiEvent::CreateRequestArrived {
                    mut flow,
                    registered_ipcp_id,
                    accepted,
                },
            ) => {
                if flow.destination_address == 0 {
                    flow.destination_address = self.local_address;
                }
                flow.destination_port_id = self.port_id;
                let destination_address = flow.destination_address;
                if let Some(conn) = flow.active_connection_mut() {
                    conn.port_id = self.port_id;
                    // The wire may have carried no destination address.
                    conn.dest_address = destination_address;
                    std::mem::swap(&mut conn.source_address, &mut conn.dest_address);
                    std::mem::swap(&mut conn.source_cep_id, &mut conn.dest_cep_id);
                    conn.flow_user_ipcp_id = registered_ipcp_id;
                }
                self.flow = Some(flow);

                if !accepted {
                    warn!(
                        port_id = self.port_id,
                        "security manager denied incoming flow request"
                    );
                    self.state = FaiState::Finished;
                    return Ok(vec![
                        FaiEffect::SendCreateResponseToPeer {
                            result: -1,
                            reason: Some(SECURITY_DENIAL_REASON),
                            fatal_on_failure: false,
                        },
                        FaiEffect::ReleasePortId,
                        FaiEffect::RemoveInstance,
                    ]);
                }

                self.state = FaiState::ConnectionCreateRequested;
                Ok(vec![FaiEffect::RequestCreateConnectionArrived])
            }

            (FaiState::ConnectionCreateRequested, FaiEvent::ConnectionArrived { source_cep_id }) => {
                if source_cep_id < 0 {
                    error!(
                        port_id = self.port_id,
                        source_cep_id, "create connection operation was unsuccessful"
                    );
                    self.state = FaiState::Finished;
                    return Ok(vec![FaiEffect::ReleasePortId, FaiEffect::RemoveInstance]);
                }
                if let Some(conn) = self.flow.as_mut().and_then(|f| f.active_connection_mut()) {
                    conn.source_cep_id = source_cep_id;
                }
                self.state = FaiState::AppNotifiedOfIncomingFlow;
                Ok(vec![FaiEffect::NotifyIncomingFlow])
            }

            (FaiState::AppNotifiedOfIncomingFlow, FaiEvent::AllocateResponded { result }) => {
                if result != 0 {
                    self.state = FaiState::Finished;
                    return Ok(vec![
                        FaiEffect::SendCreateResponseToPeer {
                            result: -1,
                            reason: Some(APPLICATION_REJECTED_REASON),
                            fatal_on_failure: false,
                        },
                        FaiEffect::ReleasePortId,
                        FaiEffect::RemoveInstance,
                    ]);
                }
                if let Some(flow) = self.flow.as_mut() {
                    flow.state = FlowState::Allocated;
                }
                self.state = FaiState::FlowAllocated;
                Ok(vec![
                    FaiEffect::SendCreateResponseToPeer {
                        result: 0,
                        reason: None,
                        fatal_on_failure: true,
                    },
                    FaiEffect::AddFlowRibObject,
                ])
            }

            (FaiState::FlowAllocated, FaiEvent::DeallocateRequested) => {
                if let Some(flow) = self.flow.as_mut() {
                    flow.state = FlowState::WaitingTwoMplBeforeTearingDown;
                }
                self.state = FaiState::WaitingTwoMplBeforeTearingDown;
                Ok(vec![FaiEffect::SendDeleteToPeer, FaiEffect::ScheduleTeardown])
            }

            (FaiState::FlowAllocated, FaiEvent::DeleteRequestArrived) => {
                if let Some(flow) = self.flow.as_mut() {
                    flow.state = FlowState::WaitingTwoMplBeforeTearingDown;
                }
                self.state = FaiState::WaitingTwoMplBeforeTearingDown;
                Ok(vec![
                    FaiEffect::ScheduleTeardown,
                    FaiEffect::NotifyDeallocatedRemotely,
                ])
            }

            (FaiState::WaitingTwoMplBeforeTearingDown, FaiEvent::TeardownTimerFired) => {
                if let Some(flow) = self.flow.as_mut() {
                    flow.state = FlowState::Deallocated;
                }
                self.state = FaiState::Finished;
                Ok(vec![
                    FaiEffect::RemoveFlowRibObject,
                    FaiEffect::ReleasePortId,
                    FaiEffect::RemoveInstance,
                ])
            }

            (state, FaiEvent::TransportFailed) => {
                self.state = FaiState::Finished;
                match state {
                    FaiState::ConnectionCreateRequested | FaiState::MessageToPeerFaiSent
                        if self.initiator() =>
                    {
                        Ok(vec![
                            FaiEffect::NotifyAllocateResult { result: -1 },
                            FaiEffect::ReleasePortId,
                            FaiEffect::RemoveInstance,
                        ])
                    }
                    FaiState::ConnectionUpdateRequested => Ok(vec![
                        FaiEffect::NotifyAllocateResult { result: -1 },
                        FaiEffect::ReleasePortId,
                        FaiEffect::RemoveInstance,
                    ]),
                    FaiState::ConnectionCreateRequested | FaiState::AppNotifiedOfIncomingFlow => {
                        Ok(vec![FaiEffect::ReleasePortId, FaiEffect::RemoveInstance])
                    }
                    FaiState::FlowAllocated => Ok(vec![
                        FaiEffect::NotifyFlowDeallocated,
                        FaiEffect::ReleasePortId,
                        FaiEffect::RemoveInstance,
                    ]),
                    _ => {
                        self.state = state;
                        Err(FlowAllocatorError::ProtocolViolation {
                            event: "transportFailed",
                            state: state.name(),
                        })
                    }
                }
            }

            (_, event) => Err(self.violation(&event)),
        }
    }

    /// The flow as sent back to the initiator: the active connection is
    /// swapped into the initiator's frame so the peer reads its own
    /// endpoints on the source side and ours on the destination side.
    fn response_flow(&self) -> Option<Flow> {
        let mut flow = self.flow.clone()?;
        if let Some(conn) = flow.active_connection_mut() {
            std::mem::swap(&mut conn.source_address, &mut conn.dest_address);
            std::mem::swap(&mut conn.source_cep_id, &mut conn.dest_cep_id);
        }
        Some(flow)
    }
}

/// Outcome of executing one effect
enum EffectOutcome {
    Done,
    Remove,
    Failed,
}

/// Per-flow control object, one per port-id
pub struct FlowAllocatorInstance {
    core: Mutex<FaiCore>,
    services: FaServices,
    registry: Arc<Mutex<RibRegistry>>,
    instances: InstanceTable,
    /// Builds the flow on the initiating side; the responding side never
    /// invokes a policy and carries none
    policy: Option<Box<dyn NewFlowRequestPolicy>>,
}

impl FlowAllocatorInstance {
    pub(crate) fn new_source(
        port_id: i32,
        local_address: u32,
        services: FaServices,
        registry: Arc<Mutex<RibRegistry>>,
        instances: InstanceTable,
        policy: Box<dyn NewFlowRequestPolicy>,
    ) -> Arc<Self> {
        debug!(port_id, "created flow allocator instance (initiator)");
        Arc::new(Self {
            core: Mutex::new(FaiCore::new(port_id, local_address)),
            services,
            registry,
            instances,
            policy: Some(policy),
        })
    }

    pub(crate) fn new_destination(
        port_id: i32,
        local_address: u32,
        services: FaServices,
        registry: Arc<Mutex<RibRegistry>>,
        instances: InstanceTable,
    ) -> Arc<Self> {
        debug!(port_id, "created flow allocator instance (responder)");
        Arc::new(Self {
            core: Mutex::new(FaiCore::new(port_id, local_address)),
            services,
            registry,
            instances,
            policy: None,
        })
    }

    /// Port-id of the flow this instance manages
    pub fn port_id(&self) -> i32 {
        self.core.lock().unwrap().port_id
    }

    /// Current state
    pub fn state(&self) -> FaiState {
        self.core.lock().unwrap().state
    }

    /// Whether the instance reached its terminal state
    pub fn is_finished(&self) -> bool {
        self.state() == FaiState::Finished
    }

    /// Handle of the pending incoming-flow notification, responder side
    pub fn allocate_response_message_handle(&self) -> Option<u32> {
        self.core.lock().unwrap().allocate_response_message_handle
    }

    /// Renders the owned flow for operator inspection
    pub fn displayable_flow(&self) -> Option<String> {
        let core = self.core.lock().unwrap();
        core.flow.as_ref().map(|f| f.to_string())
    }

    /// Encodes the owned flow
    pub fn encoded_flow(&self) -> Option<Vec<u8>> {
        let core = self.core.lock().unwrap();
        core.flow.as_ref().and_then(|f| codec::encode_flow(f).ok())
    }

    /// Starts a locally requested allocation.
    ///
    /// Failures returned here happened before any message left this IPCP;
    /// the flow allocator cleans up the instance and the port-id. Failures
    /// after the first outbound message are handled internally.
    pub fn submit_allocate_request(
        &self,
        mut event: FlowRequestEvent,
    ) -> Result<(), FlowAllocatorError> {
        let mut core = self.core.lock().unwrap();
        let policy = self.policy.as_ref().ok_or_else(|| {
            FlowAllocatorError::ProtocolViolation {
                event: "submitAllocateRequest",
                state: core.state.name(),
            }
        })?;
        event.port_id = core.port_id;

        let cubes = self.registry.lock().unwrap().qos_cubes();
        let mut flow = policy.generate_flow(core.local_address, &cubes, &event)?;
        debug!(port_id = core.port_id, "generated flow object");

        let destination_address = self
            .services
            .namespace
            .dft_next_hop(&event.remote_app_name)
            .ok_or_else(|| {
                FlowAllocatorError::NotFound(format!(
                    "no DFT entry for application {}",
                    event.remote_app_name
                ))
            })?;
        debug!(
            port_id = core.port_id,
            destination_address, "directory forwarding table resolved destination"
        );

        if destination_address == core.local_address {
            return Err(FlowAllocatorError::LocalFlowNotSupported);
        }

        flow.destination_address = destination_address;
        flow.source_address = core.local_address;
        flow.source_port_id = core.port_id;
        if let Some(conn) = flow.active_connection_mut() {
            conn.dest_address = destination_address;
        }
        core.object_name = rib::flow_object_name(core.local_address, core.port_id);
        core.request_event = Some(event);

        let effects = core.transition(FaiEvent::AllocateRequested { flow })?;
        let remove = self.run_effects(&mut core, effects);
        drop(core);
        if remove {
            self.instances.remove(self.port_id());
        }
        Ok(())
    }

    /// Takes ownership of a peer create request (responder entry point)
    pub fn create_flow_request_message_received(
        &self,
        flow: Flow,
        object_name: String,
        invoke_id: i32,
        underlying_port_id: i32,
    ) {
        debug!(%object_name, invoke_id, "create flow request received");
        let accepted = self.services.security.accept_flow(&flow);
        let registered_ipcp_id = self
            .services
            .namespace
            .registered_ipcp_id(&flow.destination_naming)
            .unwrap_or(0);

        let mut core = self.core.lock().unwrap();
        core.object_name = object_name;
        core.invoke_id = invoke_id;
        core.underlying_port_id = underlying_port_id;
        drop(core);

        self.dispatch(FaiEvent::CreateRequestArrived {
            flow,
            registered_ipcp_id,
            accepted,
        });
    }

    /// Kernel answered `create_connection`
    pub fn process_create_connection_response(&self, event: CreateConnectionResponseEvent) {
        self.dispatch(FaiEvent::ConnectionCreated {
            cep_id: event.cep_id,
        });
    }

    /// Kernel answered `create_connection_arrived`
    pub fn process_create_connection_result(&self, event: CreateConnectionResultEvent) {
        self.dispatch(FaiEvent::ConnectionArrived {
            source_cep_id: event.source_cep_id,
        });
    }

    /// Kernel answered `update_connection`
    pub fn process_update_connection_response(&self, event: UpdateConnectionResponseEvent) {
        self.dispatch(FaiEvent::ConnectionUpdated {
            result: event.result,
        });
    }

    /// Peer answered our create request
    pub fn create_response_received(&self, result: i32, reason: Option<&str>, flow: Option<Flow>) {
        if let Some(reason) = reason
            && result != 0
        {
            debug!(result, reason, "peer create response carried a reason");
        }
        self.dispatch(FaiEvent::PeerAnswered { result, flow });
    }

    /// Application answered the incoming-flow notification
    pub fn submit_allocate_response(&self, event: AllocateFlowResponseEvent) {
        self.dispatch(FaiEvent::AllocateResponded {
            result: event.result,
        });
    }

    /// Local deallocation request
    pub fn submit_deallocate(&self, _event: FlowDeallocateRequestEvent) {
        self.dispatch(FaiEvent::DeallocateRequested);
    }

    /// Peer deleted the flow object
    pub fn delete_flow_request_message_received(&self) {
        self.dispatch(FaiEvent::DeleteRequestArrived);
    }

    /// Tears the instance down after the 2·MPL wait
    pub fn destroy(&self) {
        self.dispatch(FaiEvent::TeardownTimerFired);
    }

    fn dispatch(&self, event: FaiEvent) {
        let mut core = self.core.lock().unwrap();
        let event_name = event.name();
        match core.transition(event) {
            Ok(effects) => {
                let remove = self.run_effects(&mut core, effects);
                let port_id = core.port_id;
                drop(core);
                if remove {
                    self.instances.remove(port_id);
                }
            }
            Err(err) => {
                warn!(port_id = core.port_id, event = event_name, %err, "dropping event");
            }
        }
    }

    /// Executes effects in order. A fatal send failure discards the rest
    /// and replaces them with the cleanup effects of `TransportFailed`.
    /// Returns whether the instance must be unregistered (done by the
    /// caller after releasing the core lock; the registry lock is never
    /// taken while a core lock is held).
    fn run_effects(&self, core: &mut MutexGuard<'_, FaiCore>, effects: Vec<FaiEffect>) -> bool {
        let mut queue: VecDeque<FaiEffect> = effects.into();
        let mut remove = false;
        while let Some(effect) = queue.pop_front() {
            match self.run_one(core, effect) {
                EffectOutcome::Done => {}
                EffectOutcome::Remove => remove = true,
                EffectOutcome::Failed => {
                    queue.clear();
                    match core.transition(FaiEvent::TransportFailed) {
                        Ok(cleanup) => queue.extend(cleanup),
                        Err(err) => {
                            warn!(port_id = core.port_id, %err, "no cleanup for failed send");
                        }
                    }
                }
            }
        }
        remove
    }

    fn run_one(&self, core: &mut MutexGuard<'_, FaiCore>, effect: FaiEffect) -> EffectOutcome {
        match effect {
            FaiEffect::RequestCreateConnection => {
                let Some(conn) = core.flow.as_ref().and_then(|f| f.active_connection()) else {
                    return EffectOutcome::Failed;
                };
                match self.services.kernel.create_connection(conn) {
                    Ok(()) => {
                        debug!(
                            port_id = core.port_id,
                            "requested connection creation from the kernel"
                        );
                        EffectOutcome::Done
                    }
                    Err(err) => {
                        let err = FlowAllocatorError::KernelFailure(err.to_string());
                        error!(port_id = core.port_id, %err, "create connection request failed");
                        EffectOutcome::Failed
                    }
                }
            }

            FaiEffect::RequestCreateConnectionArrived => {
                let Some(conn) = core.flow.as_ref().and_then(|f| f.active_connection()) else {
                    return EffectOutcome::Failed;
                };
                match self.services.kernel.create_connection_arrived(conn) {
                    Ok(()) => {
                        debug!(
                            port_id = core.port_id,
                            "requested arrived-connection creation from the kernel"
                        );
                        EffectOutcome::Done
                    }
                    Err(err) => {
                        error!(port_id = core.port_id, %err, "create connection arrived failed");
                        EffectOutcome::Failed
                    }
                }
            }

            FaiEffect::RequestUpdateConnection => {
                let Some(conn) = core.flow.as_ref().and_then(|f| f.active_connection()) else {
                    return EffectOutcome::Failed;
                };
                match self.services.kernel.update_connection(conn) {
                    Ok(()) => EffectOutcome::Done,
                    Err(err) => {
                        error!(port_id = core.port_id, %err, "update connection request failed");
                        EffectOutcome::Failed
                    }
                }
            }

            FaiEffect::SendCreateRequestToPeer => {
                let Some(flow) = core.flow.as_ref() else {
                    return EffectOutcome::Failed;
                };
                let destination = flow.destination_address;
                let Some(session) = self.services.cdap.session_to_address(destination) else {
                    error!(
                        port_id = core.port_id,
                        destination, "no CDAP session toward the destination"
                    );
                    return EffectOutcome::Failed;
                };
                let bytes = match codec::encode_flow(flow) {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        error!(port_id = core.port_id, %err, "could not encode flow");
                        return EffectOutcome::Failed;
                    }
                };
                core.underlying_port_id = session;
                let remote = RemoteId {
                    underlying_port_id: session,
                    address: destination,
                };
                match self.services.rib_daemon.remote_create_object(
                    rib::FLOW_RIB_OBJECT_CLASS,
                    &core.object_name,
                    RibValue::Bytes(bytes),
                    remote,
                ) {
                    Ok(()) => EffectOutcome::Done,
                    Err(err) => {
                        let err = FlowAllocatorError::TransportFailure(err.to_string());
                        error!(port_id = core.port_id, %err, "sending create request failed");
                        EffectOutcome::Failed
                    }
                }
            }

            FaiEffect::SendCreateResponseToPeer {
                result,
                reason,
                fatal_on_failure,
            } => {
                let value = core
                    .response_flow()
                    .and_then(|f| codec::encode_flow(&f).ok())
                    .map(RibValue::Bytes);
                let remote = RemoteId {
                    underlying_port_id: core.underlying_port_id,
                    address: core.flow.as_ref().map(|f| f.source_address).unwrap_or(0),
                };
                match self.services.rib_daemon.remote_create_object_response(
                    rib::FLOW_RIB_OBJECT_CLASS,
                    &core.object_name,
                    value,
                    result,
                    reason.unwrap_or(""),
                    core.invoke_id,
                    remote,
                ) {
                    Ok(()) => EffectOutcome::Done,
                    Err(err) if fatal_on_failure => {
                        error!(port_id = core.port_id, %err, "sending create response failed");
                        EffectOutcome::Failed
                    }
                    Err(err) => {
                        warn!(port_id = core.port_id, %err, "sending create response failed");
                        EffectOutcome::Done
                    }
                }
            }

            FaiEffect::NotifyAllocateResult { result } => {
                let port_id = core.port_id;
                let Some(event) = core.request_event.as_mut() else {
                    return EffectOutcome::Done;
                };
                event.port_id = if result == 0 { port_id } else { -1 };
                if let Err(err) = self
                    .services
                    .ipc_manager
                    .allocate_flow_request_result(event, result)
                {
                    error!(port_id, %err, "problems communicating with the IPC manager");
                }
                EffectOutcome::Done
            }

            FaiEffect::NotifyIncomingFlow => {
                let Some(flow) = core.flow.as_ref() else {
                    return EffectOutcome::Failed;
                };
                match self.services.ipc_manager.allocate_flow_request_arrived(
                    &flow.destination_naming,
                    &flow.source_naming,
                    &flow.flow_specification,
                    core.port_id,
                ) {
                    Ok(handle) => {
                        debug!(
                            port_id = core.port_id,
                            handle, "informed IPC manager about incoming flow"
                        );
                        if core.allocate_response_message_handle.is_some() {
                            warn!(port_id = core.port_id, "incoming-flow handle already set");
                        } else {
                            core.allocate_response_message_handle = Some(handle);
                        }
                        EffectOutcome::Done
                    }
                    Err(err) => {
                        error!(port_id = core.port_id, %err, "could not notify incoming flow");
                        EffectOutcome::Failed
                    }
                }
            }

            FaiEffect::NotifyFlowDeallocated => {
                if let Err(err) = self.services.ipc_manager.flow_deallocated(core.port_id) {
                    error!(port_id = core.port_id, %err, "problems communicating with the IPC manager");
                }
                EffectOutcome::Done
            }

            FaiEffect::NotifyDeallocatedRemotely => {
                if let Err(err) = self
                    .services
                    .ipc_manager
                    .flow_deallocated_remotely(core.port_id, 0)
                {
                    error!(port_id = core.port_id, %err, "problems communicating with the IPC manager");
                }
                EffectOutcome::Done
            }

            FaiEffect::AddFlowRibObject => {
                let result = self.registry.lock().unwrap().insert_child(
                    rib::FLOW_SET_RIB_OBJECT_NAME,
                    &core.object_name,
                    FaRibObject::Flow {
                        port_id: core.port_id,
                    },
                );
                if let Err(err) = result {
                    warn!(port_id = core.port_id, %err, "error creating flow RIB object");
                }
                if let Err(err) = self.services.rib_daemon.create_object(
                    rib::FLOW_RIB_OBJECT_CLASS,
                    &core.object_name,
                    RibValue::None,
                ) {
                    warn!(port_id = core.port_id, %err, "error announcing flow RIB object");
                }
                EffectOutcome::Done
            }

            FaiEffect::RemoveFlowRibObject => {
                if let Err(err) = self.registry.lock().unwrap().remove(&core.object_name) {
                    warn!(port_id = core.port_id, %err, "problems deleting object from RIB");
                }
                if let Err(err) = self
                    .services
                    .rib_daemon
                    .delete_object(rib::FLOW_RIB_OBJECT_CLASS, &core.object_name)
                {
                    warn!(port_id = core.port_id, %err, "error announcing flow RIB deletion");
                }
                EffectOutcome::Done
            }

            FaiEffect::SendDeleteToPeer => {
                let Some(flow) = core.flow.as_ref() else {
                    return EffectOutcome::Done;
                };
                let address = if core.local_address == flow.source_address {
                    flow.destination_address
                } else {
                    flow.source_address
                };
                let remote = RemoteId {
                    underlying_port_id: core.underlying_port_id,
                    address,
                };
                if let Err(err) = self.services.rib_daemon.remote_delete_object(
                    rib::FLOW_RIB_OBJECT_CLASS,
                    &core.object_name,
                    remote,
                ) {
                    error!(port_id = core.port_id, %err, "problems sending delete flow request");
                }
                EffectOutcome::Done
            }

            FaiEffect::ScheduleTeardown => {
                TeardownTimer::schedule(self.instances.clone(), core.port_id);
                EffectOutcome::Done
            }

            FaiEffect::ReleasePortId => {
                if let Err(err) = self.services.kernel.deallocate_port_id(core.port_id) {
                    error!(port_id = core.port_id, %err, "problems releasing port-id");
                }
                EffectOutcome::Done
            }

            FaiEffect::RemoveInstance => EffectOutcome::Remove,
        }
    }
}
