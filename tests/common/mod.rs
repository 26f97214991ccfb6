// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present Flowalloc Contributors

//! Stub collaborators and a test harness for driving the flow allocator
//! end to end. Every stub records the calls it receives so tests can
//! assert on the traffic that crossed each boundary.

#![allow(dead_code)]

use flowalloc::dft::DirectoryForwardingTable;
use flowalloc::error::ServiceError;
use flowalloc::events::{FlowDeallocateRequestEvent, FlowRequestEvent};
use flowalloc::flow::{Connection, Flow, FlowSpecification};
use flowalloc::naming::ApplicationProcessNamingInfo;
use flowalloc::rib::{RemoteId, RibValue};
use flowalloc::services::{
    CdapSessions, FaServices, IpcManager, KernelIpcProcess, SecurityManager,
};
use flowalloc::{FlowAllocator, QoSCube};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Kernel stub handing out sequential port-ids
#[derive(Default)]
pub struct StubKernel {
    next_port_id: AtomicI32,
    pub fail_allocation: AtomicBool,
    pub allocated: Mutex<Vec<i32>>,
    pub deallocated: Mutex<Vec<i32>>,
    pub create_connection_calls: Mutex<Vec<Connection>>,
    pub create_connection_arrived_calls: Mutex<Vec<Connection>>,
    pub update_connection_calls: Mutex<Vec<Connection>>,
}

impl StubKernel {
    pub fn starting_at(first_port_id: i32) -> Arc<Self> {
        let kernel = Self::default();
        kernel.next_port_id.store(first_port_id, Ordering::SeqCst);
        Arc::new(kernel)
    }
}

impl KernelIpcProcess for StubKernel {
    fn allocate_port_id(
        &self,
        _app_name: &ApplicationProcessNamingInfo,
    ) -> Result<i32, ServiceError> {
        if self.fail_allocation.load(Ordering::SeqCst) {
            return Err(ServiceError::PortIdsExhausted);
        }
        let port_id = self.next_port_id.fetch_add(1, Ordering::SeqCst);
        self.allocated.lock().unwrap().push(port_id);
        Ok(port_id)
    }

    fn deallocate_port_id(&self, port_id: i32) -> Result<(), ServiceError> {
        self.deallocated.lock().unwrap().push(port_id);
        Ok(())
    }

    fn create_connection(&self, connection: &Connection) -> Result<(), ServiceError> {
        self.create_connection_calls
            .lock()
            .unwrap()
            .push(connection.clone());
        Ok(())
    }

    fn create_connection_arrived(&self, connection: &Connection) -> Result<(), ServiceError> {
        self.create_connection_arrived_calls
            .lock()
            .unwrap()
            .push(connection.clone());
        Ok(())
    }

    fn update_connection(&self, connection: &Connection) -> Result<(), ServiceError> {
        self.update_connection_calls
            .lock()
            .unwrap()
            .push(connection.clone());
        Ok(())
    }
}

/// Recorded incoming-flow notification
#[derive(Debug, Clone)]
pub struct ArrivedNotification {
    pub dest_app_name: ApplicationProcessNamingInfo,
    pub source_app_name: ApplicationProcessNamingInfo,
    pub port_id: i32,
    pub handle: u32,
}

/// IPC-Manager daemon stub
#[derive(Default)]
pub struct StubIpcManager {
    next_handle: AtomicU32,
    pub allocate_results: Mutex<Vec<(i32, i32)>>,
    pub arrived: Mutex<Vec<ArrivedNotification>>,
    pub deallocate_notifications: Mutex<Vec<(i32, i32)>>,
    pub flows_deallocated: Mutex<Vec<i32>>,
    pub flows_deallocated_remotely: Mutex<Vec<(i32, i32)>>,
}

impl StubIpcManager {
    pub fn new() -> Arc<Self> {
        let ipcm = Self::default();
        ipcm.next_handle.store(100, Ordering::SeqCst);
        Arc::new(ipcm)
    }
}

impl IpcManager for StubIpcManager {
    fn allocate_flow_request_result(
        &self,
        event: &FlowRequestEvent,
        result: i32,
    ) -> Result<(), ServiceError> {
        self.allocate_results
            .lock()
            .unwrap()
            .push((event.port_id, result));
        Ok(())
    }

    fn allocate_flow_request_arrived(
        &self,
        dest_app_name: &ApplicationProcessNamingInfo,
        source_app_name: &ApplicationProcessNamingInfo,
        _flow_specification: &FlowSpecification,
        port_id: i32,
    ) -> Result<u32, ServiceError> {
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.arrived.lock().unwrap().push(ArrivedNotification {
            dest_app_name: dest_app_name.clone(),
            source_app_name: source_app_name.clone(),
            port_id,
            handle,
        });
        Ok(handle)
    }

    fn notify_flow_deallocated(
        &self,
        event: &FlowDeallocateRequestEvent,
        result: i32,
    ) -> Result<(), ServiceError> {
        self.deallocate_notifications
            .lock()
            .unwrap()
            .push((event.port_id, result));
        Ok(())
    }

    fn flow_deallocated(&self, port_id: i32) -> Result<(), ServiceError> {
        self.flows_deallocated.lock().unwrap().push(port_id);
        Ok(())
    }

    fn flow_deallocated_remotely(&self, port_id: i32, reason: i32) -> Result<(), ServiceError> {
        self.flows_deallocated_remotely
            .lock()
            .unwrap()
            .push((port_id, reason));
        Ok(())
    }
}

/// Recorded outbound M_CREATE
#[derive(Debug, Clone)]
pub struct RecordedCreate {
    pub class: String,
    pub name: String,
    pub bytes: Vec<u8>,
    pub remote: RemoteId,
}

/// Recorded outbound M_CREATE response
#[derive(Debug, Clone)]
pub struct RecordedCreateResponse {
    pub name: String,
    pub bytes: Option<Vec<u8>>,
    pub result: i32,
    pub reason: String,
    pub invoke_id: i32,
    pub remote: RemoteId,
}

/// RIB daemon stub recording all outbound traffic
#[derive(Default)]
pub struct StubRibDaemon {
    pub fail_remote_create: AtomicBool,
    pub fail_remote_create_response: AtomicBool,
    pub added_objects: Mutex<Vec<(String, String)>>,
    pub created_objects: Mutex<Vec<(String, String)>>,
    pub deleted_objects: Mutex<Vec<String>>,
    pub remote_creates: Mutex<Vec<RecordedCreate>>,
    pub remote_create_responses: Mutex<Vec<RecordedCreateResponse>>,
    pub remote_deletes: Mutex<Vec<(String, RemoteId)>>,
    pub remote_read_responses: Mutex<Vec<(String, i32)>>,
}

impl StubRibDaemon {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

fn value_bytes(value: RibValue) -> Option<Vec<u8>> {
    match value {
        RibValue::Bytes(bytes) => Some(bytes),
        _ => None,
    }
}

impl flowalloc::rib::RibDaemon for StubRibDaemon {
    fn add_rib_object(&self, class: &str, name: &str) -> Result<(), ServiceError> {
        self.added_objects
            .lock()
            .unwrap()
            .push((class.to_string(), name.to_string()));
        Ok(())
    }

    fn create_object(
        &self,
        class: &str,
        name: &str,
        _value: RibValue,
    ) -> Result<(), ServiceError> {
        self.created_objects
            .lock()
            .unwrap()
            .push((class.to_string(), name.to_string()));
        Ok(())
    }

    fn delete_object(&self, _class: &str, name: &str) -> Result<(), ServiceError> {
        self.deleted_objects.lock().unwrap().push(name.to_string());
        Ok(())
    }

    fn remote_create_object(
        &self,
        class: &str,
        name: &str,
        value: RibValue,
        remote: RemoteId,
    ) -> Result<(), ServiceError> {
        if self.fail_remote_create.load(Ordering::SeqCst) {
            return Err(ServiceError::Unavailable("link down".to_string()));
        }
        self.remote_creates.lock().unwrap().push(RecordedCreate {
            class: class.to_string(),
            name: name.to_string(),
            bytes: value_bytes(value).unwrap_or_default(),
            remote,
        });
        Ok(())
    }

    fn remote_create_object_response(
        &self,
        _class: &str,
        name: &str,
        value: Option<RibValue>,
        result: i32,
        result_reason: &str,
        invoke_id: i32,
        remote: RemoteId,
    ) -> Result<(), ServiceError> {
        if self.fail_remote_create_response.load(Ordering::SeqCst) {
            return Err(ServiceError::Unavailable("link down".to_string()));
        }
        self.remote_create_responses
            .lock()
            .unwrap()
            .push(RecordedCreateResponse {
                name: name.to_string(),
                bytes: value.and_then(value_bytes),
                result,
                reason: result_reason.to_string(),
                invoke_id,
                remote,
            });
        Ok(())
    }

    fn remote_delete_object(
        &self,
        _class: &str,
        name: &str,
        remote: RemoteId,
    ) -> Result<(), ServiceError> {
        self.remote_deletes
            .lock()
            .unwrap()
            .push((name.to_string(), remote));
        Ok(())
    }

    fn remote_read_object_response(
        &self,
        _class: &str,
        name: &str,
        _value: RibValue,
        result: i32,
        _result_reason: &str,
        _invoke_id: i32,
        _remote: RemoteId,
    ) -> Result<(), ServiceError> {
        self.remote_read_responses
            .lock()
            .unwrap()
            .push((name.to_string(), result));
        Ok(())
    }
}

/// Security manager stub with a switchable verdict
pub struct StubSecurityManager {
    pub accept: AtomicBool,
}

impl StubSecurityManager {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self {
            accept: AtomicBool::new(true),
        })
    }
}

impl SecurityManager for StubSecurityManager {
    fn accept_flow(&self, _flow: &Flow) -> bool {
        self.accept.load(Ordering::SeqCst)
    }
}

/// CDAP session stub mapping peer addresses to session ids
#[derive(Default)]
pub struct StubCdapSessions {
    sessions: Mutex<HashMap<u32, i32>>,
}

impl StubCdapSessions {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_session(&self, address: u32, session_id: i32) {
        self.sessions.lock().unwrap().insert(address, session_id);
    }
}

impl CdapSessions for StubCdapSessions {
    fn session_to_address(&self, address: u32) -> Option<i32> {
        self.sessions.lock().unwrap().get(&address).copied()
    }

    fn session_ids(&self) -> Vec<i32> {
        self.sessions.lock().unwrap().values().copied().collect()
    }
}

/// A flow allocator wired to recording stubs
pub struct Harness {
    pub fa: FlowAllocator,
    pub kernel: Arc<StubKernel>,
    pub ipcm: Arc<StubIpcManager>,
    pub rib: Arc<StubRibDaemon>,
    pub dft: Arc<DirectoryForwardingTable>,
    pub security: Arc<StubSecurityManager>,
    pub cdap: Arc<StubCdapSessions>,
}

impl Harness {
    /// Allocator at `address` handing out port-ids from `first_port_id`,
    /// with the RIB populated and both default cubes configured
    pub fn new(address: u32, first_port_id: i32) -> Self {
        init_tracing();
        let kernel = StubKernel::starting_at(first_port_id);
        let ipcm = StubIpcManager::new();
        let rib = StubRibDaemon::new();
        let dft = Arc::new(DirectoryForwardingTable::new());
        let security = StubSecurityManager::accepting();
        let cdap = StubCdapSessions::new();

        let fa = FlowAllocator::new(
            address,
            FaServices {
                kernel: kernel.clone(),
                ipc_manager: ipcm.clone(),
                rib_daemon: rib.clone(),
                namespace: dft.clone(),
                security: security.clone(),
                cdap: cdap.clone(),
            },
        );
        fa.populate_rib().unwrap();
        fa.set_dif_configuration(&flowalloc::DifConfiguration {
            dif_name: "test.DIF".to_string(),
            efcp: flowalloc::EfcpConfiguration {
                qos_cubes: vec![QoSCube::unreliable(), QoSCube::reliable()],
                data_transfer_constants: Default::default(),
            },
        })
        .unwrap();

        Harness {
            fa,
            kernel,
            ipcm,
            rib,
            dft,
            security,
            cdap,
        }
    }
}

pub fn app(name: &str) -> ApplicationProcessNamingInfo {
    ApplicationProcessNamingInfo::new(name, "1")
}

pub fn flow_request(local: &str, remote: &str, max_allowable_gap: i32) -> FlowRequestEvent {
    FlowRequestEvent {
        local_app_name: app(local),
        remote_app_name: app(remote),
        flow_specification: FlowSpecification {
            max_allowable_gap,
            ..Default::default()
        },
        port_id: 0,
        flow_requestor_ipcp_id: 0,
    }
}

/// A source-side flow as it would arrive on the wire at the destination
pub fn incoming_flow_bytes(
    source_address: u32,
    destination_address: u32,
    source_port_id: i32,
    source_cep_id: i32,
    hop_count: i32,
) -> Vec<u8> {
    let mut flow = Flow {
        source_naming: app("client"),
        destination_naming: app("server"),
        source_port_id,
        source_address,
        destination_address,
        connections: vec![Connection {
            port_id: source_port_id,
            source_address,
            dest_address: destination_address,
            source_cep_id,
            qos_id: 1,
            ..Default::default()
        }],
        state: flowalloc::FlowState::AllocationInProgress,
        hop_count,
        max_create_flow_retries: 1,
        source: true,
        ..Default::default()
    };
    flow.flow_specification.max_allowable_gap = -1;
    flowalloc::encode_flow(&flow).unwrap()
}

/// Drives a source-side allocation to `FlowAllocated`; returns the flow
/// object name. The harness must be at address 10 with port-ids from 430.
pub fn establish_source_flow(h: &Harness) -> String {
    use flowalloc::events::{CreateConnectionResponseEvent, UpdateConnectionResponseEvent};
    use flowalloc::RibObjectOps;

    h.dft.add_entry(app("server"), 20);
    h.cdap.add_session(20, 4);
    h.fa
        .submit_allocate_request(flow_request("client", "server", -1));
    let port_id = *h.kernel.allocated.lock().unwrap().last().unwrap();
    h.fa
        .process_create_connection_response(CreateConnectionResponseEvent {
            port_id,
            cep_id: 7,
        });

    let create = h.rib.remote_creates.lock().unwrap().last().unwrap().clone();
    let mut answer = flowalloc::decode_flow(&create.bytes).unwrap();
    answer.destination_port_id = 87;
    if let Some(conn) = answer.active_connection_mut() {
        conn.dest_cep_id = 9;
    }
    let bytes = flowalloc::encode_flow(&answer).unwrap();
    h.fa
        .create_response(&create.name, 0, None, RibValue::Bytes(bytes))
        .unwrap();
    h.fa
        .process_update_connection_response(UpdateConnectionResponseEvent { port_id, result: 0 });
    create.name
}

/// Drives an incoming allocation to `FlowAllocated` on the responding
/// side; returns the local port-id and the flow object name
pub fn establish_destination_flow(h: &Harness) -> (i32, String) {
    use flowalloc::events::{AllocateFlowResponseEvent, CreateConnectionResultEvent};
    use flowalloc::RibObjectOps;

    h.dft.add_entry(app("server"), h.fa.address());
    h.dft.register_local(app("server"), 3);
    let name = "/dif/flows/10-430".to_string();
    let bytes = incoming_flow_bytes(10, h.fa.address(), 430, 7, 3);
    h.fa
        .remote_create_object(&name, RibValue::Bytes(bytes), 55, 4)
        .unwrap();

    let port_id = *h.kernel.allocated.lock().unwrap().last().unwrap();
    h.fa
        .process_create_connection_result(CreateConnectionResultEvent {
            port_id,
            source_cep_id: 9,
        });
    let handle = h.ipcm.arrived.lock().unwrap().last().unwrap().handle;
    h.fa.submit_allocate_response(AllocateFlowResponseEvent {
        sequence_number: handle,
        result: 0,
    });
    (port_id, name)
}
