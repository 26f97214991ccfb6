// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present Flowalloc Contributors

//! Flow allocator
//!
//! The process-wide flow allocator owns one flow allocator instance per
//! port-id, the QoS-cube catalogue and the data-transfer constants. It
//! dispatches kernel and IPC-Manager events to the right instance, answers
//! RIB operations addressed to its objects, and routes peer create
//! requests: terminating them here when the directory says the target
//! application is local, forwarding them toward the next hop otherwise.

use crate::codec;
use crate::config::{DataTransferConstants, DifConfiguration};
use crate::error::{FlowAllocatorError, RibError};
use crate::events::{
    AllocateFlowResponseEvent, CreateConnectionResponseEvent, CreateConnectionResultEvent,
    FlowDeallocateRequestEvent, FlowRequestEvent, UpdateConnectionResponseEvent,
};
use crate::fai::FlowAllocatorInstance;
use crate::flow::Flow;
use crate::policies::SimpleNewFlowRequestPolicy;
use crate::rib::{
    self, FaRibObject, RemoteId, RibObjectOps, RibRegistry, RibValue,
    DATA_TRANSFER_CONSTANTS_RIB_OBJECT_NAME, FLOW_SET_RIB_OBJECT_NAME,
    QOS_CUBE_SET_RIB_OBJECT_NAME,
};
use crate::services::FaServices;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, warn};

/// Registry of live flow allocator instances, keyed by port-id.
///
/// Handles to the table are what instances and timers carry instead of a
/// back-pointer to the allocator: enough capability to look an instance up
/// or unregister it, nothing more.
#[derive(Clone, Default)]
pub struct InstanceTable {
    inner: Arc<Mutex<HashMap<i32, Arc<FlowAllocatorInstance>>>>,
}

impl InstanceTable {
    pub(crate) fn insert(&self, instance: Arc<FlowAllocatorInstance>) {
        let mut map = self.inner.lock().unwrap();
        map.insert(instance.port_id(), instance);
    }

    /// Looks up the instance registered at `port_id`
    pub fn get(&self, port_id: i32) -> Option<Arc<FlowAllocatorInstance>> {
        let map = self.inner.lock().unwrap();
        map.get(&port_id).cloned()
    }

    /// Unregisters the instance at `port_id`
    pub fn remove(&self, port_id: i32) -> Option<Arc<FlowAllocatorInstance>> {
        let mut map = self.inner.lock().unwrap();
        map.remove(&port_id)
    }

    /// Whether an instance is registered at `port_id`
    pub fn contains(&self, port_id: i32) -> bool {
        let map = self.inner.lock().unwrap();
        map.contains_key(&port_id)
    }

    /// Number of live instances
    pub fn len(&self) -> usize {
        let map = self.inner.lock().unwrap();
        map.len()
    }

    /// Whether no instance is live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<FlowAllocatorInstance>> {
        let map = self.inner.lock().unwrap();
        map.values().cloned().collect()
    }
}

/// Process-wide flow allocator of one IPCP
pub struct FlowAllocator {
    services: FaServices,
    address: u32,
    instances: InstanceTable,
    registry: Arc<Mutex<RibRegistry>>,
}

impl FlowAllocator {
    /// Creates a flow allocator for the IPCP at `address`
    pub fn new(address: u32, services: FaServices) -> Self {
        Self {
            services,
            address,
            instances: InstanceTable::default(),
            registry: Arc::new(Mutex::new(RibRegistry::new())),
        }
    }

    /// Address of the owning IPCP
    pub fn address(&self) -> u32 {
        self.address
    }

    /// The live instance registry
    pub fn instances(&self) -> &InstanceTable {
        &self.instances
    }

    /// The QoS cubes currently configured
    pub fn qos_cubes(&self) -> Vec<Arc<crate::qos::QoSCube>> {
        self.registry.lock().unwrap().qos_cubes()
    }

    /// JSON listing of the allocator's RIB objects
    pub fn rib_dump(&self) -> serde_json::Value {
        self.registry.lock().unwrap().dump()
    }

    /// Registers the allocator's root objects in the RIB. Idempotent.
    pub fn populate_rib(&self) -> Result<(), FlowAllocatorError> {
        let roots = [
            (FLOW_SET_RIB_OBJECT_NAME, FaRibObject::FlowSet),
            (QOS_CUBE_SET_RIB_OBJECT_NAME, FaRibObject::QoSCubeSet),
            (
                DATA_TRANSFER_CONSTANTS_RIB_OBJECT_NAME,
                FaRibObject::DataTransferConstants(DataTransferConstants::default()),
            ),
        ];

        let mut registry = self.registry.lock().unwrap();
        for (name, object) in roots {
            let class = object.class();
            match registry.insert_root(name, object) {
                Ok(()) => {
                    if let Err(err) = self.services.rib_daemon.add_rib_object(class, name) {
                        error!(name, %err, "problems adding object to the RIB");
                    }
                }
                Err(RibError::AlreadyExists(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    /// Installs the DIF configuration: the QoS-cube catalogue and the
    /// data-transfer constants. Idempotent.
    pub fn set_dif_configuration(
        &self,
        config: &DifConfiguration,
    ) -> Result<(), FlowAllocatorError> {
        {
            let mut registry = self.registry.lock().unwrap();
            let _ = registry.remove(DATA_TRANSFER_CONSTANTS_RIB_OBJECT_NAME);
            registry.insert_root(
                DATA_TRANSFER_CONSTANTS_RIB_OBJECT_NAME,
                FaRibObject::DataTransferConstants(
                    config.efcp.data_transfer_constants.clone(),
                ),
            )?;
        }

        for cube in &config.efcp.qos_cubes {
            let name = rib::qos_cube_object_name(&cube.name);
            self.create_object(
                rib::QOS_CUBE_RIB_OBJECT_CLASS,
                &name,
                RibValue::QoSCube(Box::new(cube.clone())),
            )?;
        }
        Ok(())
    }

    fn reply_to_ipc_manager(&self, event: &FlowRequestEvent, result: i32) {
        if let Err(err) = self
            .services
            .ipc_manager
            .allocate_flow_request_result(event, result)
        {
            error!(%err, "problems communicating with the IPC manager daemon");
        }
    }

    /// Handles a local application's allocation request
    pub fn submit_allocate_request(&self, mut event: FlowRequestEvent) {
        let port_id = match self.services.kernel.allocate_port_id(&event.local_app_name) {
            Ok(port_id) => port_id,
            Err(err) => {
                let err = FlowAllocatorError::ResourceExhaustion(err.to_string());
                error!(%err, "problems requesting an available port-id");
                self.reply_to_ipc_manager(&event, -1);
                return;
            }
        };
        debug!(port_id, "got assigned port-id");
        event.port_id = port_id;

        let instance = FlowAllocatorInstance::new_source(
            port_id,
            self.address,
            self.services.clone(),
            self.registry.clone(),
            self.instances.clone(),
            Box::new(SimpleNewFlowRequestPolicy),
        );
        self.instances.insert(instance.clone());

        if let Err(err) = instance.submit_allocate_request(event.clone()) {
            error!(port_id, %err, "problems allocating flow");
            self.instances.remove(port_id);
            if let Err(err) = self.services.kernel.deallocate_port_id(port_id) {
                error!(port_id, %err, "problems releasing port-id");
            }
            self.reply_to_ipc_manager(&event, -1);
        }
    }

    /// Handles a peer create request: terminates it here when the target
    /// application is reachable through this IPCP, forwards it otherwise
    pub fn create_flow_request_message_received(
        &self,
        mut flow: Flow,
        object_name: &str,
        invoke_id: i32,
        underlying_port_id: i32,
    ) {
        let Some(next_hop) = self
            .services
            .namespace
            .dft_next_hop(&flow.destination_naming)
        else {
            error!(
                destination = %flow.destination_naming,
                "the directory forwarding table returned no entries"
            );
            return;
        };

        if next_hop == self.address {
            let port_id = match self.services.kernel.allocate_port_id(&flow.destination_naming) {
                Ok(port_id) => port_id,
                Err(err) => {
                    error!(%err, "problems requesting an available port-id, ignoring the flow allocation request");
                    return;
                }
            };
            debug!(
                port_id,
                "destination application is reachable through this IPCP"
            );
            let instance = FlowAllocatorInstance::new_destination(
                port_id,
                self.address,
                self.services.clone(),
                self.registry.clone(),
                self.instances.clone(),
            );
            self.instances.insert(instance.clone());
            instance.create_flow_request_message_received(
                flow,
                object_name.to_string(),
                invoke_id,
                underlying_port_id,
            );
            return;
        }

        // Not for us: spend a hop and relay toward the next hop.
        flow.hop_count -= 1;
        if flow.hop_count <= 0 {
            let err =
                FlowAllocatorError::HopCountExpired(flow.destination_naming.to_string());
            warn!(%err, "dropping create request");
            let remote = RemoteId {
                underlying_port_id,
                address: flow.source_address,
            };
            let reason = err.to_string();
            if let Err(err) = self.services.rib_daemon.remote_create_object_response(
                rib::FLOW_RIB_OBJECT_CLASS,
                object_name,
                None,
                -1,
                &reason,
                invoke_id,
                remote,
            ) {
                error!(%err, "problems sending negative create flow response");
            }
            return;
        }

        let Some(session) = self.services.cdap.session_to_address(next_hop) else {
            error!(next_hop, "no CDAP session toward the next hop, dropping create request");
            return;
        };
        let bytes = match codec::encode_flow(&flow) {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(%err, "could not re-encode flow for forwarding");
                return;
            }
        };
        debug!(next_hop, hop_count = flow.hop_count, "forwarding create request");
        if let Err(err) = self.services.rib_daemon.remote_create_object(
            rib::FLOW_RIB_OBJECT_CLASS,
            object_name,
            RibValue::Bytes(bytes),
            RemoteId {
                underlying_port_id: session,
                address: next_hop,
            },
        ) {
            error!(%err, "problems forwarding create flow request");
        }
    }

    /// Routes an application's answer to an incoming flow by the handle of
    /// the notification it answers
    pub fn submit_allocate_response(&self, event: AllocateFlowResponseEvent) {
        debug!(
            sequence_number = event.sequence_number,
            result = event.result,
            "local application invoked allocate response"
        );
        for instance in self.instances.snapshot() {
            if instance.allocate_response_message_handle() == Some(event.sequence_number) {
                instance.submit_allocate_response(event);
                return;
            }
        }
        error!(
            sequence_number = event.sequence_number,
            "could not find an instance with this handle"
        );
    }

    /// Routes a kernel create-connection answer
    pub fn process_create_connection_response(&self, event: CreateConnectionResponseEvent) {
        match self.instances.get(event.port_id) {
            Some(instance) => instance.process_create_connection_response(event),
            None => self.drop_for_unknown_port(event.port_id, "create connection response"),
        }
    }

    /// Routes a kernel arrived-connection answer
    pub fn process_create_connection_result(&self, event: CreateConnectionResultEvent) {
        match self.instances.get(event.port_id) {
            Some(instance) => instance.process_create_connection_result(event),
            None => self.drop_for_unknown_port(event.port_id, "create connection result"),
        }
    }

    /// Routes a kernel update-connection answer
    pub fn process_update_connection_response(&self, event: UpdateConnectionResponseEvent) {
        match self.instances.get(event.port_id) {
            Some(instance) => instance.process_update_connection_response(event),
            None => self.drop_for_unknown_port(event.port_id, "update connection response"),
        }
    }

    /// Handles a local application's deallocation request
    pub fn submit_deallocate(&self, event: FlowDeallocateRequestEvent) {
        match self.instances.get(event.port_id) {
            Some(instance) => {
                instance.submit_deallocate(event);
                if let Err(err) = self.services.ipc_manager.notify_flow_deallocated(&event, 0) {
                    error!(port_id = event.port_id, %err, "error communicating with the IPC manager");
                }
            }
            None => {
                self.drop_for_unknown_port(event.port_id, "deallocate request");
                if let Err(err) = self.services.ipc_manager.notify_flow_deallocated(&event, -1) {
                    error!(port_id = event.port_id, %err, "error communicating with the IPC manager");
                }
            }
        }
    }

    /// Unregisters the instance at `port_id`
    pub fn remove_flow_allocator_instance(&self, port_id: i32) {
        self.instances.remove(port_id);
    }

    fn drop_for_unknown_port(&self, port_id: i32, what: &str) {
        error!(port_id, what, "event for unknown port-id");
        if let Err(err) = self.services.kernel.deallocate_port_id(port_id) {
            error!(port_id, %err, "problems requesting port-id deallocation");
        }
    }
}

impl RibObjectOps for FlowAllocator {
    fn create_object(
        &self,
        class: &str,
        name: &str,
        value: RibValue,
    ) -> Result<(), FlowAllocatorError> {
        if class == rib::QOS_CUBE_RIB_OBJECT_CLASS {
            let RibValue::QoSCube(cube) = value else {
                return Err(RibError::BadValue(name.to_string()).into());
            };
            self.registry.lock().unwrap().insert_child(
                QOS_CUBE_SET_RIB_OBJECT_NAME,
                name,
                FaRibObject::QoSCube(Arc::new(*cube)),
            )?;
            return Ok(());
        }
        Err(RibError::OperationNotSupported {
            operation: "createObject",
            name: name.to_string(),
        }
        .into())
    }

    fn delete_object(
        &self,
        name: &str,
        value: Option<RibValue>,
    ) -> Result<(), FlowAllocatorError> {
        if name == QOS_CUBE_SET_RIB_OBJECT_NAME {
            if value.is_some() {
                warn!("object value should have been NULL");
            }
            let removed = self
                .registry
                .lock()
                .unwrap()
                .remove_children(QOS_CUBE_SET_RIB_OBJECT_NAME)?;
            debug!(count = removed.len(), "removed QoS cubes");
            return Ok(());
        }
        Err(RibError::OperationNotSupported {
            operation: "deleteObject",
            name: name.to_string(),
        }
        .into())
    }

    fn remote_create_object(
        &self,
        name: &str,
        value: RibValue,
        invoke_id: i32,
        underlying_port_id: i32,
    ) -> Result<(), FlowAllocatorError> {
        if name == FLOW_SET_RIB_OBJECT_NAME
            || name.starts_with(&format!("{FLOW_SET_RIB_OBJECT_NAME}{}", rib::SEPARATOR))
        {
            let RibValue::Bytes(bytes) = value else {
                return Err(RibError::BadValue(name.to_string()).into());
            };
            let flow = codec::decode_flow(&bytes)?;
            self.create_flow_request_message_received(flow, name, invoke_id, underlying_port_id);
            return Ok(());
        }
        if name == DATA_TRANSFER_CONSTANTS_RIB_OBJECT_NAME {
            // Constants are fixed before enrollment via DIF assignment.
            debug!("ignoring remote create of data transfer constants");
            return Ok(());
        }
        Err(RibError::OperationNotSupported {
            operation: "remoteCreateObject",
            name: name.to_string(),
        }
        .into())
    }

    fn remote_delete_object(
        &self,
        name: &str,
        _invoke_id: i32,
        _underlying_port_id: i32,
    ) -> Result<(), FlowAllocatorError> {
        let object = self.registry.lock().unwrap().get(name).cloned();
        match object {
            Some(FaRibObject::Flow { port_id }) => match self.instances.get(port_id) {
                Some(instance) => {
                    instance.delete_flow_request_message_received();
                    Ok(())
                }
                None => Err(FlowAllocatorError::NotFound(format!(
                    "no flow allocator instance at port-id {port_id}"
                ))),
            },
            Some(_) => Err(RibError::OperationNotSupported {
                operation: "remoteDeleteObject",
                name: name.to_string(),
            }
            .into()),
            None => Err(RibError::NotFound(name.to_string()).into()),
        }
    }

    fn remote_read_object(
        &self,
        name: &str,
        invoke_id: i32,
        underlying_port_id: i32,
    ) -> Result<(), FlowAllocatorError> {
        if name == DATA_TRANSFER_CONSTANTS_RIB_OBJECT_NAME {
            let constants = match self.registry.lock().unwrap().get(name).cloned() {
                Some(FaRibObject::DataTransferConstants(constants)) => constants,
                _ => return Err(RibError::NotFound(name.to_string()).into()),
            };
            self.services.rib_daemon.remote_read_object_response(
                rib::DATA_TRANSFER_CONSTANTS_RIB_OBJECT_CLASS,
                name,
                RibValue::DataTransferConstants(constants),
                0,
                "",
                invoke_id,
                RemoteId {
                    underlying_port_id,
                    address: 0,
                },
            )?;
            return Ok(());
        }
        Err(RibError::OperationNotSupported {
            operation: "remoteReadObject",
            name: name.to_string(),
        }
        .into())
    }

    fn create_response(
        &self,
        name: &str,
        result: i32,
        result_reason: Option<&str>,
        value: RibValue,
    ) -> Result<(), FlowAllocatorError> {
        let Some(port_id) = rib::port_id_from_flow_object_name(name) else {
            return Err(FlowAllocatorError::MalformedMessage(format!(
                "create response for unparseable object name {name}"
            )));
        };
        let Some(instance) = self.instances.get(port_id) else {
            warn!(port_id, "create response for unknown instance");
            return Err(FlowAllocatorError::NotFound(format!(
                "no flow allocator instance at port-id {port_id}"
            )));
        };
        let flow = match value {
            RibValue::Bytes(bytes) => Some(codec::decode_flow(&bytes)?),
            _ => None,
        };
        instance.create_response_received(result, result_reason, flow);
        Ok(())
    }

    fn displayable(&self, name: &str) -> Result<String, FlowAllocatorError> {
        let object = self.registry.lock().unwrap().get(name).cloned();
        match object {
            Some(FaRibObject::Flow { port_id }) => self
                .instances
                .get(port_id)
                .and_then(|i| i.displayable_flow())
                .ok_or_else(|| {
                    FlowAllocatorError::NotFound(format!(
                        "no flow allocator instance at port-id {port_id}"
                    ))
                }),
            Some(FaRibObject::QoSCube(cube)) => Ok(cube.to_string()),
            Some(FaRibObject::DataTransferConstants(constants)) => Ok(constants.to_string()),
            Some(FaRibObject::FlowSet) | Some(FaRibObject::QoSCubeSet) => {
                let children = self.registry.lock().unwrap().child_names(name);
                Ok(children.join("\n"))
            }
            None => Err(RibError::NotFound(name.to_string()).into()),
        }
    }

    fn value(&self, name: &str) -> Result<RibValue, FlowAllocatorError> {
        let object = self.registry.lock().unwrap().get(name).cloned();
        match object {
            Some(FaRibObject::Flow { port_id }) => Ok(self
                .instances
                .get(port_id)
                .and_then(|i| i.encoded_flow())
                .map(RibValue::Bytes)
                .unwrap_or(RibValue::None)),
            Some(FaRibObject::QoSCube(cube)) => {
                Ok(RibValue::QoSCube(Box::new((*cube).clone())))
            }
            Some(FaRibObject::DataTransferConstants(constants)) => {
                Ok(RibValue::DataTransferConstants(constants))
            }
            Some(FaRibObject::FlowSet) | Some(FaRibObject::QoSCubeSet) => Ok(RibValue::None),
            None => Err(RibError::NotFound(name.to_string()).into()),
        }
    }
}
