// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present Flowalloc Contributors

//! RIB objects of the flow allocator
//!
//! The flow allocator owns a small subtree of the IPCP's Resource
//! Information Base: the flow set, the QoS-cube set with one child per
//! cube, the per-flow objects, and the data-transfer constants. Object
//! kinds are a tagged variant stored in an arena; children are addressed
//! by name through the arena index, never by pointer. The RIB daemon
//! routes peer CDAP operations to the allocator through the
//! `RibObjectOps` trait and carries outbound messages through `RibDaemon`.

use crate::config::DataTransferConstants;
use crate::error::{RibError, ServiceError};
use crate::qos::QoSCube;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Separator between components of a RIB object name
pub const SEPARATOR: char = '/';

pub const FLOW_SET_RIB_OBJECT_CLASS: &str = "FlowSet";
pub const FLOW_SET_RIB_OBJECT_NAME: &str = "/dif/flows";
pub const FLOW_RIB_OBJECT_CLASS: &str = "Flow";
pub const QOS_CUBE_SET_RIB_OBJECT_CLASS: &str = "QoSCubeSet";
pub const QOS_CUBE_SET_RIB_OBJECT_NAME: &str = "/dif/qoscubes";
pub const QOS_CUBE_RIB_OBJECT_CLASS: &str = "QoSCube";
pub const DATA_TRANSFER_CONSTANTS_RIB_OBJECT_CLASS: &str = "DataTransferConstants";
pub const DATA_TRANSFER_CONSTANTS_RIB_OBJECT_NAME: &str = "/dif/datatransferconstants";

/// Name of the RIB object describing a flow
pub fn flow_object_name(source_address: u32, port_id: i32) -> String {
    format!("{FLOW_SET_RIB_OBJECT_NAME}{SEPARATOR}{source_address}-{port_id}")
}

/// Name of the RIB object describing a QoS cube
pub fn qos_cube_object_name(cube_name: &str) -> String {
    format!("{QOS_CUBE_SET_RIB_OBJECT_NAME}{SEPARATOR}{cube_name}")
}

/// Port-id encoded in a flow object name, if the name parses
pub fn port_id_from_flow_object_name(name: &str) -> Option<i32> {
    let leaf = name.rsplit(SEPARATOR).next()?;
    let (_, port) = leaf.split_once('-')?;
    port.parse().ok()
}

/// Value carried by a RIB operation
#[derive(Debug, Clone)]
pub enum RibValue {
    /// An encoded flow record (see the codec module)
    Bytes(Vec<u8>),
    /// A QoS cube
    QoSCube(Box<QoSCube>),
    /// The DIF's data-transfer constants
    DataTransferConstants(DataTransferConstants),
    /// No value
    None,
}

/// Addressing of the remote IPCP a RIB message targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteId {
    /// Port-id of the management CDAP session to send over
    pub underlying_port_id: i32,
    /// Address of the remote IPCP
    pub address: u32,
}

/// Outbound RIB daemon interface.
///
/// All sends are message-passing: a returned `Ok` means the message was
/// accepted for delivery, not that the peer processed it. Responses come
/// back through `RibObjectOps`.
pub trait RibDaemon: Send + Sync {
    /// Announces a locally owned object so incoming operations reach it
    fn add_rib_object(&self, class: &str, name: &str) -> Result<(), ServiceError>;

    /// Announces creation of a locally owned object
    fn create_object(&self, class: &str, name: &str, value: RibValue) -> Result<(), ServiceError>;

    /// Announces deletion of a locally owned object
    fn delete_object(&self, class: &str, name: &str) -> Result<(), ServiceError>;

    /// Sends an M_CREATE for `name` to the remote IPCP
    fn remote_create_object(
        &self,
        class: &str,
        name: &str,
        value: RibValue,
        remote: RemoteId,
    ) -> Result<(), ServiceError>;

    /// Answers a previously received M_CREATE
    #[allow(clippy::too_many_arguments)]
    fn remote_create_object_response(
        &self,
        class: &str,
        name: &str,
        value: Option<RibValue>,
        result: i32,
        result_reason: &str,
        invoke_id: i32,
        remote: RemoteId,
    ) -> Result<(), ServiceError>;

    /// Sends an M_DELETE for `name` to the remote IPCP
    fn remote_delete_object(
        &self,
        class: &str,
        name: &str,
        remote: RemoteId,
    ) -> Result<(), ServiceError>;

    /// Answers a previously received M_READ
    #[allow(clippy::too_many_arguments)]
    fn remote_read_object_response(
        &self,
        class: &str,
        name: &str,
        value: RibValue,
        result: i32,
        result_reason: &str,
        invoke_id: i32,
        remote: RemoteId,
    ) -> Result<(), ServiceError>;
}

/// Inbound RIB operations, dispatched by object name.
///
/// The RIB daemon calls these when a local component or a peer CDAP
/// message addresses one of the flow allocator's objects.
pub trait RibObjectOps {
    /// Inserts a child object (local configuration path)
    fn create_object(
        &self,
        class: &str,
        name: &str,
        value: RibValue,
    ) -> Result<(), crate::error::FlowAllocatorError>;

    /// Deletes an object; on a set object with no value, deletes every child
    fn delete_object(
        &self,
        name: &str,
        value: Option<RibValue>,
    ) -> Result<(), crate::error::FlowAllocatorError>;

    /// Handles a peer M_CREATE addressed to one of our objects
    fn remote_create_object(
        &self,
        name: &str,
        value: RibValue,
        invoke_id: i32,
        underlying_port_id: i32,
    ) -> Result<(), crate::error::FlowAllocatorError>;

    /// Handles a peer M_DELETE addressed to one of our objects
    fn remote_delete_object(
        &self,
        name: &str,
        invoke_id: i32,
        underlying_port_id: i32,
    ) -> Result<(), crate::error::FlowAllocatorError>;

    /// Handles a peer M_READ addressed to one of our objects
    fn remote_read_object(
        &self,
        name: &str,
        invoke_id: i32,
        underlying_port_id: i32,
    ) -> Result<(), crate::error::FlowAllocatorError>;

    /// Handles the peer's answer to an M_CREATE we sent
    fn create_response(
        &self,
        name: &str,
        result: i32,
        result_reason: Option<&str>,
        value: RibValue,
    ) -> Result<(), crate::error::FlowAllocatorError>;

    /// Renders an object for operator inspection
    fn displayable(&self, name: &str) -> Result<String, crate::error::FlowAllocatorError>;

    /// Returns an object's current value
    fn value(&self, name: &str) -> Result<RibValue, crate::error::FlowAllocatorError>;
}

/// Object kinds the flow allocator stores in its registry
#[derive(Debug, Clone)]
pub enum FaRibObject {
    /// Root of the per-flow objects
    FlowSet,
    /// One provisioned flow, owned by the instance at `port_id`
    Flow { port_id: i32 },
    /// Root of the QoS-cube catalogue
    QoSCubeSet,
    /// One QoS cube; the registry owns it, instances borrow it
    QoSCube(Arc<QoSCube>),
    /// The DIF's data-transfer constants
    DataTransferConstants(DataTransferConstants),
}

impl FaRibObject {
    /// The RIB class of this object kind
    pub fn class(&self) -> &'static str {
        match self {
            FaRibObject::FlowSet => FLOW_SET_RIB_OBJECT_CLASS,
            FaRibObject::Flow { .. } => FLOW_RIB_OBJECT_CLASS,
            FaRibObject::QoSCubeSet => QOS_CUBE_SET_RIB_OBJECT_CLASS,
            FaRibObject::QoSCube(_) => QOS_CUBE_RIB_OBJECT_CLASS,
            FaRibObject::DataTransferConstants(_) => DATA_TRANSFER_CONSTANTS_RIB_OBJECT_CLASS,
        }
    }
}

/// One arena slot
#[derive(Debug)]
struct RibEntry {
    name: String,
    object: FaRibObject,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Arena-backed registry of the flow allocator's RIB objects
#[derive(Debug, Default)]
pub struct RibRegistry {
    slots: Vec<Option<RibEntry>>,
    index: HashMap<String, usize>,
    free: Vec<usize>,
}

impl RibRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_slot(&mut self, entry: RibEntry) -> usize {
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                slot
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        }
    }

    /// Inserts a root object
    pub fn insert_root(&mut self, name: &str, object: FaRibObject) -> Result<(), RibError> {
        if self.index.contains_key(name) {
            return Err(RibError::AlreadyExists(name.to_string()));
        }
        let slot = self.alloc_slot(RibEntry {
            name: name.to_string(),
            object,
            parent: None,
            children: Vec::new(),
        });
        self.index.insert(name.to_string(), slot);
        Ok(())
    }

    /// Inserts a child under `parent_name`, replacing any same-named child
    pub fn insert_child(
        &mut self,
        parent_name: &str,
        name: &str,
        object: FaRibObject,
    ) -> Result<(), RibError> {
        let parent_slot = *self
            .index
            .get(parent_name)
            .ok_or_else(|| RibError::NoSuchParent(parent_name.to_string()))?;

        if let Some(&existing) = self.index.get(name) {
            // Same name, same parent: replace the stored object in place.
            let entry = self.slots[existing]
                .as_mut()
                .ok_or_else(|| RibError::NotFound(name.to_string()))?;
            if entry.parent != Some(parent_slot) {
                return Err(RibError::AlreadyExists(name.to_string()));
            }
            entry.object = object;
            return Ok(());
        }

        let slot = self.alloc_slot(RibEntry {
            name: name.to_string(),
            object,
            parent: Some(parent_slot),
            children: Vec::new(),
        });
        self.index.insert(name.to_string(), slot);
        if let Some(parent) = self.slots[parent_slot].as_mut() {
            parent.children.push(slot);
        }
        Ok(())
    }

    /// Removes an object and detaches it from its parent
    pub fn remove(&mut self, name: &str) -> Result<FaRibObject, RibError> {
        let slot = self
            .index
            .remove(name)
            .ok_or_else(|| RibError::NotFound(name.to_string()))?;
        let entry = self.slots[slot]
            .take()
            .ok_or_else(|| RibError::NotFound(name.to_string()))?;
        if let Some(parent_slot) = entry.parent
            && let Some(parent) = self.slots[parent_slot].as_mut()
        {
            parent.children.retain(|&c| c != slot);
        }
        self.free.push(slot);
        Ok(entry.object)
    }

    /// Removes every child of `parent_name` in one pass, returning their names
    pub fn remove_children(&mut self, parent_name: &str) -> Result<Vec<String>, RibError> {
        let parent_slot = *self
            .index
            .get(parent_name)
            .ok_or_else(|| RibError::NotFound(parent_name.to_string()))?;
        let children = match self.slots[parent_slot].as_mut() {
            Some(parent) => std::mem::take(&mut parent.children),
            None => return Err(RibError::NotFound(parent_name.to_string())),
        };

        let mut removed = Vec::with_capacity(children.len());
        for child_slot in children {
            if let Some(child) = self.slots[child_slot].take() {
                self.index.remove(&child.name);
                self.free.push(child_slot);
                removed.push(child.name);
            }
        }
        Ok(removed)
    }

    /// Looks up an object by name
    pub fn get(&self, name: &str) -> Option<&FaRibObject> {
        let slot = *self.index.get(name)?;
        self.slots[slot].as_ref().map(|e| &e.object)
    }

    /// Whether an object with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Names of the children of `parent_name`
    pub fn child_names(&self, parent_name: &str) -> Vec<String> {
        let Some(&parent_slot) = self.index.get(parent_name) else {
            return Vec::new();
        };
        let Some(parent) = self.slots[parent_slot].as_ref() else {
            return Vec::new();
        };
        parent
            .children
            .iter()
            .filter_map(|&c| self.slots[c].as_ref())
            .map(|e| e.name.clone())
            .collect()
    }

    /// The QoS cubes currently in the catalogue
    pub fn qos_cubes(&self) -> Vec<Arc<QoSCube>> {
        let Some(&parent_slot) = self.index.get(QOS_CUBE_SET_RIB_OBJECT_NAME) else {
            return Vec::new();
        };
        let Some(parent) = self.slots[parent_slot].as_ref() else {
            return Vec::new();
        };
        parent
            .children
            .iter()
            .filter_map(|&c| self.slots[c].as_ref())
            .filter_map(|e| match &e.object {
                FaRibObject::QoSCube(cube) => Some(cube.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of live objects
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// JSON listing of all live objects, for operator inspection
    pub fn dump(&self) -> serde_json::Value {
        let objects: Vec<serde_json::Value> = self
            .slots
            .iter()
            .flatten()
            .map(|e| json!({ "name": e.name, "class": e.object.class() }))
            .collect();
        json!(objects)
    }
}
