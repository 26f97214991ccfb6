// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present Flowalloc Contributors

//! Directory forwarding table
//!
//! Maps application names to the address of the IPCP a flow request for
//! that name should travel toward, and keeps the local registrations the
//! responding side consults. The flow allocator only consumes the
//! `NamespaceManager` trait; the table implementation is shared with the
//! IPCP glue and the test suite.

use crate::naming::ApplicationProcessNamingInfo;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Name resolution interface the flow allocator depends on
pub trait NamespaceManager: Send + Sync {
    /// Returns the address of the next hop toward the named application
    fn dft_next_hop(&self, name: &ApplicationProcessNamingInfo) -> Option<u32>;

    /// Returns the id of the local IPC process the named application is
    /// registered through, if it is registered here
    fn registered_ipcp_id(&self, name: &ApplicationProcessNamingInfo) -> Option<u16>;
}

/// In-memory directory forwarding table with local registrations
#[derive(Debug, Clone, Default)]
pub struct DirectoryForwardingTable {
    forwarding: Arc<RwLock<HashMap<ApplicationProcessNamingInfo, u32>>>,
    registrations: Arc<RwLock<HashMap<ApplicationProcessNamingInfo, u16>>>,
}

impl DirectoryForwardingTable {
    /// Creates an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the next-hop entry for a name
    pub fn add_entry(&self, name: ApplicationProcessNamingInfo, address: u32) {
        let mut forwarding = self.forwarding.write().unwrap();
        forwarding.insert(name, address);
    }

    /// Removes the next-hop entry for a name
    pub fn remove_entry(&self, name: &ApplicationProcessNamingInfo) -> bool {
        let mut forwarding = self.forwarding.write().unwrap();
        forwarding.remove(name).is_some()
    }

    /// Registers an application as reachable through a local IPC process
    pub fn register_local(&self, name: ApplicationProcessNamingInfo, ipcp_id: u16) {
        let mut registrations = self.registrations.write().unwrap();
        registrations.insert(name, ipcp_id);
    }

    /// Removes a local registration
    pub fn unregister_local(&self, name: &ApplicationProcessNamingInfo) -> bool {
        let mut registrations = self.registrations.write().unwrap();
        registrations.remove(name).is_some()
    }

    /// Returns the number of forwarding entries
    pub fn entry_count(&self) -> usize {
        self.forwarding.read().unwrap().len()
    }
}

impl NamespaceManager for DirectoryForwardingTable {
    fn dft_next_hop(&self, name: &ApplicationProcessNamingInfo) -> Option<u32> {
        let forwarding = self.forwarding.read().unwrap();
        forwarding.get(name).copied()
    }

    fn registered_ipcp_id(&self, name: &ApplicationProcessNamingInfo) -> Option<u16> {
        let registrations = self.registrations.read().unwrap();
        registrations.get(name).copied()
    }
}
