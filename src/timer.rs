// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present Flowalloc Contributors

//! Flow teardown timer
//!
//! After a flow is deallocated, PDUs of that flow may still be in flight
//! for up to 2·MPL. The timer keeps only the port-id of the instance it
//! will tear down; if the instance is gone by the time the timer fires,
//! firing is a no-op.

use crate::fa::InstanceTable;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// How long a deallocated flow lingers before teardown (2·MPL)
pub const TEARDOWN_DELAY: Duration = Duration::from_millis(5_000);

/// Single-shot timer destroying a flow allocator instance after 2·MPL
pub struct TeardownTimer;

impl TeardownTimer {
    /// Schedules teardown of the instance at `port_id`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(instances: InstanceTable, port_id: i32) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::time::sleep(TEARDOWN_DELAY).await;
            match instances.get(port_id) {
                Some(instance) => instance.destroy(),
                None => debug!(port_id, "teardown fired for an instance already gone"),
            }
        })
    }
}
