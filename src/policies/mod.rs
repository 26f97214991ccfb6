// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present Flowalloc Contributors

//! Pluggable policies of the flow allocator

pub mod new_flow;

pub use new_flow::{NewFlowRequestPolicy, SimpleNewFlowRequestPolicy};
