// SPDX-License-Identifier: MPL-2.0
//! Worker context and its message protocol.
//!
//! - [`protocol`]: inbound and outbound messages
//! - [`runtime`]: the worker thread and the caller's handle to it

pub mod protocol;
pub mod runtime;

pub use protocol::{ImagePayload, Inbound, Outbound, ProcessOptions, ToolName};
pub use runtime::{JobTicket, Worker, WorkerHandle};
