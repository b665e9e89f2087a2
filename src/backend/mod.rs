//! Plan backend access.
//!
//! The backend persists plan entities and exposes them through remote
//! procedures. This module defines the backend interface and provides an
//! HTTP implementation plus an in-process one.

mod api;
mod client;
mod memory;

pub use api::PlanBackend;
pub use client::RpcClient;
pub use memory::InMemoryBackend;
