//! # ketch-client
//!
//! HTTP streaming client for the Ketch workspace backend: the reference
//! implementations of `ketch-bridge`'s [`AgentTransport`] and
//! [`ExecTransport`] traits over chunked `text/event-stream` responses.
//!
//! [`AgentTransport`]: ketch_bridge::transport::AgentTransport
//! [`ExecTransport`]: ketch_bridge::transport::ExecTransport

pub mod client;
pub mod sse;

pub use client::{ClientConfig, WorkspaceClient};
pub use sse::SseLineBuffer;
