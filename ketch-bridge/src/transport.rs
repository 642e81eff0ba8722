//! Streaming transport layer: wire chunk types and the two upstream endpoints.
//!
//! The bridge consumes two chunked streams from the workspace backend: the
//! agent stream (natural language prompts, tool activity) and the exec stream
//! (raw stdout/stderr of a literal shell command). Both are modeled as typed
//! event streams; the wire format is JSON with a `type` discriminator, so an
//! unhandled event kind is a compile error here rather than a silent string
//! mismatch.

use std::path::Path;
use std::pin::Pin;

use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::session::SessionId;

/// One chunk of an agent response stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AgentEvent {
    /// The stream is open. Carries nothing.
    Connected,
    /// The agent turn finished; the connection closes shortly after.
    Done,
    /// Keep-alive.
    Heartbeat,
    /// Incremental response text.
    Text { content: String },
    /// The agent started a tool invocation.
    ToolStart { name: String },
    /// A tool invocation finished.
    ToolResult { name: String },
    /// The backend reported an error mid-stream.
    Error { content: String },
}

/// One chunk of a command execution stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExecEvent {
    /// A stdout fragment.
    Stdout { content: String },
    /// A stderr fragment.
    Stderr { content: String },
    /// The backend could not run (or continue running) the command.
    Error { content: String },
}

/// Errors surfaced by a transport, at open time or mid-stream.
///
/// `Aborted` is a distinct class: it is the cooperative-cancellation outcome
/// and is rendered as `^C`, never as a failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The stream was cancelled through the caller's token.
    #[error("aborted")]
    Aborted,
    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),
    /// The connection dropped or produced an unreadable body mid-stream.
    #[error("stream failed: {0}")]
    Stream(String),
    /// The backend rejected the request outright.
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
}

impl TransportError {
    /// True for the user-initiated cancellation class.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// Stream of agent events, as produced by [`AgentTransport::open_prompt`].
pub type AgentStream = Pin<Box<dyn Stream<Item = Result<AgentEvent, TransportError>> + Send>>;

/// Stream of exec events, as produced by [`ExecTransport::open_exec`].
pub type ExecStream = Pin<Box<dyn Stream<Item = Result<ExecEvent, TransportError>> + Send>>;

/// Upstream endpoint streaming an agent's incremental response to a prompt.
///
/// Implementations must honor `cancel`: when the token fires, terminate the
/// stream with a single `Err(TransportError::Aborted)` item. Chunks must be
/// yielded in arrival order; malformed wire chunks are dropped, not yielded
/// as errors.
#[async_trait::async_trait]
pub trait AgentTransport: Send + Sync {
    /// Open a streaming agent turn for `prompt` in the given session.
    async fn open_prompt(
        &self,
        session: &SessionId,
        prompt: &str,
        cwd: Option<&Path>,
        cancel: CancellationToken,
    ) -> Result<AgentStream, TransportError>;
}

/// Upstream endpoint streaming stdout/stderr of a literal shell command
/// executed in the remote workspace.
///
/// The cancellation contract is the same as [`AgentTransport`]'s.
#[async_trait::async_trait]
pub trait ExecTransport: Send + Sync {
    /// Start `command` in the given session and stream its output.
    async fn open_exec(
        &self,
        session: &SessionId,
        command: &str,
        cancel: CancellationToken,
    ) -> Result<ExecStream, TransportError>;
}
