//! # ketch-bridge
//!
//! Terminal session and command dispatch bridge for the Ketch workspace: the
//! component that owns the terminal input line, decides whether a submitted
//! line is a shell command, a `ketch` CLI invocation or a natural language
//! prompt for the coding agent, and streams the matching backend response
//! back into the display.
//!
//! ## Architecture
//!
//! ```text
//! host UI  ←→  TerminalBridge  ←→  AgentTransport / ExecTransport (streams)
//!                │
//!                ├─ LineEditor      input line + history
//!                ├─ Classifier      shell vs ketch CLI vs prompt vs clear
//!                ├─ Dispatcher      stream multiplexing, single-flight slot,
//!                │                  cooperative cancellation
//!                ├─ OutputScanner   test summaries + stack traces
//!                └─ Surface         swappable display sink, ANSI styling
//! ```
//!
//! All collaborators (transports, session store, overlay sinks) are injected
//! at construction; the crate reaches no globals. See `ketch-client` for the
//! HTTP implementations of the transport traits.

pub mod analyzers;
pub mod bridge;
pub mod classifier;
pub mod config;
pub mod dispatch;
pub mod editor;
pub mod session;
pub mod surface;
pub mod transcript;
pub mod transport;

pub use analyzers::{
    OutputScanner, StackFrame, StackTraceReport, TestCase, TestFramework, TestReport,
    TestReportSink, TestStatus, TraceFlavor, TraceSink,
};
pub use bridge::TerminalBridge;
pub use classifier::{Classifier, Command};
pub use config::BridgeConfig;
pub use dispatch::{DispatchError, Dispatcher};
pub use editor::{EditorEffect, KeyInput, LineEditor};
pub use session::{NullSessionStore, SessionId, SessionStore};
pub use surface::Surface;
pub use transcript::Transcript;
pub use transport::{
    AgentEvent, AgentStream, AgentTransport, ExecEvent, ExecStream, ExecTransport,
    TransportError,
};
