//! Stream multiplexer and cancellation controller.
//!
//! [`Dispatcher::execute`] opens the transport matching a classified command,
//! consumes the chunk stream, routes every chunk to the display surface in
//! arrival order, and runs the post-execution analyzers for shell paths.
//!
//! The execution slot makes the at-most-one-in-flight rule explicit: holding
//! the slot is holding the right to stream, a second `execute` while one is
//! active is rejected with a typed error, and releasing the slot (on success,
//! abort and error alike) happens exactly once through a drop guard. The
//! epilogue - trailing line break, slot release, prompt redraw - therefore
//! runs exactly once per execution no matter how the stream ended.

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::analyzers::{OutputScanner, TestReportSink, TraceSink};
use crate::classifier::Command;
use crate::session::{SessionId, SessionStore};
use crate::surface::Surface;
use crate::transcript::Transcript;
use crate::transport::{AgentEvent, AgentTransport, ExecEvent, ExecTransport, TransportError};

/// Errors surfaced to programmatic callers of [`Dispatcher::execute`].
///
/// Stream failures are not errors at this boundary: they are rendered into
/// the display and the call still returns `Ok`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// A command is already executing; the slot is taken.
    #[error("a command is already executing")]
    Busy,
}

// ─── Execution slot ─────────────────────────────────────────────────────────

/// The single-command-at-a-time execution state: an owned cancellation token
/// while a command is in flight, `None` otherwise.
#[derive(Debug, Default)]
struct ExecutionSlot {
    active: Mutex<Option<CancellationToken>>,
}

impl ExecutionSlot {
    /// Claim the slot, minting the cancellation token for this execution.
    fn acquire(&self) -> Result<CancellationToken, DispatchError> {
        let mut active = self.active.lock();
        if active.is_some() {
            return Err(DispatchError::Busy);
        }
        let token = CancellationToken::new();
        *active = Some(token.clone());
        Ok(token)
    }

    /// Release the slot, dropping the token.
    fn release(&self) {
        *self.active.lock() = None;
    }

    /// Cancel the in-flight execution, if any. No-op (returns false) when
    /// nothing is running.
    fn abort(&self) -> bool {
        match self.active.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn is_running(&self) -> bool {
        self.active.lock().is_some()
    }
}

/// Releases the slot when dropped, so the release happens exactly once on
/// every exit path.
struct SlotGuard<'a> {
    slot: &'a ExecutionSlot,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.slot.release();
    }
}

// ─── Dispatcher ─────────────────────────────────────────────────────────────

/// Routes classified commands onto the matching transport and renders the
/// resulting stream. All collaborators are injected; the dispatcher holds no
/// global state.
pub struct Dispatcher {
    agent: Arc<dyn AgentTransport>,
    exec: Arc<dyn ExecTransport>,
    store: Arc<dyn SessionStore>,
    test_sink: Arc<dyn TestReportSink>,
    trace_sink: Arc<dyn TraceSink>,
    surface: Surface,
    transcript: Arc<Mutex<Transcript>>,
    scanner: OutputScanner,
    slot: ExecutionSlot,
    cwd: Mutex<Option<PathBuf>>,
}

impl Dispatcher {
    /// Create a dispatcher over the given transports, session store, overlay
    /// sinks, display surface and transcript.
    pub fn new(
        agent: Arc<dyn AgentTransport>,
        exec: Arc<dyn ExecTransport>,
        store: Arc<dyn SessionStore>,
        test_sink: Arc<dyn TestReportSink>,
        trace_sink: Arc<dyn TraceSink>,
        surface: Surface,
        transcript: Arc<Mutex<Transcript>>,
    ) -> Self {
        Self {
            agent,
            exec,
            store,
            test_sink,
            trace_sink,
            surface,
            transcript,
            scanner: OutputScanner::new(),
            slot: ExecutionSlot::default(),
            cwd: Mutex::new(None),
        }
    }

    /// Set the working directory forwarded to the agent transport.
    pub fn set_cwd(&self, cwd: Option<PathBuf>) {
        *self.cwd.lock() = cwd;
    }

    /// True while a command is executing.
    pub fn is_running(&self) -> bool {
        self.slot.is_running()
    }

    /// Abort the in-flight execution. No-op when nothing is running.
    pub fn abort(&self) -> bool {
        self.slot.abort()
    }

    /// Execute one classified command to completion.
    ///
    /// Side-effecting: output goes to the surface, not the caller. The call
    /// resolves once the epilogue has run and the prompt is visible again.
    /// Returns `Err(DispatchError::Busy)` without touching the display if a
    /// command is already in flight.
    pub async fn execute(
        &self,
        session: &SessionId,
        command: Command,
    ) -> Result<(), DispatchError> {
        if matches!(command, Command::Clear) {
            self.surface.clear();
            self.surface.show_prompt();
            return Ok(());
        }

        let cancel = self.slot.acquire()?;
        let guard = SlotGuard { slot: &self.slot };
        tracing::debug!(session = %session, kind = command_kind(&command), "dispatching");

        let outcome = match &command {
            Command::Prompt(text) => self.run_prompt(session, text, cancel).await,
            Command::AgentPrint(line) => self.run_exec(session, line, false, cancel).await,
            Command::Shell(line) | Command::AgentUtility(line) => {
                self.run_exec(session, line, true, cancel).await
            }
            Command::Clear => Ok(()),
        };

        match outcome {
            Ok(()) => {}
            Err(e) if e.is_abort() => {
                tracing::debug!("execution aborted");
                self.surface.interrupt_line();
            }
            Err(e) => {
                tracing::debug!(error = %e, "execution failed");
                self.surface.error_line(&e.to_string());
            }
        }

        // Epilogue: trailing break, slot release, then exactly one prompt.
        self.surface.line_break();
        drop(guard);
        self.surface.show_prompt();
        Ok(())
    }

    /// Natural language path: stream the agent turn, then trigger the
    /// session refreshes (success only).
    async fn run_prompt(
        &self,
        session: &SessionId,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Result<(), TransportError> {
        let cwd = self.cwd.lock().clone();
        let mut stream = self
            .agent
            .open_prompt(session, prompt, cwd.as_deref(), cancel)
            .await?;

        let mut agent_text = String::new();
        let mut outcome = Ok(());
        while let Some(event) = stream.next().await {
            match event {
                Ok(AgentEvent::Text { content }) => {
                    agent_text.push_str(&content);
                    self.surface.write_text(&content);
                }
                Ok(AgentEvent::ToolStart { name }) => self.surface.tool_start(&name),
                Ok(AgentEvent::ToolResult { name }) => self.surface.tool_done(&name),
                Ok(AgentEvent::Error { content }) => self.surface.error_line(&content),
                Ok(AgentEvent::Connected | AgentEvent::Done | AgentEvent::Heartbeat) => {}
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }

        self.transcript.lock().log_agent(&agent_text);
        if outcome.is_ok() {
            self.store.refresh_files();
            self.store.refresh_git_status();
        }
        outcome
    }

    /// Exec path: stream stdout/stderr. When `collect` is set (shell and
    /// agent utility commands) the output is accumulated and handed to the
    /// analyzers once the stream completes normally.
    async fn run_exec(
        &self,
        session: &SessionId,
        command_line: &str,
        collect: bool,
        cancel: CancellationToken,
    ) -> Result<(), TransportError> {
        let mut stream = self.exec.open_exec(session, command_line, cancel).await?;

        let mut stdout_buf = String::new();
        let mut stderr_buf = String::new();
        let mut outcome = Ok(());
        while let Some(event) = stream.next().await {
            match event {
                Ok(ExecEvent::Stdout { content }) => {
                    if collect {
                        stdout_buf.push_str(&content);
                    }
                    self.surface.write_text(&content);
                }
                Ok(ExecEvent::Stderr { content }) => {
                    if collect {
                        stderr_buf.push_str(&content);
                    }
                    self.surface.write_stderr(&content);
                }
                Ok(ExecEvent::Error { content }) => self.surface.error_line(&content),
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }

        if collect && outcome.is_ok() {
            self.transcript.lock().log_output(&stdout_buf, &stderr_buf);
            self.analyze(&stdout_buf, &stderr_buf);
        }
        outcome
    }

    /// Run the post-execution analyzers over a completed transcript. Both
    /// scans are independent; misses are silent.
    fn analyze(&self, stdout: &str, stderr: &str) {
        let combined = if stderr.is_empty() {
            stdout.to_string()
        } else if stdout.is_empty() {
            stderr.to_string()
        } else {
            format!("{stdout}\n{stderr}")
        };

        if let Some(report) = self.scanner.scan_tests(&combined) {
            tracing::debug!(framework = %report.framework, total = report.total, "test summary detected");
            self.test_sink.show_report(report);
        }
        if let Some(trace) = self.scanner.scan_trace(stderr) {
            tracing::debug!(flavor = %trace.flavor, "stack trace detected");
            self.trace_sink.show_trace(trace);
        }
    }
}

fn command_kind(command: &Command) -> &'static str {
    match command {
        Command::Shell(_) => "shell",
        Command::AgentUtility(_) => "agent-utility",
        Command::AgentPrint(_) => "agent-print",
        Command::Prompt(_) => "prompt",
        Command::Clear => "clear",
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
