//! The terminal bridge: a mountable surface that turns keystrokes into
//! classified, streamed command executions.
//!
//! Hosts construct a [`TerminalBridge`] with their transports, session store
//! and overlay sinks, then bind it to a session with a display writer. All
//! interaction afterwards is keystroke-driven through [`handle_key`]
//! (`TerminalBridge::handle_key`); the bridge exposes no other imperative
//! API.
//!
//! ## Control flow
//!
//! ```text
//! keystroke -> LineEditor -> effect -> Surface echo
//!                      \ submit
//!                       Classifier -> Command -> Dispatcher (spawned task)
//!                                                   | chunks -> Surface
//!                                                   | done -> analyzers,
//!                                                   |         refreshes
//!                                                   ` epilogue -> prompt
//! ```
//!
//! While a command is running every keystroke except Ctrl-C is ignored;
//! Ctrl-C aborts the in-flight stream through the dispatcher.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::analyzers::{TestReportSink, TraceSink};
use crate::classifier::{Classifier, Command};
use crate::config::BridgeConfig;
use crate::dispatch::Dispatcher;
use crate::editor::{EditorEffect, KeyInput, LineEditor};
use crate::session::{SessionId, SessionStore};
use crate::surface::Surface;
use crate::transcript::Transcript;
use crate::transport::{AgentTransport, ExecTransport};

/// Owns the line editor, classifier, dispatcher and display surface for one
/// terminal instance.
pub struct TerminalBridge {
    config: BridgeConfig,
    classifier: Classifier,
    editor: Mutex<LineEditor>,
    surface: Surface,
    dispatcher: Arc<Dispatcher>,
    session: Mutex<Option<SessionId>>,
    transcript: Arc<Mutex<Transcript>>,
}

impl TerminalBridge {
    /// Build a bridge from its injected collaborators.
    ///
    /// The bridge starts detached: call [`bind_session`]
    /// (`TerminalBridge::bind_session`) to attach a display and start
    /// accepting input. Executions are spawned onto the ambient tokio
    /// runtime, so the bridge must be used from within one.
    pub fn new(
        config: BridgeConfig,
        agent: Arc<dyn AgentTransport>,
        exec: Arc<dyn ExecTransport>,
        store: Arc<dyn SessionStore>,
        test_sink: Arc<dyn TestReportSink>,
        trace_sink: Arc<dyn TraceSink>,
    ) -> Arc<Self> {
        let surface = Surface::new(config.prompt.clone());
        let transcript = Arc::new(Mutex::new(Transcript::new()));
        let dispatcher = Arc::new(Dispatcher::new(
            agent,
            exec,
            store,
            test_sink,
            trace_sink,
            surface.clone(),
            transcript.clone(),
        ));
        Arc::new(Self {
            classifier: Classifier::with_extras(config.extra_commands.iter().cloned()),
            config,
            editor: Mutex::new(LineEditor::new()),
            surface,
            dispatcher,
            session: Mutex::new(None),
            transcript,
        })
    }

    /// Bind the bridge to a session, attaching a fresh display writer.
    ///
    /// The previous display is detached and dropped, so a fast
    /// unmount/remount never leaves a duplicate display receiving output.
    /// An in-flight command is aborted. Command history and the in-progress
    /// input line survive the switch; the line is redrawn after the banner.
    pub fn bind_session(&self, session: SessionId, writer: Box<dyn Write + Send>) {
        self.dispatcher.abort();
        self.surface.detach();
        self.surface.attach(writer);

        tracing::debug!(session = %session, "session bound");
        self.transcript
            .lock()
            .log_system(&format!("session bound: {session}"));
        *self.session.lock() = Some(session.clone());

        if self.config.banner {
            self.surface.banner(session.as_str());
        }
        self.surface.show_prompt();
        let line = self.editor.lock().line().to_string();
        if !line.is_empty() {
            self.surface.echo(&line);
        }
    }

    /// Detach from the display entirely. Aborts an in-flight command.
    pub fn unbind(&self) {
        self.dispatcher.abort();
        self.surface.detach();
        *self.session.lock() = None;
    }

    /// True while a command is executing.
    pub fn is_running(&self) -> bool {
        self.dispatcher.is_running()
    }

    /// The dispatcher, for hosts that need programmatic abort or cwd control.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// The session transcript.
    pub fn transcript(&self) -> &Arc<Mutex<Transcript>> {
        &self.transcript
    }

    /// Export the transcript to the configured directory.
    pub fn export_transcript(&self) -> std::io::Result<std::path::PathBuf> {
        self.transcript
            .lock()
            .export_to_file(self.config.transcript_dir.as_deref())
    }

    /// Feed one keystroke.
    ///
    /// While a command is running every key except Ctrl-C is ignored and
    /// Ctrl-C aborts the in-flight stream; the `^C` line and prompt redraw
    /// come from the execution's own epilogue.
    pub fn handle_key(self: &Arc<Self>, key: KeyInput) {
        if self.dispatcher.is_running() {
            if key == KeyInput::CtrlC {
                self.dispatcher.abort();
            }
            return;
        }

        let effect = self.editor.lock().handle_key(key);
        self.apply_effect(effect);
    }

    fn apply_effect(self: &Arc<Self>, effect: EditorEffect) {
        match effect {
            EditorEffect::None => {}
            EditorEffect::Echo(text) => self.surface.echo(&text),
            EditorEffect::Erase(n) => self.surface.erase_cols(n),
            EditorEffect::Replace { erase, text } => {
                self.surface.erase_cols(erase);
                self.surface.echo(&text);
            }
            EditorEffect::EmptySubmit => {
                self.surface.line_break();
                self.surface.show_prompt();
            }
            EditorEffect::Interrupt => {
                self.surface.echo("^C");
                self.surface.line_break();
                self.surface.show_prompt();
            }
            EditorEffect::Submit(line) => self.submit(line),
        }
    }

    /// Classify a submitted line and spawn its execution.
    fn submit(self: &Arc<Self>, line: String) {
        self.surface.line_break();

        let Some(command) = self.classifier.classify(&line) else {
            self.surface.show_prompt();
            return;
        };

        {
            let mut transcript = self.transcript.lock();
            match &command {
                Command::Prompt(text) => transcript.log_prompt(text),
                Command::Clear => {}
                Command::Shell(c) | Command::AgentUtility(c) | Command::AgentPrint(c) => {
                    transcript.log_command(c)
                }
            }
        }

        let Some(session) = self.session.lock().clone() else {
            self.surface.error_line("no session bound");
            self.surface.line_break();
            self.surface.show_prompt();
            return;
        };

        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            if let Err(e) = dispatcher.execute(&session, command).await {
                // Unreachable from the keystroke path: input is ignored
                // while the slot is taken.
                tracing::warn!(error = %e, "execution rejected");
            }
        });
    }
}

impl std::fmt::Debug for TerminalBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalBridge")
            .field("session", &*self.session.lock())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::{StackTraceReport, TestReport};
    use crate::surface::testing::CaptureWriter;
    use crate::transport::{
        AgentEvent, AgentStream, ExecEvent, ExecStream, TransportError,
    };
    use futures_util::StreamExt;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use tokio_util::sync::CancellationToken;

    struct EchoAgent;

    #[async_trait::async_trait]
    impl AgentTransport for EchoAgent {
        async fn open_prompt(
            &self,
            _session: &SessionId,
            prompt: &str,
            _cwd: Option<&Path>,
            _cancel: CancellationToken,
        ) -> Result<AgentStream, TransportError> {
            let events = vec![
                Ok(AgentEvent::Connected),
                Ok(AgentEvent::Text { content: format!("agent: {prompt}") }),
                Ok(AgentEvent::Done),
            ];
            Ok(futures_util::stream::iter(events).boxed())
        }
    }

    /// Exec transport that echoes the command line, or hangs until cancelled
    /// when the command contains "hang".
    struct EchoExec {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ExecTransport for EchoExec {
        async fn open_exec(
            &self,
            _session: &SessionId,
            command: &str,
            cancel: CancellationToken,
        ) -> Result<ExecStream, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if command.contains("hang") {
                let (tx, rx) = flume::unbounded();
                tokio::spawn(async move {
                    cancel.cancelled().await;
                    let _ = tx.send(Err(TransportError::Aborted));
                });
                return Ok(rx.into_stream().boxed());
            }
            let events = vec![Ok(ExecEvent::Stdout { content: format!("ran: {command}\n") })];
            Ok(futures_util::stream::iter(events).boxed())
        }
    }

    #[derive(Default)]
    struct Quiet;
    impl SessionStore for Quiet {
        fn refresh_files(&self) {}
        fn refresh_git_status(&self) {}
    }
    impl TestReportSink for Quiet {
        fn show_report(&self, _report: TestReport) {}
    }
    impl TraceSink for Quiet {
        fn show_trace(&self, _trace: StackTraceReport) {}
    }

    fn bridge() -> (Arc<TerminalBridge>, std::sync::Arc<StdMutex<Vec<u8>>>) {
        let quiet = Arc::new(Quiet);
        let bridge = TerminalBridge::new(
            BridgeConfig::default(),
            Arc::new(EchoAgent),
            Arc::new(EchoExec { calls: AtomicUsize::new(0) }),
            quiet.clone(),
            quiet.clone(),
            quiet,
        );
        let (writer, buf) = CaptureWriter::new();
        bridge.bind_session(SessionId::new("sess-1"), Box::new(writer));
        (bridge, buf)
    }

    fn type_line(bridge: &Arc<TerminalBridge>, line: &str) {
        for c in line.chars() {
            bridge.handle_key(KeyInput::Char(c));
        }
        bridge.handle_key(KeyInput::Enter);
    }

    async fn settle(bridge: &Arc<TerminalBridge>) {
        // Let the spawned execution start, run and finish.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        for _ in 0..1000 {
            if !bridge.is_running() {
                break;
            }
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_banner_and_prompt_on_bind() {
        let (_bridge, buf) = bridge();
        let out = CaptureWriter::contents(&buf);
        assert!(out.contains("Ketch"));
        assert!(out.contains("sess-1"));
        assert!(out.contains("$ "));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shell_line_round_trip() {
        let (bridge, buf) = bridge();
        type_line(&bridge, "ls -la");
        settle(&bridge).await;

        let out = CaptureWriter::contents(&buf);
        // Typed characters were echoed, then the command output streamed.
        assert!(out.contains("ls -la"));
        assert!(out.contains("ran: ls -la"));
        assert!(!bridge.is_running());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_prose_routes_to_agent() {
        let (bridge, buf) = bridge();
        type_line(&bridge, "explain this function");
        settle(&bridge).await;

        let out = CaptureWriter::contents(&buf);
        assert!(out.contains("agent: explain this function"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_keys_ignored_while_running() {
        let (bridge, buf) = bridge();
        // "sleep" is allow-listed, so this is a shell command; the fake exec
        // transport hangs until cancelled for commands containing "hang".
        type_line(&bridge, "sleep hang");

        for _ in 0..1000 {
            if bridge.is_running() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(bridge.is_running());

        // Printable input and history navigation are ignored mid-run.
        bridge.handle_key(KeyInput::Char('x'));
        bridge.handle_key(KeyInput::Up);
        assert!(bridge.editor.lock().line().is_empty());

        // Ctrl-C aborts.
        bridge.handle_key(KeyInput::CtrlC);
        for _ in 0..1000 {
            if !bridge.is_running() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!bridge.is_running());
        assert!(CaptureWriter::contents(&buf).contains("^C"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_ctrl_c_idle_discards_line() {
        let (bridge, buf) = bridge();
        bridge.handle_key(KeyInput::Char('l'));
        bridge.handle_key(KeyInput::Char('s'));
        bridge.handle_key(KeyInput::CtrlC);

        assert!(bridge.editor.lock().line().is_empty());
        let out = CaptureWriter::contents(&buf);
        assert!(out.contains("^C"));
        assert!(!bridge.is_running());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_clear_builtin_keeps_history() {
        let (bridge, buf) = bridge();
        type_line(&bridge, "ls");
        settle(&bridge).await;
        type_line(&bridge, "clear");
        settle(&bridge).await;

        assert!(CaptureWriter::contents(&buf).contains("\x1b[2J"));
        // History still holds both lines.
        assert_eq!(bridge.editor.lock().history(), ["ls", "clear"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rebind_preserves_history_and_drops_old_display() {
        let (bridge, old_buf) = bridge();
        type_line(&bridge, "ls");
        settle(&bridge).await;

        let (writer, new_buf) = CaptureWriter::new();
        bridge.bind_session(SessionId::new("sess-2"), Box::new(writer));
        let old_len = old_buf.lock().unwrap().len();

        type_line(&bridge, "explain it");
        settle(&bridge).await;

        // The old display saw nothing after the switch.
        assert_eq!(old_buf.lock().unwrap().len(), old_len);
        let out = CaptureWriter::contents(&new_buf);
        assert!(out.contains("sess-2"));
        assert!(out.contains("agent: explain it"));
        // History survives the rebind.
        assert_eq!(bridge.editor.lock().history()[0], "ls");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rebind_redraws_in_progress_line() {
        let (bridge, _buf) = bridge();
        bridge.handle_key(KeyInput::Char('g'));
        bridge.handle_key(KeyInput::Char('i'));

        let (writer, new_buf) = CaptureWriter::new();
        bridge.bind_session(SessionId::new("sess-3"), Box::new(writer));

        let out = CaptureWriter::contents(&new_buf);
        assert!(out.ends_with("gi"), "in-progress line redrawn: {out:?}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_empty_enter_just_redraws_prompt() {
        let (bridge, buf) = bridge();
        let before = CaptureWriter::contents(&buf).matches("$ ").count();
        bridge.handle_key(KeyInput::Enter);
        let after = CaptureWriter::contents(&buf).matches("$ ").count();
        assert_eq!(after, before + 1);
        assert!(!bridge.is_running());
    }
}
