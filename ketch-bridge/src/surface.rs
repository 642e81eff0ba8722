//! Terminal display surface: swappable sink, ANSI styling, prompt glyph.
//!
//! The bridge renders through a [`Surface`], a cheaply cloneable handle to a
//! swappable `Box<dyn Write + Send>` destination. The surface starts detached
//! (writes are discarded); session binding attaches the host's display writer
//! and re-binding swaps it, so a fast unmount/remount never leaves a stale
//! display receiving output.
//!
//! All text written through [`Surface::write_text`] has bare `\n` normalized
//! to the `\r\n` the terminal expects.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// ANSI color codes for consistent styling.
pub(crate) mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const CYAN: &str = "\x1b[36m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const RED: &str = "\x1b[31m";
    pub const GRAY: &str = "\x1b[90m";
}

/// Clear the screen and scrollback, home the cursor.
const CLEAR_SEQ: &str = "\x1b[2J\x1b[3J\x1b[H";

/// Cloneable handle to the terminal display.
#[derive(Clone)]
pub struct Surface {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
    prompt: String,
}

impl Surface {
    /// Create a detached surface with the given prompt glyph.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(io::sink()))),
            prompt: prompt.into(),
        }
    }

    /// Attach a display writer. Replaces (and drops) the previous one.
    pub fn attach(&self, writer: Box<dyn Write + Send>) {
        *self.sink.lock() = writer;
    }

    /// Detach the display; subsequent writes are discarded.
    pub fn detach(&self) {
        *self.sink.lock() = Box::new(io::sink());
    }

    /// Write raw bytes to the sink. Display writes are best effort; an
    /// unwritable sink must never take the bridge down.
    pub fn write_raw(&self, text: &str) {
        let mut sink = self.sink.lock();
        if let Err(e) = sink.write_all(text.as_bytes()).and_then(|()| sink.flush()) {
            tracing::trace!(error = %e, "display write dropped");
        }
    }

    /// Write text with `\n` normalized to `\r\n`.
    pub fn write_text(&self, text: &str) {
        self.write_raw(&normalize_newlines(text));
    }

    /// Write stderr-style text: normalized and dimmed yellow.
    pub fn write_stderr(&self, text: &str) {
        self.write_raw(&format!(
            "{}{}{}",
            ansi::YELLOW,
            normalize_newlines(text),
            ansi::RESET
        ));
    }

    /// Echo text exactly as typed (input echo path).
    pub fn echo(&self, text: &str) {
        self.write_raw(text);
    }

    /// Erase the last `n` echoed columns.
    pub fn erase_cols(&self, n: usize) {
        self.write_raw(&"\x08 \x08".repeat(n));
    }

    /// Advance to the next line.
    pub fn line_break(&self) {
        self.write_raw("\r\n");
    }

    /// Draw the prompt glyph.
    pub fn show_prompt(&self) {
        self.write_raw(&format!("{}{}{}", ansi::CYAN, self.prompt, ansi::RESET));
    }

    /// Wipe the display and scrollback.
    pub fn clear(&self) {
        self.write_raw(CLEAR_SEQ);
    }

    /// Welcome banner written on session (re)binding.
    pub fn banner(&self, session: &str) {
        self.write_raw(&format!(
            "{}{}Ketch{} workspace terminal{} (session {session}){}\r\n\r\n",
            ansi::CYAN,
            ansi::BOLD,
            ansi::RESET,
            ansi::DIM,
            ansi::RESET,
        ));
    }

    /// Marker line for a tool invocation starting.
    pub fn tool_start(&self, name: &str) {
        self.write_raw(&format!(
            "\r\n{}{}[tool]{} {name}\r\n",
            ansi::YELLOW,
            ansi::BOLD,
            ansi::RESET,
        ));
    }

    /// Marker line for a tool invocation finishing.
    pub fn tool_done(&self, name: &str) {
        self.write_raw(&format!("{}[done] {name}{}\r\n", ansi::DIM, ansi::RESET));
    }

    /// Error line: `Error: <message>` in red.
    pub fn error_line(&self, message: &str) {
        self.write_raw(&format!(
            "\r\n{}{}Error:{} {message}\r\n",
            ansi::RED,
            ansi::BOLD,
            ansi::RESET,
        ));
    }

    /// Interrupt marker for an aborted command.
    pub fn interrupt_line(&self) {
        self.write_raw(&format!("{}^C{}\r\n", ansi::GRAY, ansi::RESET));
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("prompt", &self.prompt)
            .finish_non_exhaustive()
    }
}

/// Convert bare `\n` to `\r\n` without doubling an existing `\r\n`.
fn normalize_newlines(text: &str) -> String {
    if !text.contains('\n') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\n', "\r\n")
}

// ─── Test support ───────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod testing {
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    /// Writer that collects bytes into a shared buffer for assertions.
    #[derive(Clone, Default)]
    pub(crate) struct CaptureWriter(pub(crate) Arc<Mutex<Vec<u8>>>);

    impl CaptureWriter {
        pub(crate) fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buf = Arc::new(Mutex::new(Vec::new()));
            (Self(buf.clone()), buf)
        }

        pub(crate) fn contents(buf: &Arc<Mutex<Vec<u8>>>) -> String {
            String::from_utf8_lossy(&buf.lock().unwrap()).into_owned()
        }
    }

    impl Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
