//! Session transcript: a chronological record of what happened in the
//! terminal, exportable as a markdown document.
//!
//! The bridge records submitted commands and prompts, agent response text,
//! command output and system notes. The transcript lives in memory for the
//! lifetime of the bridge and can be exported to `~/.ketch/sessions/`.

use std::path::{Path, PathBuf};

/// Type of transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Natural language prompt sent to the agent.
    Prompt,
    /// Agent response text.
    AgentText,
    /// Shell or CLI command executed.
    Command,
    /// Command output (stdout/stderr).
    CommandOutput,
    /// System note (session binding, errors, status).
    System,
}

/// A single transcript entry.
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    /// ISO 8601 timestamp.
    pub timestamp: String,
    pub kind: EntryKind,
    pub content: String,
}

/// Accumulated transcript of a terminal session.
#[derive(Debug, Clone)]
pub struct Transcript {
    /// All entries in chronological order.
    pub entries: Vec<TranscriptEntry>,
    /// When the transcript started (ISO 8601).
    pub started_at: String,
}

impl Transcript {
    /// Create an empty transcript.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            started_at: now_iso8601(),
        }
    }

    fn add(&mut self, kind: EntryKind, content: impl Into<String>) {
        self.entries.push(TranscriptEntry {
            timestamp: now_iso8601(),
            kind,
            content: content.into(),
        });
    }

    /// Record a prompt sent to the agent.
    pub fn log_prompt(&mut self, content: &str) {
        self.add(EntryKind::Prompt, content);
    }

    /// Record agent response text (one entry per completed turn).
    pub fn log_agent(&mut self, content: &str) {
        if !content.is_empty() {
            self.add(EntryKind::AgentText, content);
        }
    }

    /// Record an executed command.
    pub fn log_command(&mut self, command: &str) {
        self.add(EntryKind::Command, command);
    }

    /// Record command output, stderr marked when present.
    pub fn log_output(&mut self, stdout: &str, stderr: &str) {
        let mut content = String::new();
        if !stdout.is_empty() {
            content.push_str(stdout);
        }
        if !stderr.is_empty() {
            if !content.is_empty() && !content.ends_with('\n') {
                content.push('\n');
            }
            content.push_str("stderr: ");
            content.push_str(stderr);
        }
        if !content.is_empty() {
            self.add(EntryKind::CommandOutput, content);
        }
    }

    /// Record a system note.
    pub fn log_system(&mut self, message: &str) {
        self.add(EntryKind::System, message);
    }

    /// Export the transcript as a markdown document.
    pub fn export_markdown(&self) -> String {
        let mut md = String::with_capacity(4096);
        md.push_str(&format!("# Ketch session — {}\n\n---\n\n", self.started_at));

        for entry in &self.entries {
            match entry.kind {
                EntryKind::Prompt => {
                    md.push_str(&format!("### You ({})\n\n{}\n\n", entry.timestamp, entry.content));
                }
                EntryKind::AgentText => {
                    md.push_str(&format!(
                        "### Ketch ({})\n\n{}\n\n",
                        entry.timestamp, entry.content
                    ));
                }
                EntryKind::Command => {
                    md.push_str(&format!(
                        "#### Command ({})\n\n```bash\n$ {}\n```\n\n",
                        entry.timestamp, entry.content
                    ));
                }
                EntryKind::CommandOutput => {
                    md.push_str(&format!("```\n{}\n```\n\n", entry.content.trim_end()));
                }
                EntryKind::System => {
                    md.push_str(&format!(
                        "> _System ({}): {}_\n\n",
                        entry.timestamp, entry.content
                    ));
                }
            }
        }
        md
    }

    /// Export the transcript to a file in `dir` (or the default session
    /// directory), returning the written path.
    pub fn export_to_file(&self, dir: Option<&Path>) -> std::io::Result<PathBuf> {
        let dir = dir
            .map(Path::to_path_buf)
            .unwrap_or_else(default_session_dir);
        std::fs::create_dir_all(&dir)?;

        let filename = format!(
            "ketch-{}.md",
            self.started_at.replace(':', "-").replace(' ', "_")
        );
        let path = dir.join(filename);
        std::fs::write(&path, self.export_markdown())?;
        Ok(path)
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

/// Default directory for transcript exports.
fn default_session_dir() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ketch")
        .join("sessions")
}

/// Current local time in ISO 8601 format.
fn now_iso8601() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_in_order() {
        let mut t = Transcript::new();
        t.log_prompt("explain this");
        t.log_agent("It parses input.");
        t.log_command("cargo test");
        t.log_output("ok\n", "");
        t.log_system("session bound");

        assert_eq!(t.entries.len(), 5);
        assert_eq!(t.entries[0].kind, EntryKind::Prompt);
        assert_eq!(t.entries[2].kind, EntryKind::Command);
        assert_eq!(t.entries[4].kind, EntryKind::System);
    }

    #[test]
    fn test_empty_agent_text_skipped() {
        let mut t = Transcript::new();
        t.log_agent("");
        assert!(t.entries.is_empty());
    }

    #[test]
    fn test_output_with_stderr_marker() {
        let mut t = Transcript::new();
        t.log_output("partial\n", "warning: deprecated");
        assert!(t.entries[0].content.contains("partial"));
        assert!(t.entries[0].content.contains("stderr: warning: deprecated"));
    }

    #[test]
    fn test_empty_output_skipped() {
        let mut t = Transcript::new();
        t.log_output("", "");
        assert!(t.entries.is_empty());
    }

    #[test]
    fn test_markdown_structure() {
        let mut t = Transcript::new();
        t.log_prompt("fix the bug");
        t.log_agent("Fixed by guarding the index.");
        t.log_command("npm test");
        t.log_output("4 passing\n", "");

        let md = t.export_markdown();
        assert!(md.contains("# Ketch session"));
        assert!(md.contains("### You"));
        assert!(md.contains("fix the bug"));
        assert!(md.contains("### Ketch"));
        assert!(md.contains("```bash\n$ npm test\n```"));
        assert!(md.contains("4 passing"));
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = Transcript::new();
        t.log_command("ls");
        let path = t.export_to_file(Some(dir.path())).unwrap();
        assert!(path.exists());
        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.contains("$ ls"));
    }
}
