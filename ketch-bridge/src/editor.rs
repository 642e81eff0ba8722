//! Line editor and command history for the terminal input line.
//!
//! Owns the not-yet-submitted input line and the replayable command history.
//! The editor is a pure state machine: each keystroke produces an
//! [`EditorEffect`] describing what the display surface should do, and the
//! bridge applies it. Echo and redraw logic therefore stays unit testable
//! without a terminal attached.
//!
//! History is append-only and survives session re-binding. While browsing
//! history (Up/Down), the in-progress line is parked as a draft and restored
//! when navigation runs past the newest entry.

/// A single keystroke, already decoded by the host's input channels.
///
/// Printable characters arrive on the raw data channel; arrow keys arrive on
/// the key event channel. A bare escape character is swallowed upstream and
/// never reaches this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    /// A character from the raw data channel (control chars are ignored).
    Char(char),
    /// Carriage return: submit the line.
    Enter,
    /// Backspace / DEL: remove the last character.
    Backspace,
    /// Ctrl-C: discard the line (or, while running, abort - handled upstream).
    CtrlC,
    /// Ctrl-U: clear the whole line.
    CtrlU,
    /// Arrow up: recall older history.
    Up,
    /// Arrow down: recall newer history / restore the draft.
    Down,
}

/// Display instruction produced by one keystroke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEffect {
    /// Nothing to render.
    None,
    /// Echo the given text at the cursor.
    Echo(String),
    /// Erase the last `n` echoed columns.
    Erase(usize),
    /// Erase `erase` columns, then write `text` (in-place history redraw).
    Replace { erase: usize, text: String },
    /// A non-empty line was submitted; the buffer was cleared.
    Submit(String),
    /// Enter on an empty line: just advance to a fresh prompt.
    EmptySubmit,
    /// Ctrl-C with no command running: line discarded, `^C` echo + fresh prompt.
    Interrupt,
}

/// Append/backspace line editor with Up/Down history recall.
#[derive(Debug, Default)]
pub struct LineEditor {
    /// The in-progress input line. Reset on submit or Ctrl-C.
    line: String,
    /// Previously submitted lines, oldest first. Never evicted.
    history: Vec<String>,
    /// Index into `history` while browsing; `None` when not browsing.
    cursor: Option<usize>,
    /// Draft captured when browsing begins; meaningful only while browsing.
    draft: String,
}

impl LineEditor {
    /// Create an empty editor.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current in-progress line.
    pub fn line(&self) -> &str {
        &self.line
    }

    /// All submitted lines, oldest first.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// True while Up/Down navigation has replaced the line with a history entry.
    pub fn is_browsing(&self) -> bool {
        self.cursor.is_some()
    }

    /// Feed one keystroke and return the display effect.
    ///
    /// The caller is responsible for suppressing everything but Ctrl-C while
    /// a command is running; this type never sees those keystrokes.
    pub fn handle_key(&mut self, key: KeyInput) -> EditorEffect {
        match key {
            KeyInput::Char(c) if !c.is_control() => {
                self.line.push(c);
                EditorEffect::Echo(c.to_string())
            }
            // Stray control characters on the data channel carry no meaning.
            KeyInput::Char(_) => EditorEffect::None,
            KeyInput::Backspace => {
                if self.line.pop().is_some() {
                    EditorEffect::Erase(1)
                } else {
                    EditorEffect::None
                }
            }
            KeyInput::CtrlU => {
                let cols = self.line.chars().count();
                self.line.clear();
                if cols == 0 {
                    EditorEffect::None
                } else {
                    EditorEffect::Erase(cols)
                }
            }
            KeyInput::CtrlC => {
                self.line.clear();
                self.cursor = None;
                self.draft.clear();
                EditorEffect::Interrupt
            }
            KeyInput::Enter => {
                let submitted = self.line.trim().to_string();
                self.line.clear();
                self.cursor = None;
                self.draft.clear();
                if submitted.is_empty() {
                    EditorEffect::EmptySubmit
                } else {
                    self.history.push(submitted.clone());
                    EditorEffect::Submit(submitted)
                }
            }
            KeyInput::Up => self.history_prev(),
            KeyInput::Down => self.history_next(),
        }
    }

    /// Move to the previous (older) history entry. Floors at the oldest
    /// entry: it does not wrap.
    fn history_prev(&mut self) -> EditorEffect {
        if self.history.is_empty() {
            return EditorEffect::None;
        }
        let index = match self.cursor {
            None => {
                self.draft = self.line.clone();
                self.history.len() - 1
            }
            Some(0) => 0,
            Some(i) => i - 1,
        };
        self.cursor = Some(index);
        self.replace_line(self.history[index].clone())
    }

    /// Move to the next (newer) history entry, restoring the parked draft
    /// when navigation runs past the newest entry.
    fn history_next(&mut self) -> EditorEffect {
        match self.cursor {
            None => EditorEffect::None,
            Some(i) if i + 1 >= self.history.len() => {
                self.cursor = None;
                let draft = std::mem::take(&mut self.draft);
                self.replace_line(draft)
            }
            Some(i) => {
                self.cursor = Some(i + 1);
                self.replace_line(self.history[i + 1].clone())
            }
        }
    }

    /// Swap the line content, reporting how many columns to erase first.
    fn replace_line(&mut self, text: String) -> EditorEffect {
        let erase = self.line.chars().count();
        self.line = text.clone();
        EditorEffect::Replace { erase, text }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn submit(editor: &mut LineEditor, line: &str) {
        for c in line.chars() {
            editor.handle_key(KeyInput::Char(c));
        }
        assert_eq!(
            editor.handle_key(KeyInput::Enter),
            EditorEffect::Submit(line.to_string())
        );
    }

    #[test]
    fn test_echo_on_printable() {
        let mut e = LineEditor::new();
        assert_eq!(e.handle_key(KeyInput::Char('l')), EditorEffect::Echo("l".into()));
        assert_eq!(e.handle_key(KeyInput::Char('s')), EditorEffect::Echo("s".into()));
        assert_eq!(e.line(), "ls");
    }

    #[test]
    fn test_control_chars_swallowed() {
        let mut e = LineEditor::new();
        assert_eq!(e.handle_key(KeyInput::Char('\x1b')), EditorEffect::None);
        assert_eq!(e.handle_key(KeyInput::Char('\x07')), EditorEffect::None);
        assert!(e.line().is_empty());
    }

    #[test]
    fn test_backspace() {
        let mut e = LineEditor::new();
        e.handle_key(KeyInput::Char('a'));
        e.handle_key(KeyInput::Char('b'));
        assert_eq!(e.handle_key(KeyInput::Backspace), EditorEffect::Erase(1));
        assert_eq!(e.line(), "a");
    }

    #[test]
    fn test_backspace_on_empty_line() {
        let mut e = LineEditor::new();
        assert_eq!(e.handle_key(KeyInput::Backspace), EditorEffect::None);
    }

    #[test]
    fn test_ctrl_u_clears_whole_line() {
        let mut e = LineEditor::new();
        for c in "git st".chars() {
            e.handle_key(KeyInput::Char(c));
        }
        assert_eq!(e.handle_key(KeyInput::CtrlU), EditorEffect::Erase(6));
        assert!(e.line().is_empty());
        // A second Ctrl-U has nothing to erase.
        assert_eq!(e.handle_key(KeyInput::CtrlU), EditorEffect::None);
    }

    #[test]
    fn test_ctrl_c_discards_line() {
        let mut e = LineEditor::new();
        e.handle_key(KeyInput::Char('x'));
        assert_eq!(e.handle_key(KeyInput::CtrlC), EditorEffect::Interrupt);
        assert!(e.line().is_empty());
        // The discarded line never reaches history.
        assert!(e.history().is_empty());
    }

    #[test]
    fn test_submit_trims_and_records_history() {
        let mut e = LineEditor::new();
        for c in "  ls  ".chars() {
            e.handle_key(KeyInput::Char(c));
        }
        assert_eq!(e.handle_key(KeyInput::Enter), EditorEffect::Submit("ls".into()));
        assert_eq!(e.history(), ["ls"]);
        assert!(e.line().is_empty());
    }

    #[test]
    fn test_empty_submit() {
        let mut e = LineEditor::new();
        assert_eq!(e.handle_key(KeyInput::Enter), EditorEffect::EmptySubmit);
        for c in "   ".chars() {
            e.handle_key(KeyInput::Char(c));
        }
        assert_eq!(e.handle_key(KeyInput::Enter), EditorEffect::EmptySubmit);
        assert!(e.history().is_empty());
    }

    #[test]
    fn test_history_round_trip() {
        let mut e = LineEditor::new();
        submit(&mut e, "a");
        submit(&mut e, "b");
        submit(&mut e, "c");

        // Up three times walks c, b, a.
        assert_eq!(
            e.handle_key(KeyInput::Up),
            EditorEffect::Replace { erase: 0, text: "c".into() }
        );
        assert_eq!(
            e.handle_key(KeyInput::Up),
            EditorEffect::Replace { erase: 1, text: "b".into() }
        );
        assert_eq!(
            e.handle_key(KeyInput::Up),
            EditorEffect::Replace { erase: 1, text: "a".into() }
        );
        // A fourth Up floors at the oldest entry.
        assert_eq!(
            e.handle_key(KeyInput::Up),
            EditorEffect::Replace { erase: 1, text: "a".into() }
        );
        assert_eq!(e.line(), "a");
    }

    #[test]
    fn test_history_down_restores_draft() {
        let mut e = LineEditor::new();
        submit(&mut e, "a");
        submit(&mut e, "b");
        submit(&mut e, "c");

        // Start a draft, then browse all the way back.
        for c in "dr".chars() {
            e.handle_key(KeyInput::Char(c));
        }
        e.handle_key(KeyInput::Up); // c
        e.handle_key(KeyInput::Up); // b
        e.handle_key(KeyInput::Up); // a
        e.handle_key(KeyInput::Up); // still a (floor)

        // Down four times returns through b, c to the original draft.
        assert_eq!(
            e.handle_key(KeyInput::Down),
            EditorEffect::Replace { erase: 1, text: "b".into() }
        );
        assert_eq!(
            e.handle_key(KeyInput::Down),
            EditorEffect::Replace { erase: 1, text: "c".into() }
        );
        assert_eq!(
            e.handle_key(KeyInput::Down),
            EditorEffect::Replace { erase: 1, text: "dr".into() }
        );
        assert!(!e.is_browsing());
        assert_eq!(e.handle_key(KeyInput::Down), EditorEffect::None);
        assert_eq!(e.line(), "dr");
    }

    #[test]
    fn test_down_without_browsing_is_noop() {
        let mut e = LineEditor::new();
        submit(&mut e, "a");
        assert_eq!(e.handle_key(KeyInput::Down), EditorEffect::None);
    }

    #[test]
    fn test_up_with_empty_history_is_noop() {
        let mut e = LineEditor::new();
        e.handle_key(KeyInput::Char('x'));
        assert_eq!(e.handle_key(KeyInput::Up), EditorEffect::None);
        assert_eq!(e.line(), "x");
    }

    #[test]
    fn test_submit_while_browsing_records_recalled_line() {
        let mut e = LineEditor::new();
        submit(&mut e, "first");
        e.handle_key(KeyInput::Up);
        assert_eq!(
            e.handle_key(KeyInput::Enter),
            EditorEffect::Submit("first".into())
        );
        assert_eq!(e.history(), ["first", "first"]);
        assert!(!e.is_browsing());
    }

    #[test]
    fn test_history_survives_interrupt() {
        let mut e = LineEditor::new();
        submit(&mut e, "kept");
        e.handle_key(KeyInput::Char('x'));
        e.handle_key(KeyInput::CtrlC);
        assert_eq!(e.history(), ["kept"]);
        assert_eq!(
            e.handle_key(KeyInput::Up),
            EditorEffect::Replace { erase: 0, text: "kept".into() }
        );
    }

    #[test]
    fn test_unicode_columns() {
        let mut e = LineEditor::new();
        for c in "héllo".chars() {
            e.handle_key(KeyInput::Char(c));
        }
        // Five characters typed, five columns to clear.
        assert_eq!(e.handle_key(KeyInput::CtrlU), EditorEffect::Erase(5));
    }
}
