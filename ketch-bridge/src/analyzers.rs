//! Post-execution output analyzers: test summaries and stack traces.
//!
//! After a shell command's stream completes, the combined transcript is
//! scanned for a recognizable test-framework summary and stderr for a
//! recognizable stack trace. Hits are pushed to the injected overlay sinks.
//! Both scanners are best-effort pattern matchers: an unrecognized format
//! produces no report, never an error, and the two scans are independent of
//! each other.

use std::fmt;

use regex::Regex;

// ─── Test reports ───────────────────────────────────────────────────────────

/// Test framework recognized in command output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestFramework {
    CargoTest,
    Pytest,
    Jest,
    GoTest,
}

impl fmt::Display for TestFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CargoTest => write!(f, "cargo test"),
            Self::Pytest => write!(f, "pytest"),
            Self::Jest => write!(f, "jest"),
            Self::GoTest => write!(f, "go test"),
        }
    }
}

/// Outcome of a single test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

/// One test case extracted from the output.
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    pub name: String,
    pub status: TestStatus,
    /// Per-test duration, where the framework prints one.
    pub duration_secs: Option<f64>,
}

/// Structured summary of a test run.
#[derive(Debug, Clone, PartialEq)]
pub struct TestReport {
    pub framework: TestFramework,
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    /// Whole-run duration, where the framework prints one.
    pub duration_secs: Option<f64>,
    /// Per-test results; may be empty when only the summary line is present.
    pub cases: Vec<TestCase>,
}

/// Overlay sink shown a [`TestReport`] when one is detected.
pub trait TestReportSink: Send + Sync {
    fn show_report(&self, report: TestReport);
}

// ─── Stack traces ───────────────────────────────────────────────────────────

/// Stack trace dialect recognized on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFlavor {
    RustPanic,
    PythonTraceback,
    NodeStack,
}

impl fmt::Display for TraceFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RustPanic => write!(f, "rust panic"),
            Self::PythonTraceback => write!(f, "python traceback"),
            Self::NodeStack => write!(f, "node stack"),
        }
    }
}

/// One parsed stack frame.
#[derive(Debug, Clone, PartialEq)]
pub struct StackFrame {
    /// Function or symbol name; the raw line when no symbol is present.
    pub symbol: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

/// A parsed stack trace.
#[derive(Debug, Clone, PartialEq)]
pub struct StackTraceReport {
    pub flavor: TraceFlavor,
    /// The panic/exception message, when one could be extracted.
    pub message: Option<String>,
    pub frames: Vec<StackFrame>,
}

/// Overlay sink shown a [`StackTraceReport`] when one is detected.
pub trait TraceSink: Send + Sync {
    fn show_trace(&self, trace: StackTraceReport);
}

// ─── Scanner ────────────────────────────────────────────────────────────────

/// Pattern-matching engine over completed command output.
///
/// Regexes are compiled once at construction for repeated use.
pub struct OutputScanner {
    // cargo test
    cargo_summary: Regex,
    cargo_duration: Regex,
    cargo_case: Regex,

    // go test
    go_case: Regex,
    go_package: Regex,

    // jest / vitest
    jest_tests_line: Regex,
    jest_time: Regex,

    // pytest
    pytest_summary: Regex,
    pytest_case: Regex,

    // shared count extraction ("3 passed", "1 failed", ...)
    count_passed: Regex,
    count_failed: Regex,
    count_skipped: Regex,

    // rust panic
    rust_panic_old: Regex,
    rust_panic_new: Regex,
    rust_frame_symbol: Regex,
    rust_frame_at: Regex,

    // python traceback
    python_start: Regex,
    python_frame: Regex,
    python_message: Regex,

    // node stack
    node_error: Regex,
    node_frame_paren: Regex,
    node_frame_bare: Regex,
}

impl OutputScanner {
    /// Create a scanner with pre-compiled patterns.
    pub fn new() -> Self {
        Self {
            cargo_summary: Regex::new(
                r"test result: (?:ok|FAILED)\. (\d+) passed; (\d+) failed; (\d+) ignored",
            )
            .expect("valid regex"),
            cargo_duration: Regex::new(r"finished in ([0-9]+\.[0-9]+)s").expect("valid regex"),
            cargo_case: Regex::new(r"(?m)^test (\S+) \.\.\. (ok|FAILED|ignored)$")
                .expect("valid regex"),

            go_case: Regex::new(r"(?m)^--- (PASS|FAIL|SKIP): (\S+) \(([0-9.]+)s\)")
                .expect("valid regex"),
            go_package: Regex::new(r"(?m)^(?:ok|FAIL)\s+\S+\s+([0-9.]+)s").expect("valid regex"),

            jest_tests_line: Regex::new(r"(?m)^Tests:\s+(.+)$").expect("valid regex"),
            jest_time: Regex::new(r"(?m)^Time:\s+([0-9.]+)\s*s").expect("valid regex"),

            pytest_summary: Regex::new(r"(?m)^=+\s(.*?(?:passed|failed|error|skipped).*?)\sin\s([0-9.]+)s\s.*=+\s*$")
                .expect("valid regex"),
            pytest_case: Regex::new(r"(?m)^(\S+::\S+)\s+(PASSED|FAILED|SKIPPED)")
                .expect("valid regex"),

            count_passed: Regex::new(r"(\d+) passed").expect("valid regex"),
            count_failed: Regex::new(r"(\d+) failed").expect("valid regex"),
            count_skipped: Regex::new(r"(\d+) skipped").expect("valid regex"),

            rust_panic_old: Regex::new(r"thread '[^']*' panicked at '([^']*)', (.+):(\d+):(\d+)")
                .expect("valid regex"),
            rust_panic_new: Regex::new(r"thread '[^']*' panicked at (.+):(\d+):(\d+):?\s*$")
                .expect("valid regex"),
            rust_frame_symbol: Regex::new(r"^\s*(\d+): (.+)$").expect("valid regex"),
            rust_frame_at: Regex::new(r"^\s+at (.+?):(\d+)(?::(\d+))?$").expect("valid regex"),

            python_start: Regex::new(r"^Traceback \(most recent call last\):")
                .expect("valid regex"),
            python_frame: Regex::new(r#"^\s+File "([^"]+)", line (\d+), in (.+)$"#)
                .expect("valid regex"),
            python_message: Regex::new(r"^([A-Za-z_][A-Za-z0-9_.]*(?:Error|Exception)):?\s*(.*)$")
                .expect("valid regex"),

            node_error: Regex::new(r"^([A-Za-z]*Error): (.+)$").expect("valid regex"),
            node_frame_paren: Regex::new(r"^\s+at (.+?) \((.+?):(\d+):(\d+)\)$")
                .expect("valid regex"),
            node_frame_bare: Regex::new(r"^\s+at (.+?):(\d+):(\d+)$").expect("valid regex"),
        }
    }

    // ── Test summaries ──────────────────────────────────────────────────

    /// Scan combined stdout+stderr for a test-framework summary.
    ///
    /// Frameworks are tried most-specific first; the first hit wins.
    pub fn scan_tests(&self, output: &str) -> Option<TestReport> {
        self.scan_cargo(output)
            .or_else(|| self.scan_go(output))
            .or_else(|| self.scan_jest(output))
            .or_else(|| self.scan_pytest(output))
    }

    fn scan_cargo(&self, output: &str) -> Option<TestReport> {
        let caps = self.cargo_summary.captures(output)?;
        let passed = parse_u32(caps.get(1));
        let failed = parse_u32(caps.get(2));
        let skipped = parse_u32(caps.get(3));

        let cases = self
            .cargo_case
            .captures_iter(output)
            .map(|c| TestCase {
                name: c[1].to_string(),
                status: match &c[2] {
                    "ok" => TestStatus::Passed,
                    "ignored" => TestStatus::Skipped,
                    _ => TestStatus::Failed,
                },
                duration_secs: None,
            })
            .collect();

        Some(TestReport {
            framework: TestFramework::CargoTest,
            total: passed + failed + skipped,
            passed,
            failed,
            skipped,
            duration_secs: self
                .cargo_duration
                .captures(output)
                .and_then(|c| c[1].parse().ok()),
            cases,
        })
    }

    fn scan_go(&self, output: &str) -> Option<TestReport> {
        let cases: Vec<TestCase> = self
            .go_case
            .captures_iter(output)
            .map(|c| TestCase {
                name: c[2].to_string(),
                status: match &c[1] {
                    "PASS" => TestStatus::Passed,
                    "SKIP" => TestStatus::Skipped,
                    _ => TestStatus::Failed,
                },
                duration_secs: c[3].parse().ok(),
            })
            .collect();
        if cases.is_empty() {
            return None;
        }

        let passed = count_status(&cases, TestStatus::Passed);
        let failed = count_status(&cases, TestStatus::Failed);
        let skipped = count_status(&cases, TestStatus::Skipped);
        Some(TestReport {
            framework: TestFramework::GoTest,
            total: cases.len() as u32,
            passed,
            failed,
            skipped,
            duration_secs: self
                .go_package
                .captures(output)
                .and_then(|c| c[1].parse().ok()),
            cases,
        })
    }

    fn scan_jest(&self, output: &str) -> Option<TestReport> {
        let line = self.jest_tests_line.captures(output)?;
        let counts = &line[1];
        let passed = self.extract_count(&self.count_passed, counts);
        let failed = self.extract_count(&self.count_failed, counts);
        let skipped = self.extract_count(&self.count_skipped, counts);
        if passed + failed + skipped == 0 {
            return None;
        }
        Some(TestReport {
            framework: TestFramework::Jest,
            total: passed + failed + skipped,
            passed,
            failed,
            skipped,
            duration_secs: self
                .jest_time
                .captures(output)
                .and_then(|c| c[1].parse().ok()),
            cases: Vec::new(),
        })
    }

    fn scan_pytest(&self, output: &str) -> Option<TestReport> {
        let caps = self.pytest_summary.captures(output)?;
        let counts = &caps[1];
        let duration: Option<f64> = caps[2].parse().ok();
        let passed = self.extract_count(&self.count_passed, counts);
        let failed = self.extract_count(&self.count_failed, counts);
        let skipped = self.extract_count(&self.count_skipped, counts);
        if passed + failed + skipped == 0 {
            return None;
        }

        let cases = self
            .pytest_case
            .captures_iter(output)
            .map(|c| TestCase {
                name: c[1].to_string(),
                status: match &c[2] {
                    "PASSED" => TestStatus::Passed,
                    "SKIPPED" => TestStatus::Skipped,
                    _ => TestStatus::Failed,
                },
                duration_secs: None,
            })
            .collect();

        Some(TestReport {
            framework: TestFramework::Pytest,
            total: passed + failed + skipped,
            passed,
            failed,
            skipped,
            duration_secs: duration,
            cases,
        })
    }

    fn extract_count(&self, pattern: &Regex, haystack: &str) -> u32 {
        pattern
            .captures(haystack)
            .map(|c| parse_u32(c.get(1)))
            .unwrap_or(0)
    }

    // ── Stack traces ────────────────────────────────────────────────────

    /// Scan stderr for a stack trace. Dialects are tried most-distinctive
    /// first (Python, Rust, Node); the first hit wins.
    pub fn scan_trace(&self, stderr: &str) -> Option<StackTraceReport> {
        let lines: Vec<&str> = stderr.lines().collect();
        self.scan_python_trace(&lines)
            .or_else(|| self.scan_rust_trace(&lines))
            .or_else(|| self.scan_node_trace(&lines))
    }

    fn scan_python_trace(&self, lines: &[&str]) -> Option<StackTraceReport> {
        let start = lines.iter().position(|l| self.python_start.is_match(l))?;

        let mut frames = Vec::new();
        let mut message = None;
        for line in &lines[start + 1..] {
            if let Some(caps) = self.python_frame.captures(line) {
                frames.push(StackFrame {
                    symbol: caps[3].trim().to_string(),
                    file: Some(caps[1].to_string()),
                    line: caps[2].parse().ok(),
                    column: None,
                });
            } else if let Some(caps) = self.python_message.captures(line.trim_end()) {
                let detail = caps[2].trim();
                message = Some(if detail.is_empty() {
                    caps[1].to_string()
                } else {
                    format!("{}: {}", &caps[1], detail)
                });
                break;
            }
        }

        Some(StackTraceReport {
            flavor: TraceFlavor::PythonTraceback,
            message,
            frames,
        })
    }

    fn scan_rust_trace(&self, lines: &[&str]) -> Option<StackTraceReport> {
        let mut message = None;
        let mut start = None;
        for (i, line) in lines.iter().enumerate() {
            if let Some(caps) = self.rust_panic_old.captures(line) {
                message = Some(caps[1].to_string());
                start = Some(i);
                break;
            }
            if self.rust_panic_new.is_match(line) {
                // New panic format: the message is on the following line.
                message = lines
                    .get(i + 1)
                    .map(|l| l.trim())
                    .filter(|l| !l.is_empty() && !l.starts_with("note:"))
                    .map(str::to_string);
                start = Some(i);
                break;
            }
        }
        let start = start?;

        let mut frames: Vec<StackFrame> = Vec::new();
        for line in &lines[start + 1..] {
            if let Some(caps) = self.rust_frame_symbol.captures(line) {
                frames.push(StackFrame {
                    symbol: caps[2].trim().to_string(),
                    file: None,
                    line: None,
                    column: None,
                });
            } else if let Some(caps) = self.rust_frame_at.captures(line) {
                // Location line belongs to the preceding symbol frame.
                if let Some(frame) = frames.last_mut() {
                    frame.file = Some(caps[1].to_string());
                    frame.line = caps[2].parse().ok();
                    frame.column = caps.get(3).and_then(|c| c.as_str().parse().ok());
                }
            }
        }

        Some(StackTraceReport {
            flavor: TraceFlavor::RustPanic,
            message,
            frames,
        })
    }

    fn scan_node_trace(&self, lines: &[&str]) -> Option<StackTraceReport> {
        let start = lines.iter().position(|l| {
            self.node_error.is_match(l.trim_end())
        })?;
        let caps = self.node_error.captures(lines[start].trim_end())?;
        let message = Some(format!("{}: {}", &caps[1], &caps[2]));

        let mut frames = Vec::new();
        for line in &lines[start + 1..] {
            if let Some(caps) = self.node_frame_paren.captures(line) {
                frames.push(StackFrame {
                    symbol: caps[1].to_string(),
                    file: Some(caps[2].to_string()),
                    line: caps[3].parse().ok(),
                    column: caps[4].parse().ok(),
                });
            } else if let Some(caps) = self.node_frame_bare.captures(line) {
                frames.push(StackFrame {
                    symbol: String::new(),
                    file: Some(caps[1].to_string()),
                    line: caps[2].parse().ok(),
                    column: caps[3].parse().ok(),
                });
            } else {
                break;
            }
        }
        if frames.is_empty() {
            // A lone "Error:" line without frames is not a stack trace.
            return None;
        }

        Some(StackTraceReport {
            flavor: TraceFlavor::NodeStack,
            message,
            frames,
        })
    }
}

impl Default for OutputScanner {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_u32(m: Option<regex::Match<'_>>) -> u32 {
    m.and_then(|m| m.as_str().parse().ok()).unwrap_or(0)
}

fn count_status(cases: &[TestCase], status: TestStatus) -> u32 {
    cases.iter().filter(|c| c.status == status).count() as u32
}

// ─── Tests ──────────────────────────────────────────────────────────────────
