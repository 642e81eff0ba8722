//! Shell command vs agent prompt classifier.
//!
//! Decides, at submit time, whether a line of input is a literal shell
//! command, an invocation of the `ketch` CLI, the `clear` builtin, or a
//! natural language prompt for the agent. Classification is a pure function
//! of the input string plus a fixed allow-list, deliberately independent of
//! the streaming and display code so it can be unit tested without a live
//! transport.
//!
//! ## Precedence
//!
//! Explicit shell syntax and explicit `ketch` invocations always win over
//! natural language interpretation: a line that merely happens to start with
//! an allow-listed word is never routed to the agent, and only lines that
//! match nothing else fall through to the prompt path.

use std::collections::HashSet;

/// A classified unit of work, produced once per submitted line and consumed
/// immediately by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Literal shell command, streamed through the exec endpoint.
    Shell(String),
    /// Non-prompt `ketch` invocation (`ketch --version`, `ketch config`, ...).
    AgentUtility(String),
    /// `ketch <prompt>` invocation, rewritten to carry `-p` when missing.
    AgentPrint(String),
    /// The whole line is a natural language prompt for the agent.
    Prompt(String),
    /// The `clear` builtin: wipe the display, touch nothing else.
    Clear,
}

/// CLI entry point of the agent itself.
const AGENT_CLI: &str = "ketch";

/// `ketch` second tokens that mark a utility invocation rather than a prompt.
const AGENT_UTILITY_FORMS: &[&str] = &[
    "--version", "-v", "--help", "-h", "config", "auth", "login", "logout", "update", "doctor",
    "mcp",
];

/// Known command binaries (~200 common commands). First-token membership
/// classifies the line as a shell command.
const COMMAND_ALLOWLIST: &[&str] = &[
    // Core utilities
    "ls", "cd", "pwd", "echo", "cat", "head", "tail", "grep", "find", "sed",
    "awk", "sort", "uniq", "wc", "cut", "tr", "tee", "xargs", "mkdir", "rmdir",
    "rm", "cp", "mv", "ln", "touch", "chmod", "chown", "chgrp", "stat", "file",
    "diff", "patch", "tar", "gzip", "gunzip", "zip", "unzip", "bzip2",
    // Network
    "curl", "wget", "ssh", "scp", "rsync", "ping", "traceroute", "nslookup",
    "dig", "netstat", "ss", "nc", "nmap",
    // Version control
    "git", "svn", "hg",
    // Containers & orchestration
    "docker", "kubectl", "podman", "helm", "skaffold",
    // Rust
    "cargo", "rustc", "rustup", "rustfmt", "clippy",
    // JavaScript/TypeScript
    "npm", "npx", "node", "bun", "deno", "yarn", "pnpm", "tsc",
    // Python
    "python", "python3", "pip", "pip3", "pipenv", "poetry", "uv", "pytest",
    // Go
    "go",
    // Build systems
    "make", "cmake", "gcc", "clang", "g++", "cc", "ld",
    // Java/JVM
    "javac", "java", "mvn", "gradle",
    // Ruby
    "ruby", "gem", "bundle", "rake",
    // Other languages
    "perl", "php", "composer", "swift", "kotlinc",
    // Package managers
    "brew", "apt", "apt-get", "yum", "dnf", "pacman", "snap", "flatpak",
    // System
    "systemctl", "journalctl", "sudo", "su", "env", "export", "alias",
    "unalias", "source", "eval", "exec", "nohup", "screen", "tmux",
    // Process management
    "htop", "top", "ps", "kill", "killall", "pkill", "nice", "renice",
    "jobs", "fg", "bg",
    // Disk & filesystem
    "df", "du", "mount", "umount", "fdisk", "lsblk", "lsof",
    // System info
    "free", "uname", "whoami", "id", "groups", "passwd", "date", "cal",
    "uptime", "hostname", "ifconfig", "ip",
    // Firewall
    "iptables", "ufw",
    // Help/info
    "man", "info", "which", "whereis", "type", "history",
    // Infrastructure
    "terraform", "ansible", "vagrant", "pulumi", "sam", "cdk",
    // Testing
    "jest", "vitest", "mocha", "rspec",
    // Misc
    "tree", "less", "more", "watch", "time", "xdg-open", "open", "pbcopy",
    "pbpaste", "clear", "reset", "true", "false", "test", "set", "unset",
    "read", "printf", "sleep", "wait",
];

/// Line classifier with the built-in allow-list plus optional deployment
/// extras from configuration. Extras can only widen the shell set.
#[derive(Debug, Clone)]
pub struct Classifier {
    allowlist: HashSet<&'static str>,
    extras: HashSet<String>,
}

impl Classifier {
    /// Create a classifier with the built-in allow-list only.
    pub fn new() -> Self {
        Self {
            allowlist: COMMAND_ALLOWLIST.iter().copied().collect(),
            extras: HashSet::new(),
        }
    }

    /// Create a classifier with extra allow-listed program names.
    pub fn with_extras(extras: impl IntoIterator<Item = String>) -> Self {
        Self {
            allowlist: COMMAND_ALLOWLIST.iter().copied().collect(),
            extras: extras.into_iter().collect(),
        }
    }

    /// Classify one submitted line.
    ///
    /// Returns `None` for input that is empty after trimming: no work is
    /// produced and the caller just re-draws the prompt.
    pub fn classify(&self, raw: &str) -> Option<Command> {
        let line = raw.trim();
        if line.is_empty() {
            return None;
        }
        if line == "clear" {
            return Some(Command::Clear);
        }

        let first = line.split_whitespace().next().unwrap_or("");
        if self.is_shell_token(first) {
            return Some(Command::Shell(line.to_string()));
        }
        if first == AGENT_CLI {
            return Some(classify_agent_invocation(line));
        }
        Some(Command::Prompt(line.to_string()))
    }

    /// Whether a first token marks the line as a shell command: allow-list
    /// membership, an explicit path prefix, or an environment assignment.
    fn is_shell_token(&self, token: &str) -> bool {
        self.allowlist.contains(token)
            || self.extras.contains(token)
            || token.starts_with("./")
            || token.starts_with('/')
            || token.starts_with('~')
            || token.contains('=')
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a `ketch ...` line into utility vs prompt form.
///
/// A bare `ketch` and recognized utility sub-forms run verbatim through the
/// exec endpoint. Anything else is prompt text: the environment has no
/// interactive terminal, so a non-print invocation would hang, and the line
/// is rewritten to carry `-p` unless the user already passed a print flag.
fn classify_agent_invocation(line: &str) -> Command {
    let mut tokens = line.split_whitespace();
    let _cli = tokens.next();
    match tokens.next() {
        None => Command::AgentUtility(line.to_string()),
        Some(second) if AGENT_UTILITY_FORMS.contains(&second) => {
            Command::AgentUtility(line.to_string())
        }
        Some(_) => Command::AgentPrint(ensure_print_flag(line)),
    }
}

/// Insert `-p` immediately after the CLI token unless `-p`/`--print` is
/// already present anywhere in the line.
fn ensure_print_flag(line: &str) -> String {
    let has_flag = line.split_whitespace().any(|t| t == "-p" || t == "--print");
    if has_flag {
        return line.to_string();
    }
    match line.split_once(char::is_whitespace) {
        Some((cli, rest)) => format!("{cli} -p {}", rest.trim_start()),
        None => format!("{line} -p"),
    }
}
