//! Bridge configuration loaded from `ketch.toml`.
//!
//! Every field has a default; a missing or unreadable config file yields the
//! defaults rather than an error.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the terminal bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Prompt glyph drawn before each input line.
    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// Whether to write the welcome banner on session binding.
    #[serde(default = "default_banner")]
    pub banner: bool,

    /// Extra program names added to the shell allow-list.
    #[serde(default)]
    pub extra_commands: Vec<String>,

    /// Directory for transcript exports. Defaults to `~/.ketch/sessions`.
    #[serde(default)]
    pub transcript_dir: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            banner: default_banner(),
            extra_commands: Vec::new(),
            transcript_dir: None,
        }
    }
}

fn default_prompt() -> String {
    "$ ".into()
}

fn default_banner() -> bool {
    true
}

fn default_config_path() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ketch")
        .join("ketch.toml")
}

impl BridgeConfig {
    /// Load configuration from the default config file.
    pub fn load() -> Self {
        Self::load_from(&default_config_path())
    }

    /// Load configuration from a specific path, falling back to defaults.
    pub fn load_from(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }
}
