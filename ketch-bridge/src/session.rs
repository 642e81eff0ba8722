//! Session identity and the external session store seam.
//!
//! The bridge never reaches into the host's state through globals. The host
//! injects a [`SessionStore`] at construction time; the bridge calls its
//! refresh hooks fire-and-forget after an agent turn completes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a workspace session.
///
/// Opaque to the bridge; it is only forwarded to the transports and shown in
/// the welcome banner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create a session identifier from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// External session state provider.
///
/// `refresh_files` and `refresh_git_status` are fire-and-forget triggers: the
/// bridge calls them once after a natural language agent turn completes
/// normally and never waits on the result.
pub trait SessionStore: Send + Sync {
    /// Ask the host to reload the session's file tree.
    fn refresh_files(&self);

    /// Ask the host to reload the session's git status.
    fn refresh_git_status(&self);
}

/// A store that ignores all refresh triggers.
///
/// Useful for hosts without a file tree or git view, and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSessionStore;

impl SessionStore for NullSessionStore {
    fn refresh_files(&self) {}
    fn refresh_git_status(&self) {}
}
