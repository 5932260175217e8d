//! Session storage traits and types for pending Markdown fragments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Separator placed between fragments when they are joined for rendering.
/// A blank line keeps paragraph breaks intact across chat messages.
pub const FRAGMENT_SEPARATOR: &str = "\n\n";

/// Number of characters of the first fragment shown in `/status`.
pub const PREVIEW_CHARS: usize = 100;

/// Opaque, stable user identity supplied by the chat transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fragments accumulated for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub fragments: Vec<String>,
    pub total_chars: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            fragments: Vec::new(),
            total_chars: 0,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn joined(&self) -> String {
        self.fragments.join(FRAGMENT_SEPARATOR)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy of a session taken at the start of a conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub count: usize,
    pub joined: String,
}

/// Summary reported by `/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub fragments: usize,
    pub total_chars: usize,
    pub preview: String,
    pub created_at: DateTime<Utc>,
}

/// Per-session caps that bound memory held for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub max_fragments: usize,
    pub max_total_chars: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_fragments: 200,
            max_total_chars: 500_000,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("fragment is empty")]
    EmptyFragment,

    #[error("session limit reached: at most {limit} {what}")]
    LimitExceeded { what: &'static str, limit: usize },
}

/// Storage for pending fragments, keyed by user.
///
/// A user with no entry behaves exactly like a user with an empty session.
pub trait SessionStore: Send + Sync {
    /// Append `text` as the newest fragment. Returns the new fragment count.
    fn append(&self, user: &UserId, text: &str) -> Result<usize, SessionError>;

    /// Number of fragments currently held (0 if none).
    fn count(&self, user: &UserId) -> usize;

    /// Status summary, or `None` when nothing is pending.
    fn stats(&self, user: &UserId) -> Option<SessionStats>;

    /// Join all fragments in insertion order and remove the entry.
    /// Returns an empty string when nothing is pending.
    fn join_and_clear(&self, user: &UserId) -> String;

    /// Join all fragments without clearing them.
    fn snapshot(&self, user: &UserId) -> Option<SessionSnapshot>;

    /// Drop the first `count` fragments, keeping anything appended after the
    /// matching snapshot was taken.
    fn commit(&self, user: &UserId, count: usize);

    /// Remove the entry. No-op when absent.
    fn clear(&self, user: &UserId);

    /// The name of this session store implementation.
    fn name(&self) -> &str;
}

/// First `PREVIEW_CHARS` characters of `text`, with `...` when truncated.
pub fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_keeps_short_text() {
        assert_eq!(preview("# Title"), "# Title");
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let text = "é".repeat(150);
        let p = preview(&text);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
    }

    #[test]
    fn session_joins_with_blank_line() {
        let mut session = Session::new();
        session.fragments.push("a".into());
        session.fragments.push("b".into());
        assert_eq!(session.joined(), "a\n\nb");
    }

    #[test]
    fn user_id_displays_raw_value() {
        assert_eq!(UserId::new("42").to_string(), "42");
    }
}
