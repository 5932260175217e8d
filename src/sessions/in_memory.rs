//! In-memory session store implementation.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::traits::{
    preview, Session, SessionError, SessionLimits, SessionSnapshot, SessionStats, SessionStore,
    UserId,
};

/// An in-memory session store backed by a mutex-protected hash map.
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<UserId, Session>>,
    limits: SessionLimits,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_limits(SessionLimits::default())
    }

    pub fn with_limits(limits: SessionLimits) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            limits,
        }
    }

    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    /// Number of users with pending fragments.
    pub fn active_users(&self) -> usize {
        self.sessions.lock().len()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for InMemorySessionStore {
    fn append(&self, user: &UserId, text: &str) -> Result<usize, SessionError> {
        if text.trim().is_empty() {
            return Err(SessionError::EmptyFragment);
        }
        let chars = text.chars().count();

        let mut sessions = self.sessions.lock();
        let (fragments, total_chars) = sessions
            .get(user)
            .map_or((0, 0), |s| (s.fragments.len(), s.total_chars));

        if fragments >= self.limits.max_fragments {
            return Err(SessionError::LimitExceeded {
                what: "fragments",
                limit: self.limits.max_fragments,
            });
        }
        if total_chars + chars > self.limits.max_total_chars {
            return Err(SessionError::LimitExceeded {
                what: "characters",
                limit: self.limits.max_total_chars,
            });
        }

        let session = sessions.entry(user.clone()).or_default();
        session.fragments.push(text.to_string());
        session.total_chars += chars;
        session.last_activity = Utc::now();
        Ok(session.fragments.len())
    }

    fn count(&self, user: &UserId) -> usize {
        self.sessions
            .lock()
            .get(user)
            .map_or(0, |s| s.fragments.len())
    }

    fn stats(&self, user: &UserId) -> Option<SessionStats> {
        let sessions = self.sessions.lock();
        let session = sessions.get(user).filter(|s| !s.fragments.is_empty())?;
        Some(SessionStats {
            fragments: session.fragments.len(),
            total_chars: session.total_chars,
            preview: preview(&session.fragments[0]),
            created_at: session.created_at,
        })
    }

    fn join_and_clear(&self, user: &UserId) -> String {
        self.sessions
            .lock()
            .remove(user)
            .map(|s| s.joined())
            .unwrap_or_default()
    }

    fn snapshot(&self, user: &UserId) -> Option<SessionSnapshot> {
        let sessions = self.sessions.lock();
        let session = sessions.get(user).filter(|s| !s.fragments.is_empty())?;
        Some(SessionSnapshot {
            count: session.fragments.len(),
            joined: session.joined(),
        })
    }

    fn commit(&self, user: &UserId, count: usize) {
        let mut sessions = self.sessions.lock();
        let Some(session) = sessions.get_mut(user) else {
            return;
        };

        let count = count.min(session.fragments.len());
        let removed: usize = session
            .fragments
            .drain(..count)
            .map(|f| f.chars().count())
            .sum();
        session.total_chars = session.total_chars.saturating_sub(removed);

        if session.fragments.is_empty() {
            sessions.remove(user);
        }
    }

    fn clear(&self, user: &UserId) {
        self.sessions.lock().remove(user);
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}
