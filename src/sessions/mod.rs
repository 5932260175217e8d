//! Session management: pending Markdown fragments per user.

use std::sync::Arc;

pub mod in_memory;
pub mod locks;
pub mod traits;

pub use in_memory::InMemorySessionStore;
pub use locks::UserLocks;
pub use traits::{
    Session, SessionError, SessionLimits, SessionSnapshot, SessionStats, SessionStore, UserId,
    FRAGMENT_SEPARATOR,
};

/// Create the default in-memory session store.
pub fn create_session_store(limits: SessionLimits) -> Arc<dyn SessionStore> {
    Arc::new(InMemorySessionStore::with_limits(limits))
}
