//! Per-user mutual exclusion for operations that read and then clear a session.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::traits::UserId;

/// Registry of one async lock per user.
///
/// Convert and cancel hold the user's lock for their whole read-render-clear
/// sequence; different users never contend.
#[derive(Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the lock for `user`.
    pub async fn lock(&self, user: &UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            // Entries only the registry references are idle.
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            Arc::clone(locks.entry(user.clone()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of users with a held or awaited lock.
    pub fn tracked(&self) -> usize {
        self.locks
            .lock()
            .values()
            .filter(|l| Arc::strong_count(l) > 1)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_user_is_serialized() {
        let locks = Arc::new(UserLocks::new());
        let user = UserId::new("7");

        let guard = locks.lock(&user).await;
        let waiter = {
            let locks = Arc::clone(&locks);
            let user = user.clone();
            tokio::spawn(async move {
                let _g = locks.lock(&user).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should acquire after release")
            .unwrap();
    }

    #[tokio::test]
    async fn different_users_do_not_contend() {
        let locks = UserLocks::new();
        let _a = locks.lock(&UserId::new("a")).await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.lock(&UserId::new("b"))).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn idle_entries_are_pruned() {
        let locks = UserLocks::new();
        {
            let _g = locks.lock(&UserId::new("a")).await;
            assert_eq!(locks.tracked(), 1);
        }
        assert_eq!(locks.tracked(), 0);
        let _g = locks.lock(&UserId::new("b")).await;
        assert_eq!(locks.locks.lock().len(), 1);
    }
}
