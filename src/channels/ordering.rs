//! Per-user ordering of inbound events.

use std::collections::HashMap;
use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::sessions::UserId;

/// Hands out turns so that events from one user are handled one after
/// another in arrival order, while different users proceed in parallel.
#[derive(Default)]
pub struct UserTurns {
    tails: HashMap<UserId, oneshot::Receiver<()>>,
}

/// A claimed position in one user's queue. The next turn for the same user
/// starts when this one is dropped.
pub struct Turn {
    previous: Option<oneshot::Receiver<()>>,
    done: oneshot::Sender<()>,
}

impl UserTurns {
    /// Claim the next turn for `user`. Calls must follow arrival order.
    pub fn next(&mut self, user: &UserId) -> Turn {
        self.tails.retain(|_, tail| !is_finished(tail));
        let (done, tail) = oneshot::channel();
        let previous = self.tails.insert(user.clone(), tail);
        Turn { previous, done }
    }

    /// Users with a turn still running or waiting.
    pub fn active_users(&mut self) -> usize {
        self.tails.retain(|_, tail| !is_finished(tail));
        self.tails.len()
    }
}

impl Turn {
    /// Wait until every earlier turn of the same user has ended.
    pub async fn wait(&mut self) {
        if let Some(previous) = self.previous.as_mut() {
            let _ = previous.await;
        }
        self.previous = None;
    }
}

fn is_finished(tail: &mut oneshot::Receiver<()>) -> bool {
    !matches!(tail.try_recv(), Err(TryRecvError::Empty))
}
