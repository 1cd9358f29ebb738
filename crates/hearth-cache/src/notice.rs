//! User-facing failure notices.
//!
//! The engine publishes a [`FailureNotice`] whenever it rolls a mutation
//! back. UI layers subscribe and surface the message; the engine does not
//! care whether anyone is listening.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::entry::CacheKey;
use crate::error::MutationError;

const GENERIC_MESSAGE: &str = "Something went wrong. Please try again.";
const LOGIN_MESSAGE: &str = "Your session has expired. Please sign in again.";

/// A rolled-back mutation, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureNotice {
    pub operation: String,
    pub message: String,
    /// The user has to sign in before retrying.
    pub requires_login: bool,
    /// Entries restored by the rollback.
    pub restored: Vec<CacheKey>,
}

impl FailureNotice {
    pub fn from_error(operation: &str, error: &MutationError, restored: Vec<CacheKey>) -> Self {
        let requires_login = error.requires_login();
        Self {
            operation: operation.to_string(),
            message: if requires_login {
                LOGIN_MESSAGE
            } else {
                GENERIC_MESSAGE
            }
            .to_string(),
            requires_login,
            restored,
        }
    }
}

/// Broadcast channel for [`FailureNotice`]s.
#[derive(Debug, Clone)]
pub struct NoticeBus {
    sender: broadcast::Sender<FailureNotice>,
}

impl NoticeBus {
    /// Creates a bus buffering up to `capacity` undelivered notices per
    /// subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes `notice`. Dropped silently when nobody is subscribed.
    pub fn publish(&self, notice: FailureNotice) {
        let _ = self.sender.send(notice);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<FailureNotice> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NoticeBus {
    fn default() -> Self {
        Self::new(64)
    }
}
