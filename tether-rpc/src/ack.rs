//! Waiters for server acknowledgements.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

/// `msg_id → signal`, fired once when the server acks the message.
///
/// A [`CancellationToken`] is used as the signal because it is level
/// triggered and cheap to clone: a waiter that starts listening after the
/// ack arrived still observes it.
#[derive(Debug, Default)]
pub(crate) struct AckWaiters {
    waiters: Mutex<HashMap<i64, CancellationToken>>,
}

impl AckWaiters {
    fn lock(&self) -> MutexGuard<'_, HashMap<i64, CancellationToken>> {
        self.waiters.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register interest in the ack for `msg_id`.
    ///
    /// A second registration for the same id shares the first signal.
    pub(crate) fn register(&self, msg_id: i64) -> CancellationToken {
        let mut waiters = self.lock();
        if let Some(existing) = waiters.get(&msg_id) {
            tracing::warn!(msg_id, "[tether] ack callback already set");
            return existing.clone();
        }
        let token = CancellationToken::new();
        waiters.insert(msg_id, token.clone());
        token
    }

    pub(crate) fn remove(&self, msg_id: i64) {
        self.lock().remove(&msg_id);
    }

    /// Fire and forget the waiters for `ids`.
    pub(crate) fn notify(&self, ids: &[i64]) {
        let mut waiters = self.lock();
        for &id in ids {
            match waiters.remove(&id) {
                Some(token) => token.cancel(),
                None => tracing::debug!(ack_id = id, "[tether] ack callback is not set"),
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}
