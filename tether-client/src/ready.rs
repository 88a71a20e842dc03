//! One-shot readiness gate.

use tokio::sync::watch;

/// Opens once, when the server confirms the session; stays open.
#[derive(Debug)]
pub(crate) struct Ready {
    tx: watch::Sender<bool>,
}

impl Default for Ready {
    fn default() -> Self {
        Self { tx: watch::Sender::new(false) }
    }
}

impl Ready {
    pub(crate) fn signal(&self) {
        self.tx.send_replace(true);
    }

    pub(crate) fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    pub(crate) async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}
