//! Server salt rotation.

use std::time::Duration;

use tokio::time::{Instant, interval_at, timeout};
use tokio_util::sync::CancellationToken;

use tether_mtproto::Dialer;
use tether_rpc::InvocationError;
use tether_tl::functions;

use crate::ConnInner;

/// A salt must stay valid at least this long to be picked.
const SALT_MARGIN: Duration = Duration::from_secs(5 * 60);

/// How many salts to ask for.
const SALT_BATCH: i32 = 4;

impl<D: Dialer> ConnInner<D> {
    pub(crate) fn store_salt(&self, salt: i64) {
        let mut session = self.session.write().unwrap_or_else(|e| e.into_inner());
        if session.salt != salt {
            tracing::info!(old = session.salt, new = salt, "[tether] salt changed");
            session.salt = salt;
        }
    }

    /// Switch to the first known salt still valid after the margin.
    pub(crate) fn update_salt(&self) {
        let deadline = self.opts.clock.now() + SALT_MARGIN;
        match self.salts.get(deadline) {
            Some(salt) => self.store_salt(salt),
            None => tracing::debug!("[tether] no future salt is valid long enough"),
        }
    }

    async fn request_salts(&self) -> Result<(), InvocationError> {
        let call = functions::GetFutureSalts { num: SALT_BATCH };
        timeout(self.opts.request_timeout, self.write_service_message(&call))
            .await
            .map_err(|_| InvocationError::Timeout("get_future_salts"))?
    }

    /// Once the session is confirmed, request future salts right away and
    /// then every `salt_fetch_interval`. Replies are handled by dispatch.
    pub(crate) async fn salt_loop(&self, token: CancellationToken) -> Result<(), InvocationError> {
        tokio::select! {
            _ = token.cancelled() => return Ok(()),
            _ = self.ready.wait() => {}
        }

        let period = self.opts.salt_fetch_interval;
        let mut ticker = interval_at(Instant::now(), period);
        loop {
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                _ = ticker.tick() => {}
            }
            tracing::debug!("[tether] requesting future salts");
            self.request_salts().await?;
        }
    }
}
