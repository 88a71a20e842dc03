//! Keepalive.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{Instant, interval_at, timeout};
use tokio_util::sync::CancellationToken;

use tether_mtproto::Dialer;
use tether_rpc::InvocationError;
use tether_tl::{Serializable, functions, types};

use crate::{ConnInner, random_i64};

/// Forgets a ping waiter however the ping ends.
struct PingSlot<'a, D: Dialer> {
    conn:    &'a ConnInner<D>,
    ping_id: i64,
}

impl<D: Dialer> Drop for PingSlot<'_, D> {
    fn drop(&mut self) {
        self.conn.lock_pings().remove(&self.ping_id);
    }
}

impl<D: Dialer> ConnInner<D> {
    /// Send `body` (carrying `ping_id`) and wait for the matching pong.
    async fn ping_with(&self, ping_id: i64, body: &impl Serializable) -> Result<(), InvocationError> {
        let (tx, rx) = oneshot::channel();
        self.lock_pings().insert(ping_id, tx);
        let _slot = PingSlot { conn: self, ping_id };
        if self.engine.is_closed() {
            return Err(InvocationError::EngineClosed);
        }

        self.write_service_message(body).await?;
        rx.await.map_err(|_| {
            if self.engine.is_closed() { InvocationError::EngineClosed } else { InvocationError::PongMissed }
        })
    }

    pub(crate) async fn ping(&self, cancel: &CancellationToken) -> Result<(), InvocationError> {
        let ping_id = random_i64()?;
        let body = functions::Ping { ping_id };
        tokio::select! {
            _ = cancel.cancelled() => Err(InvocationError::Cancelled),
            res = self.ping_with(ping_id, &body) => res,
        }
    }

    /// Ping and ask the server to drop the connection after `delay`
    /// without another ping.
    async fn ping_delay_disconnect(&self, delay: Duration) -> Result<(), InvocationError> {
        let ping_id = random_i64()?;
        let disconnect_delay = i32::try_from(delay.as_secs()).unwrap_or(i32::MAX);
        let body = functions::PingDelayDisconnect { ping_id, disconnect_delay };
        self.ping_with(ping_id, &body).await
    }

    /// Route a pong to its waiter. Returns `false` if nobody waits for it.
    pub(crate) fn handle_pong(&self, pong: &types::Pong) -> bool {
        match self.lock_pings().remove(&pong.ping_id) {
            Some(tx) => {
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }

    pub(crate) async fn ping_loop(&self, token: CancellationToken) -> Result<(), InvocationError> {
        let period = self.opts.ping_interval;
        let wait = self.opts.ping_timeout;
        let mut ticker = interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                res = timeout(wait, self.ping_delay_disconnect(period + wait)) => match res {
                    Ok(Ok(())) => tracing::trace!("[tether] pong"),
                    Ok(Err(e)) => return Err(e),
                    Err(_) => {
                        tracing::warn!(timeout = ?wait, "[tether] no pong");
                        return Err(InvocationError::PongMissed);
                    }
                },
            }
        }
    }
}
