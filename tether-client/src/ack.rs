//! Outbound acknowledgement batching.

use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;

use tether_mtproto::Dialer;
use tether_rpc::InvocationError;
use tether_tl::types;

use crate::ConnInner;

impl<D: Dialer> ConnInner<D> {
    /// Queue `msg_id` for acknowledgement.
    pub(crate) fn queue_ack(&self, msg_id: i64) {
        if self.ack_tx.send(msg_id).is_err() {
            tracing::debug!(msg_id, "[tether] ack loop is gone");
        }
    }

    /// Collect ids from the read loop and send them as `msgs_ack`, either
    /// every `ack_interval` or as soon as a full batch is buffered.
    pub(crate) async fn ack_loop(&self, token: CancellationToken) -> Result<(), InvocationError> {
        let mut rx = self
            .ack_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or(InvocationError::AlreadyRan)?;

        let period = self.opts.ack_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        let mut buf: Vec<i64> = Vec::with_capacity(self.opts.ack_batch_size);

        loop {
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                _ = ticker.tick() => {
                    if buf.is_empty() {
                        continue;
                    }
                    self.flush_acks(&mut buf).await;
                }
                id = rx.recv() => {
                    let Some(id) = id else { return Ok(()) };
                    buf.push(id);
                    if buf.len() >= self.opts.ack_batch_size {
                        self.flush_acks(&mut buf).await;
                        ticker.reset();
                    }
                }
            }
        }
    }

    async fn flush_acks(&self, buf: &mut Vec<i64>) {
        let ack = types::MsgsAck { msg_ids: std::mem::take(buf) };
        tracing::debug!(count = ack.msg_ids.len(), "[tether] sending acks");
        if let Err(e) = self.write_service_message(&ack).await {
            tracing::error!(count = ack.msg_ids.len(), "[tether] failed to send acks: {e}");
        }
    }
}
