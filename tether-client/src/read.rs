//! The read loop: decrypt, validate, dispatch, ack.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use tether_mtproto::{Dialer, EncryptedMessage, MessageId, MessageIdBuf, Transport};
use tether_rpc::InvocationError;

use crate::ConnInner;

/// Inbound message ids older than this are rejected.
const MAX_PAST: Duration = Duration::from_secs(300);
/// Inbound message ids further ahead than this are rejected.
const MAX_FUTURE: Duration = Duration::from_secs(30);

impl<D: Dialer> ConnInner<D> {
    pub(crate) async fn read_loop(&self, token: CancellationToken) -> Result<(), InvocationError> {
        let transport = self.transport()?;
        let mut seen = MessageIdBuf::default();

        loop {
            let frame = tokio::select! {
                _ = token.cancelled() => return Ok(()),
                res = transport.recv() => match res {
                    Ok(frame) => frame,
                    Err(_) if token.is_cancelled() => return Ok(()),
                    Err(e) => return Err(e.into()),
                },
            };
            self.consume_frame(frame, &mut seen)?;
        }
    }

    fn consume_frame(&self, mut frame: Vec<u8>, seen: &mut MessageIdBuf) -> Result<(), InvocationError> {
        let session = self.session();
        let key = session.auth_key.ok_or(InvocationError::NotConnected)?;
        let msg = self.opts.cipher.decrypt(&key, &mut frame)?;

        if let Err(reason) = self.check(&msg, session.id, seen) {
            tracing::warn!(msg_id = msg.msg_id, reason, "[tether] ignoring message");
            return Ok(());
        }

        self.handle_message(msg.msg_id, &msg.body)?;
        if msg.seq_no & 1 != 0 {
            self.queue_ack(msg.msg_id);
        }
        Ok(())
    }

    /// Reject messages for another session, with a client-side or
    /// out-of-window id, or already seen.
    fn check(&self, msg: &EncryptedMessage, session_id: i64, seen: &mut MessageIdBuf) -> Result<(), &'static str> {
        if msg.session_id != session_id {
            return Err("session id mismatch");
        }
        let id = MessageId(msg.msg_id);
        if !id.kind().is_server() {
            return Err("unexpected message id type");
        }
        if !id.within(self.opts.clock.now(), MAX_PAST, MAX_FUTURE) {
            return Err("message id outside time window");
        }
        if !seen.consume(msg.msg_id) {
            return Err("replayed message id");
        }
        Ok(())
    }
}
