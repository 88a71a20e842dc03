//! Sealing and sending outbound messages.

use tether_mtproto::{Dialer, EncryptedMessage, Transport};
use tether_rpc::InvocationError;
use tether_tl::Serializable;

use crate::ConnInner;

impl<D: Dialer> ConnInner<D> {
    /// Encrypt `body` under the current session and send it.
    pub(crate) async fn write_message(&self, msg_id: i64, seq_no: i32, body: &[u8]) -> Result<(), InvocationError> {
        let _shared = self.exchange_lock.read().await;

        let session = self.session();
        let key = session.auth_key.ok_or(InvocationError::NotConnected)?;
        let msg = EncryptedMessage {
            salt: session.salt,
            session_id: session.id,
            msg_id,
            seq_no,
            body: body.to_vec(),
        };
        let frame = self.opts.cipher.encrypt(&key, &msg)?;
        self.transport()?.send(&frame).await?;
        Ok(())
    }

    /// Send `body` as a service message: even `seq_no`, no result slot.
    pub(crate) async fn write_service_message(&self, body: &impl Serializable) -> Result<(), InvocationError> {
        let (msg_id, seq_no) = self.next_msg_seq(false);
        self.write_message(msg_id, seq_no, &body.to_bytes()).await
    }
}
