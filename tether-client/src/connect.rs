//! Opening the transport and establishing the session.

use tokio::time::timeout;

use tether_mtproto::{Dialer, ExchangeError, Transport, random_session_id};
use tether_rpc::InvocationError;

use crate::ConnInner;

impl<D: Dialer> ConnInner<D> {
    /// Dial, then make sure the session has a key and an id.
    ///
    /// The transport is closed again if anything after the dial fails.
    pub(crate) async fn connect(&self) -> Result<(), InvocationError> {
        let transport = timeout(self.opts.dial_timeout, self.dialer.dial())
            .await
            .map_err(|_| InvocationError::Timeout("dial"))??;
        tracing::debug!("[tether] transport open");

        if let Err(e) = self.establish(&transport).await {
            if let Err(close_err) = transport.close().await {
                tracing::warn!("[tether] failed to close transport: {close_err}");
            }
            return Err(e);
        }

        if self.transport.set(transport).is_err() {
            return Err(InvocationError::AlreadyRan);
        }
        Ok(())
    }

    async fn establish(&self, transport: &D::Transport) -> Result<(), InvocationError> {
        if !self.session().has_key() {
            return self.exchange(transport).await;
        }

        if self.session().id == 0 {
            let id = random_session_id().map_err(|e| std::io::Error::other(e.to_string()))?;
            self.session.write().unwrap_or_else(|e| e.into_inner()).id = id;
            self.sequencer.lock().unwrap_or_else(|e| e.into_inner()).reset();
            tracing::debug!(session_id = id, "[tether] generated session id");
        }
        Ok(())
    }

    async fn exchange(&self, transport: &D::Transport) -> Result<(), InvocationError> {
        let _exclusive = self.exchange_lock.write().await;
        tracing::info!("[tether] no auth key, starting key exchange");

        let res = timeout(self.opts.exchange_timeout, self.exchanger.client(transport, &self.opts.public_keys))
            .await
            .map_err(|_| ExchangeError::Timeout)??;

        *self.session.write().unwrap_or_else(|e| e.into_inner()) =
            tether_mtproto::Session::new(Some(res.auth_key), res.session_id, res.server_salt);
        self.sequencer.lock().unwrap_or_else(|e| e.into_inner()).reset();
        tracing::info!(session_id = res.session_id, "[tether] key exchange complete");
        Ok(())
    }
}
