//! Application hooks.

use tether_mtproto::Session;
use tether_rpc::InvocationError;

/// Receives what the connection does not consume itself.
///
/// Both methods run on the read loop, so they should hand work off rather
/// than block. Returned errors are logged and do not end the session.
pub trait Handler: Send + Sync {
    /// A message that is neither a reply nor a service notification,
    /// usually an update.
    fn on_message(&self, msg_id: i64, body: &[u8]) -> Result<(), InvocationError> {
        let _ = (msg_id, body);
        Ok(())
    }

    /// The server announced a new session.
    fn on_session(&self, session: &Session) -> Result<(), InvocationError> {
        let _ = session;
        Ok(())
    }
}

/// Ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHandler;

impl Handler for NoopHandler {}
