//! Routing of decrypted message bodies.

use std::time::{Duration, SystemTime};

use tether_mtproto::{Dialer, MessageId};
use tether_rpc::{BadMessageError, InvocationError, RpcError};
use tether_tl::{RpcAnswer, Serializable, ServiceMessage, types};

use crate::ConnInner;

/// A session created this far in the past means the local clock is behind.
const SKEW_PAST: Duration = Duration::from_secs(300);
/// A session created this far in the future means the local clock is ahead.
const SKEW_FUTURE: Duration = Duration::from_secs(30);

/// Whether a session the server says it created at `created` points at a
/// badly set local clock.
pub(crate) fn clock_skewed(created: SystemTime, now: SystemTime) -> bool {
    match created.duration_since(now) {
        Ok(ahead) => ahead > SKEW_FUTURE,
        Err(behind) => behind.duration() > SKEW_PAST,
    }
}

fn rfc3339(t: SystemTime) -> String {
    chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339()
}

impl<D: Dialer> ConnInner<D> {
    /// Route one message body. Errors here are fatal to the read loop.
    pub(crate) fn handle_message(&self, msg_id: i64, body: &[u8]) -> Result<(), InvocationError> {
        match ServiceMessage::decode(body)? {
            ServiceMessage::RpcResult(res) => self.handle_result(res)?,
            ServiceMessage::MsgsAck(ack) => {
                tracing::trace!(count = ack.msg_ids.len(), "[tether] received acks");
                self.engine.notify_acks(&ack.msg_ids);
            }
            ServiceMessage::NewSessionCreated(created) => self.handle_session_created(created),
            ServiceMessage::BadMsgNotification(bad) => {
                let err = BadMessageError { code: bad.error_code, new_salt: None };
                tracing::debug!(msg_id = bad.bad_msg_id, "[tether] {err}");
                self.engine.notify_error(bad.bad_msg_id, err.into());
            }
            ServiceMessage::BadServerSalt(bad) => {
                self.store_salt(bad.new_server_salt);
                self.salts.reset();
                let err = BadMessageError { code: bad.error_code, new_salt: Some(bad.new_server_salt) };
                self.engine.notify_error(bad.bad_msg_id, err.into());
            }
            ServiceMessage::FutureSalts(salts) => {
                tracing::debug!(count = salts.salts.0.len(), "[tether] received future salts");
                self.salts.store(salts.salts.0);
                self.update_salt();
            }
            ServiceMessage::Container(container) => {
                for inner in container.messages.0 {
                    self.handle_message(inner.msg_id, &inner.body)?;
                    if inner.seq_no & 1 != 0 {
                        self.queue_ack(inner.msg_id);
                    }
                }
            }
            ServiceMessage::GzipPacked(packed) => {
                let unpacked = packed.decompress()?;
                self.handle_message(msg_id, &unpacked)?;
            }
            ServiceMessage::Pong(pong) => {
                if !self.handle_pong(&pong) {
                    tracing::debug!(ping_id = pong.ping_id, "[tether] pong without a waiter");
                }
            }
            ServiceMessage::DetailedInfo => {}
            ServiceMessage::Other(type_id) => {
                tracing::trace!(msg_id, type_id, "[tether] handing message over");
                if let Err(e) = self.opts.handler.on_message(msg_id, body) {
                    tracing::warn!(msg_id, "[tether] message handler failed: {e}");
                }
            }
        }
        Ok(())
    }

    fn handle_result(&self, res: types::RpcResult) -> Result<(), InvocationError> {
        let req_msg_id = res.req_msg_id;
        match res.answer()? {
            RpcAnswer::Error(e) => self.engine.notify_error(req_msg_id, RpcError::from(e).into()),
            RpcAnswer::Pong(pong) => {
                if !self.handle_pong(&pong) {
                    self.engine.notify_result(req_msg_id, pong.to_bytes());
                }
            }
            RpcAnswer::Payload(payload) => self.engine.notify_result(req_msg_id, payload),
        }
        Ok(())
    }

    fn handle_session_created(&self, created: types::NewSessionCreated) {
        let first = MessageId(created.first_msg_id).time();
        let now = self.opts.clock.now();
        tracing::debug!(unique_id = created.unique_id, first_msg_time = %rfc3339(first), "[tether] session created");
        if clock_skewed(first, now) {
            tracing::warn!(
                first_msg_time = %rfc3339(first),
                local_time = %rfc3339(now),
                "[tether] local clock needs synchronization"
            );
        }

        self.store_salt(created.server_salt);
        self.ready.signal();
        let session = self.session();
        if let Err(e) = self.opts.handler.on_session(&session) {
            tracing::warn!("[tether] session handler failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tether_crypto::AuthKey;
    use tether_mtproto::exchange::BoxFuture;
    use tether_mtproto::{ExchangeError, ExchangeResult, KeyExchange, MessageType, PublicKey, Session};
    use tether_tl::Serializable;

    use super::*;
    use crate::transport::{MemoryDialer, MemoryTransport};
    use crate::{Conn, Handler, Options};

    struct NoExchange;

    impl KeyExchange<MemoryTransport> for NoExchange {
        fn client<'a>(&'a self, _: &'a MemoryTransport, _: &'a [PublicKey]) -> BoxFuture<'a, Result<ExchangeResult, ExchangeError>> {
            Box::pin(async { Err(ExchangeError::Malformed("unused".into())) })
        }
    }

    #[derive(Default)]
    struct Recorder {
        sessions: Mutex<Vec<Session>>,
        messages: Mutex<Vec<i64>>,
    }

    impl Handler for Recorder {
        fn on_message(&self, msg_id: i64, _: &[u8]) -> Result<(), InvocationError> {
            self.messages.lock().unwrap().push(msg_id);
            Ok(())
        }

        fn on_session(&self, session: &Session) -> Result<(), InvocationError> {
            self.sessions.lock().unwrap().push(session.clone());
            Err(InvocationError::NotConnected)
        }
    }

    fn conn(handler: Arc<Recorder>) -> Conn<MemoryDialer> {
        let (end, _) = MemoryTransport::pair();
        let opts = Options {
            auth_key: Some(AuthKey::from_bytes([7; 256])),
            session_id: 11,
            handler,
            ..Default::default()
        };
        Conn::new(MemoryDialer::new(end), Arc::new(NoExchange), opts)
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> { Ok(()) }
    }

    fn captured_logs(f: impl FnOnce()) -> String {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = out.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn skew_thresholds() {
        let now = SystemTime::now();
        assert!(!clock_skewed(now, now));
        assert!(!clock_skewed(now - Duration::from_secs(299), now));
        assert!(clock_skewed(now - Duration::from_secs(301), now));
        assert!(!clock_skewed(now + Duration::from_secs(29), now));
        assert!(clock_skewed(now + Duration::from_secs(31), now));
    }

    #[test]
    fn stale_session_warns_and_still_applies() {
        let handler = Arc::new(Recorder::default());
        let conn = conn(handler.clone());
        let hour_ago = SystemTime::now() - Duration::from_secs(3600);
        let created = types::NewSessionCreated {
            first_msg_id: MessageId::new(hour_ago, MessageType::Client).0,
            unique_id:    1,
            server_salt:  555,
        };

        let logs = captured_logs(|| conn.inner.handle_message(4, &created.to_bytes()).unwrap());

        assert!(logs.contains("local clock needs synchronization"), "logs: {logs}");
        assert!(conn.is_ready());
        assert_eq!(conn.session().salt, 555);
        assert_eq!(handler.sessions.lock().unwrap().len(), 1);
    }

    #[test]
    fn fresh_session_does_not_warn_about_clock() {
        let conn = conn(Arc::new(Recorder::default()));
        let created = types::NewSessionCreated {
            first_msg_id: MessageId::new(SystemTime::now(), MessageType::Client).0,
            unique_id:    1,
            server_salt:  1,
        };
        let logs = captured_logs(|| conn.inner.handle_message(4, &created.to_bytes()).unwrap());
        assert!(!logs.contains("local clock"), "logs: {logs}");
    }

    #[test]
    fn unknown_constructors_reach_the_handler() {
        let handler = Arc::new(Recorder::default());
        let conn = conn(handler.clone());
        let mut body = 0x1234_5678u32.to_le_bytes().to_vec();
        body.extend_from_slice(&[0; 8]);

        conn.inner.handle_message(40, &body).unwrap();
        assert_eq!(*handler.messages.lock().unwrap(), vec![40]);
    }

    #[test]
    fn malformed_service_message_is_an_error() {
        let conn = conn(Arc::new(Recorder::default()));
        let truncated = &types::MsgsAck { msg_ids: vec![1, 2] }.to_bytes()[..10];
        assert!(conn.inner.handle_message(4, truncated).is_err());
    }

    #[test]
    fn bad_server_salt_replaces_salt() {
        let conn = conn(Arc::new(Recorder::default()));
        let bad = types::BadServerSalt { bad_msg_id: 8, bad_msg_seqno: 1, error_code: 48, new_server_salt: 99 };
        conn.inner.handle_message(4, &bad.to_bytes()).unwrap();
        assert_eq!(conn.session().salt, 99);
    }
}
