//! The request/response correlation engine.
//!
//! Every request goes through [`Engine::do_request`]: its result slot and
//! ack waiter are registered, the body is handed to the injected send
//! function, and the call then waits for whichever comes first:
//!
//! * a result or error delivered by the reader ([`Engine::notify_result`],
//!   [`Engine::notify_error`]);
//! * an ack ([`Engine::notify_acks`]), which stops the retry timer;
//! * the retry timer, which re-sends the identical `(msg_id, seq_no, body)`;
//! * cancellation by the caller, which triggers the drop handler;
//! * engine shutdown.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

pub use tether_mtproto::exchange::BoxFuture;

use crate::ack::AckWaiters;
use crate::errors::InvocationError;
use crate::options::Options;

/// One outgoing content message.
///
/// The body is shared so that re-sends reuse the exact bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub msg_id: i64,
    pub seq_no: i32,
    pub body:   Arc<[u8]>,
}

/// Writes a request to the wire.
pub type SendFn = Arc<dyn Fn(Request) -> BoxFuture<'static, Result<(), InvocationError>> + Send + Sync>;

/// Tells the server a request is no longer wanted.
pub type DropHandler = Arc<dyn Fn(Request) -> BoxFuture<'static, Result<(), InvocationError>> + Send + Sync>;

type Outcome = Result<Vec<u8>, InvocationError>;

/// Tracks in-flight requests and resolves them as replies arrive.
pub struct Engine {
    send:    SendFn,
    opts:    Options,
    pending: Mutex<HashMap<i64, oneshot::Sender<Outcome>>>,
    acks:    AckWaiters,
    closed:  CancellationToken,
    tracker: TaskTracker,
}

/// Removes a request's registrations however `do_request` exits.
struct Registration<'a> {
    engine: &'a Engine,
    msg_id: i64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.engine.lock_pending().remove(&self.msg_id);
        self.engine.acks.remove(self.msg_id);
    }
}

impl Engine {
    pub fn new(send: SendFn, opts: Options) -> Self {
        Self {
            send,
            opts,
            pending: Mutex::new(HashMap::new()),
            acks:    AckWaiters::default(),
            closed:  CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<i64, oneshot::Sender<Outcome>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_closing(&self) -> bool {
        self.tracker.is_closed() || self.closed.is_cancelled()
    }

    /// Send `req` and wait for its result.
    ///
    /// Returns the raw result payload, the server's error, or one of
    /// [`Cancelled`](InvocationError::Cancelled),
    /// [`RetriesExhausted`](InvocationError::RetriesExhausted) and
    /// [`EngineClosed`](InvocationError::EngineClosed). A failing send
    /// function is reported as is.
    pub async fn do_request(&self, cancel: &CancellationToken, req: Request) -> Result<Vec<u8>, InvocationError> {
        if self.is_closing() {
            return Err(InvocationError::EngineClosed);
        }
        let _in_flight = self.tracker.token();
        let msg_id = req.msg_id;

        let (tx, mut rx) = oneshot::channel();
        if self.lock_pending().insert(msg_id, tx).is_some() {
            tracing::warn!(msg_id, "[tether] replaced an existing result handler");
        }
        let ack = self.acks.register(msg_id);
        let _registration = Registration { engine: self, msg_id };

        (self.send)(req.clone()).await?;

        let retry = sleep(self.opts.retry_interval);
        tokio::pin!(retry);
        let mut acked = false;
        let mut retries = 0u32;

        loop {
            tokio::select! {
                biased;

                outcome = &mut rx => {
                    return outcome.unwrap_or(Err(InvocationError::EngineClosed));
                }
                _ = self.closed.cancelled() => {
                    return Err(InvocationError::EngineClosed);
                }
                _ = cancel.cancelled() => {
                    tracing::debug!(msg_id, "[tether] request cancelled, dropping");
                    if let Err(e) = (self.opts.drop_handler)(req).await {
                        tracing::warn!(msg_id, "[tether] drop handler failed: {e}");
                    }
                    return Err(InvocationError::Cancelled);
                }
                _ = ack.cancelled(), if !acked => {
                    tracing::debug!(msg_id, "[tether] acknowledged");
                    acked = true;
                }
                _ = &mut retry, if !acked => {
                    if retries >= self.opts.max_retries {
                        tracing::warn!(msg_id, retries, "[tether] retry limit reached");
                        return Err(InvocationError::RetriesExhausted { retries });
                    }
                    retries += 1;
                    tracing::debug!(msg_id, retries, "[tether] ack timed out, re-sending");
                    (self.send)(req.clone()).await?;
                    retry.as_mut().reset(Instant::now() + self.opts.retry_interval);
                }
            }
        }
    }

    fn resolve(&self, msg_id: i64, outcome: Outcome) {
        let slot = self.lock_pending().remove(&msg_id);
        match slot {
            Some(tx) => {
                // The waiter may have just given up; nothing to do then.
                let _ = tx.send(outcome);
            }
            None => tracing::debug!(msg_id, "[tether] result callback is not set"),
        }
    }

    /// Deliver a result payload for `msg_id`.
    pub fn notify_result(&self, msg_id: i64, payload: Vec<u8>) {
        self.resolve(msg_id, Ok(payload));
    }

    /// Deliver an error for `msg_id`.
    pub fn notify_error(&self, msg_id: i64, err: InvocationError) {
        tracing::debug!(msg_id, "[tether] got error: {err}");
        self.resolve(msg_id, Err(err));
    }

    /// Mark `ids` as acknowledged by the server.
    pub fn notify_acks(&self, ids: &[i64]) {
        self.acks.notify(ids);
    }

    /// Number of requests waiting for a result.
    pub fn pending(&self) -> usize {
        self.lock_pending().len()
    }

    /// Stop admitting requests, wait up to the drain timeout for the ones
    /// in flight, then [`force_close`](Self::force_close).
    pub async fn close(&self) {
        self.tracker.close();
        let pending = self.pending();
        tracing::debug!(pending, "[tether] closing engine, waiting for requests");
        if tokio::time::timeout(self.opts.drain_timeout, self.tracker.wait()).await.is_err() {
            tracing::warn!(pending = self.pending(), "[tether] drain timed out");
        }
        self.force_close();
    }

    /// Resolve every pending request with
    /// [`EngineClosed`](InvocationError::EngineClosed) right away.
    pub fn force_close(&self) {
        self.tracker.close();
        if !self.closed.is_cancelled() {
            tracing::debug!(pending = self.pending(), "[tether] engine force-closed");
        }
        self.closed.cancel();
    }

    /// Whether [`force_close`](Self::force_close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}
