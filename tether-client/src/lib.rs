//! Session manager for the tether MTProto client.
//!
//! [`Conn`] owns one encrypted session over one transport. It opens the
//! transport, runs the key exchange when no auth key is stored, and then
//! drives a group of background tasks:
//!
//! * **read**: decrypt, validate and dispatch every inbound frame;
//! * **ack**: batch acknowledgements for the server's content messages;
//! * **ping**: keep the connection alive, failing on a missed pong;
//! * **salt**: fetch future server salts once the session is confirmed.
//!
//! Requests go through [`Conn::invoke`], which hands them to the
//! [`tether_rpc::Engine`] for retry and correlation.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tether_client::{Conn, Options, transport::TcpDialer};
//! use tether_mtproto::exchange::BoxFuture;
//! use tether_mtproto::{ExchangeError, ExchangeResult, KeyExchange, PublicKey};
//! use tether_tl::functions::Ping;
//! use tokio_util::sync::CancellationToken;
//!
//! # struct Handshake;
//! # impl KeyExchange<tether_client::transport::IntermediateTcp> for Handshake {
//! #     fn client<'a>(&'a self, _: &'a tether_client::transport::IntermediateTcp, _: &'a [PublicKey])
//! #         -> BoxFuture<'a, Result<ExchangeResult, ExchangeError>> { unimplemented!() }
//! # }
//! # async fn demo() -> Result<(), tether_rpc::InvocationError> {
//! let conn = Conn::new(TcpDialer::new("149.154.167.51:443"), Arc::new(Handshake), Options::default());
//!
//! let client = conn.clone();
//! conn.run(CancellationToken::new(), move |cancel| async move {
//!     let pong = client.invoke(&cancel, &Ping { ping_id: 42 }).await?;
//!     println!("pong for {}", pong.ping_id);
//!     Ok(())
//! })
//! .await
//! # }
//! ```

#![deny(unsafe_code)]

mod ack;
mod connect;
mod dispatch;
mod group;
mod handler;
mod options;
mod ping;
mod read;
mod ready;
mod rpc;
mod salt;
pub mod transport;
mod write;

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, RwLock, Weak};

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use tether_mtproto::{Dialer, KeyExchange, Salts, Sequencer, Session, Transport};
use tether_rpc::{BoxFuture, Engine, InvocationError, Request};

use crate::group::TaskGroup;
use crate::ready::Ready;

pub use handler::{Handler, NoopHandler};
pub use options::Options;

// ─── Conn ─────────────────────────────────────────────────────────────────────

/// One MTProto session over one transport.
///
/// Cheap to clone: clones share the same connection. [`run`](Self::run)
/// may be called once per `Conn`.
pub struct Conn<D: Dialer> {
    inner: Arc<ConnInner<D>>,
}

impl<D: Dialer> Clone for Conn<D> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

pub(crate) struct ConnInner<D: Dialer> {
    dialer:    D,
    exchanger: Arc<dyn KeyExchange<D::Transport>>,
    opts:      Options,

    transport: OnceLock<D::Transport>,
    engine:    Engine,

    session:       RwLock<Session>,
    /// Held exclusively while a key exchange runs, shared by every writer.
    exchange_lock: tokio::sync::RwLock<()>,
    sequencer:     Mutex<Sequencer>,
    salts:         Salts,
    ready:         Ready,

    /// `ping_id → waiter` for keepalive pings.
    pings:  Mutex<HashMap<i64, oneshot::Sender<()>>>,
    ack_tx: mpsc::UnboundedSender<i64>,
    ack_rx: Mutex<Option<mpsc::UnboundedReceiver<i64>>>,
    ran:    AtomicBool,
}

impl<D: Dialer> Conn<D> {
    /// Build an unstarted connection.
    ///
    /// `exchanger` only runs when `opts.auth_key` is `None`.
    pub fn new(dialer: D, exchanger: Arc<dyn KeyExchange<D::Transport>>, opts: Options) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<ConnInner<D>>| {
            let engine_opts = tether_rpc::Options {
                retry_interval: opts.retry_interval,
                max_retries:    opts.max_retries,
                drain_timeout:  opts.drain_timeout,
                drop_handler:   drop_handler(weak.clone()),
            };
            let (ack_tx, ack_rx) = mpsc::unbounded_channel();
            ConnInner {
                dialer,
                exchanger,
                transport: OnceLock::new(),
                engine: Engine::new(send_fn(weak.clone()), engine_opts),
                session: RwLock::new(Session::new(opts.auth_key.clone(), opts.session_id, opts.salt)),
                exchange_lock: tokio::sync::RwLock::new(()),
                sequencer: Mutex::new(Sequencer::new()),
                salts: Salts::new(),
                ready: Ready::default(),
                pings: Mutex::new(HashMap::new()),
                ack_tx,
                ack_rx: Mutex::new(Some(ack_rx)),
                ran: AtomicBool::new(false),
                opts,
            }
        });
        Self { inner }
    }

    /// Connect and serve the session until `shutdown` is cancelled, a
    /// background task fails, or `f` returns.
    ///
    /// `f` receives a token that is cancelled when the connection goes
    /// down. Returns the first failure, or `Ok` when the connection ended
    /// because of `shutdown` or because `f` returned `Ok`.
    pub async fn run<F, Fut>(&self, shutdown: CancellationToken, f: F) -> Result<(), InvocationError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), InvocationError>> + Send + 'static,
    {
        if self.inner.ran.swap(true, Ordering::SeqCst) {
            return Err(InvocationError::AlreadyRan);
        }

        let span = tracing::info_span!("conn", dc_id = self.inner.opts.dc_id);
        tokio::select! {
            res = self.inner.connect().instrument(span.clone()) => res?,
            _ = shutdown.cancelled() => return Ok(()),
        }

        let mut group = TaskGroup::new(&shutdown);
        let token = group.token();

        let inner = Arc::clone(&self.inner);
        let t = token.clone();
        group.spawn("read", async move { inner.read_loop(t).await }.instrument(span.clone()));

        let inner = Arc::clone(&self.inner);
        let t = token.clone();
        group.spawn("ack", async move { inner.ack_loop(t).await }.instrument(span.clone()));

        let inner = Arc::clone(&self.inner);
        let t = token.clone();
        group.spawn("ping", async move { inner.ping_loop(t).await }.instrument(span.clone()));

        let inner = Arc::clone(&self.inner);
        let t = token.clone();
        group.spawn("salt", async move { inner.salt_loop(t).await }.instrument(span.clone()));

        let inner = Arc::clone(&self.inner);
        let t = token.clone();
        group.spawn("close", async move { inner.handle_close(t).await }.instrument(span.clone()));

        let t = token.clone();
        group.spawn("user", async move {
            let result = f(t.clone()).await;
            if result.is_ok() {
                t.cancel();
            }
            result
        });

        group.wait().await
    }

    /// Send `request` and decode its result.
    pub async fn invoke<R: tether_tl::RemoteCall>(
        &self,
        cancel: &CancellationToken,
        request: &R,
    ) -> Result<R::Return, InvocationError> {
        let payload = self.inner.invoke_raw(cancel, &request.to_bytes()).await?;
        Ok(<R::Return as tether_tl::Deserializable>::from_bytes(&payload)?)
    }

    /// Send an already serialized request and return the raw result.
    pub async fn invoke_raw(&self, cancel: &CancellationToken, body: &[u8]) -> Result<Vec<u8>, InvocationError> {
        self.inner.invoke_raw(cancel, body).await
    }

    /// Round-trip a `ping` through the server.
    pub async fn ping(&self, cancel: &CancellationToken) -> Result<(), InvocationError> {
        self.inner.ping(cancel).await
    }

    /// A snapshot of the current session.
    pub fn session(&self) -> Session {
        self.inner.session()
    }

    /// Resolve once the server has confirmed the session.
    pub async fn ready(&self) {
        self.inner.ready.wait().await
    }

    /// Whether the server has confirmed the session.
    pub fn is_ready(&self) -> bool {
        self.inner.ready.is_ready()
    }
}

// ─── Engine wiring ────────────────────────────────────────────────────────────

fn send_fn<D: Dialer>(weak: Weak<ConnInner<D>>) -> tether_rpc::SendFn {
    Arc::new(move |req: Request| -> BoxFuture<'static, Result<(), InvocationError>> {
        let weak = weak.clone();
        Box::pin(async move {
            let inner = weak.upgrade().ok_or(InvocationError::EngineClosed)?;
            inner.write_message(req.msg_id, req.seq_no, &req.body).await
        })
    })
}

fn drop_handler<D: Dialer>(weak: Weak<ConnInner<D>>) -> tether_rpc::DropHandler {
    Arc::new(move |req: Request| -> BoxFuture<'static, Result<(), InvocationError>> {
        let weak = weak.clone();
        Box::pin(async move {
            match weak.upgrade() {
                Some(inner) => inner.drop_rpc(req).await,
                None => Ok(()),
            }
        })
    })
}

// ─── Shared state ─────────────────────────────────────────────────────────────

impl<D: Dialer> ConnInner<D> {
    pub(crate) fn session(&self) -> Session {
        self.session.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(crate) fn lock_pings(&self) -> MutexGuard<'_, HashMap<i64, oneshot::Sender<()>>> {
        self.pings.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn transport(&self) -> Result<&D::Transport, InvocationError> {
        self.transport.get().ok_or(InvocationError::NotConnected)
    }

    /// Allocate the next `(msg_id, seq_no)` pair.
    pub(crate) fn next_msg_seq(&self, content: bool) -> (i64, i32) {
        let now = self.opts.clock.now();
        let (id, seq_no) = self.sequencer.lock().unwrap_or_else(|e| e.into_inner()).next(now, content);
        (id.0, seq_no)
    }

    /// Watch for shutdown, then close the engine and the transport.
    async fn handle_close(&self, token: CancellationToken) -> Result<(), InvocationError> {
        token.cancelled().await;
        tracing::debug!("[tether] closing");
        self.engine.force_close();
        // Dropping the senders wakes every ping waiter.
        self.lock_pings().clear();
        if let Ok(transport) = self.transport() {
            if let Err(e) = transport.close().await {
                tracing::warn!("[tether] failed to close transport: {e}");
            }
        }
        Ok(())
    }
}

/// Draw a random 64-bit value.
pub(crate) fn random_i64() -> Result<i64, InvocationError> {
    let mut buf = [0u8; 8];
    getrandom::getrandom(&mut buf).map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(i64::from_le_bytes(buf))
}
