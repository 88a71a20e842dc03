//! RPC correlation for the tether session engine.
//!
//! [`Engine`] owns every in-flight request from the moment it is sent until
//! it resolves. It does not know how bytes reach the server: the session
//! layer injects a [`SendFn`] that encrypts and writes, and feeds replies
//! back through [`Engine::notify_result`], [`Engine::notify_error`] and
//! [`Engine::notify_acks`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tether_rpc::{BoxFuture, Engine, InvocationError, Options, Request, SendFn};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), InvocationError> {
//! let send: SendFn = Arc::new(|req: Request| -> BoxFuture<'static, Result<(), InvocationError>> {
//!     Box::pin(async move {
//!         println!("writing {} bytes as {:#x}", req.body.len(), req.msg_id);
//!         Ok(())
//!     })
//! });
//! let engine = Engine::new(send, Options::default());
//! let body: Arc<[u8]> = Arc::from(&[0u8; 4][..]);
//! let reply = engine
//!     .do_request(&CancellationToken::new(), Request { msg_id: 4, seq_no: 1, body })
//!     .await?;
//! # drop(reply); Ok(()) }
//! ```

#![deny(unsafe_code)]

mod ack;
mod engine;
mod errors;
mod options;

pub use engine::{BoxFuture, DropHandler, Engine, Request, SendFn};
pub use errors::{BadMessageError, InvocationError, RpcError};
pub use options::Options;
