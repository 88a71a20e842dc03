//! Engine configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::{BoxFuture, DropHandler, Request};
use crate::errors::InvocationError;

/// Tuning knobs for [`Engine`](crate::Engine).
///
/// ```rust
/// use std::time::Duration;
/// use tether_rpc::Options;
///
/// let opts = Options { max_retries: 2, ..Default::default() };
/// assert_eq!(opts.retry_interval, Duration::from_secs(10));
/// ```
#[derive(Clone)]
pub struct Options {
    /// How long to wait for an ack before re-sending. Default: 10 s.
    pub retry_interval: Duration,
    /// How many times a request may be re-sent. Default: 5.
    pub max_retries:    u32,
    /// How long [`close`](crate::Engine::close) waits for in-flight
    /// requests before forcing them closed. Default: 10 s.
    pub drain_timeout:  Duration,
    /// Called with a request the caller cancelled, so the server can be
    /// told to drop it. Default: does nothing.
    pub drop_handler:   DropHandler,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(10),
            max_retries:    5,
            drain_timeout:  Duration::from_secs(10),
            drop_handler:   Arc::new(|_: Request| -> BoxFuture<'static, Result<(), InvocationError>> {
                Box::pin(async { Ok(()) })
            }),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("retry_interval", &self.retry_interval)
            .field("max_retries", &self.max_retries)
            .field("drain_timeout", &self.drain_timeout)
            .finish_non_exhaustive()
    }
}
