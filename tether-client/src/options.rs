//! Connection configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tether_crypto::AuthKey;
use tether_mtproto::{Cipher, Clock, Mtproto2Cipher, PublicKey, SystemClock};

use crate::handler::{Handler, NoopHandler};

/// Everything [`Conn::new`](crate::Conn::new) needs besides the dialer
/// and the key exchanger.
///
/// Start from [`Options::default`] and override what you need:
///
/// ```rust
/// use std::time::Duration;
/// use tether_client::Options;
///
/// let opts = Options {
///     ping_interval:      Duration::from_secs(30),
///     compress_threshold: 512,
///     ..Default::default()
/// };
/// assert_eq!(opts.ack_batch_size, 20);
/// ```
#[derive(Clone)]
pub struct Options {
    /// Datacenter id, only used to tag log output. Default: 2.
    pub dc_id: i32,
    /// Server keys offered to the key exchange.
    pub public_keys: Vec<PublicKey>,

    /// A stored auth key. When `None`, `run` performs a key exchange.
    pub auth_key:   Option<AuthKey>,
    /// A stored session id; `0` picks a fresh random one.
    pub session_id: i64,
    /// The last known server salt.
    pub salt:       i64,

    /// Bound on opening the transport. Default: 35 s.
    pub dial_timeout:     Duration,
    /// Bound on the whole key exchange. Default: 60 s.
    pub exchange_timeout: Duration,

    /// How often buffered acks are flushed. Default: 15 s.
    pub ack_interval:   Duration,
    /// Flush acks as soon as this many are buffered. Default: 20.
    pub ack_batch_size: usize,

    /// See [`tether_rpc::Options::retry_interval`]. Default: 10 s.
    pub retry_interval: Duration,
    /// See [`tether_rpc::Options::max_retries`]. Default: 5.
    pub max_retries:    u32,
    /// See [`tether_rpc::Options::drain_timeout`]. Default: 10 s.
    pub drain_timeout:  Duration,

    /// Keepalive period. Default: 60 s.
    pub ping_interval: Duration,
    /// How long a keepalive waits for its pong. Default: 15 s.
    pub ping_timeout:  Duration,

    /// How often future salts are requested. Default: 1 h.
    pub salt_fetch_interval: Duration,

    /// Request bodies longer than this are sent gzip-packed; `0` turns
    /// compression off. Default: 0.
    pub compress_threshold: usize,
    /// Bound on drop and salt requests. Default: 15 s.
    pub request_timeout:    Duration,

    pub clock:   Arc<dyn Clock>,
    pub cipher:  Arc<dyn Cipher>,
    /// Receives updates and session notifications.
    pub handler: Arc<dyn Handler>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            dc_id:               2,
            public_keys:         Vec::new(),
            auth_key:            None,
            session_id:          0,
            salt:                0,
            dial_timeout:        Duration::from_secs(35),
            exchange_timeout:    Duration::from_secs(60),
            ack_interval:        Duration::from_secs(15),
            ack_batch_size:      20,
            retry_interval:      Duration::from_secs(10),
            max_retries:         5,
            drain_timeout:       Duration::from_secs(10),
            ping_interval:       Duration::from_secs(60),
            ping_timeout:        Duration::from_secs(15),
            salt_fetch_interval: Duration::from_secs(60 * 60),
            compress_threshold:  0,
            request_timeout:     Duration::from_secs(15),
            clock:               Arc::new(SystemClock),
            cipher:              Arc::new(Mtproto2Cipher::client()),
            handler:             Arc::new(NoopHandler),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("dc_id", &self.dc_id)
            .field("public_keys", &self.public_keys.len())
            .field("auth_key", &self.auth_key)
            .field("session_id", &self.session_id)
            .field("dial_timeout", &self.dial_timeout)
            .field("exchange_timeout", &self.exchange_timeout)
            .field("ack_interval", &self.ack_interval)
            .field("ack_batch_size", &self.ack_batch_size)
            .field("retry_interval", &self.retry_interval)
            .field("max_retries", &self.max_retries)
            .field("ping_interval", &self.ping_interval)
            .field("ping_timeout", &self.ping_timeout)
            .field("salt_fetch_interval", &self.salt_fetch_interval)
            .field("compress_threshold", &self.compress_threshold)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}
