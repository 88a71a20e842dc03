//! Error types for tether-rpc.

use std::{fmt, io};

use tether_mtproto::{DecryptError, ExchangeError};

// ─── RpcError ─────────────────────────────────────────────────────────────────

/// An error returned by the server in response to an RPC call.
///
/// Numeric values are stripped from the name and placed in [`RpcError::value`].
///
/// # Example
/// `FLOOD_WAIT_30` → `RpcError { code: 420, name: "FLOOD_WAIT", value: Some(30) }`
#[derive(Clone, Debug, PartialEq)]
pub struct RpcError {
    /// HTTP-like status code.
    pub code:  i32,
    /// Error name in SCREAMING_SNAKE_CASE with the numeric suffix removed.
    pub name:  String,
    /// Numeric suffix extracted from the name, if any.
    pub value: Option<u32>,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RPC {}: {}", self.code, self.name)?;
        if let Some(v) = self.value {
            write!(f, " (value: {v})")?;
        }
        Ok(())
    }
}

impl std::error::Error for RpcError {}

impl RpcError {
    /// Parse a raw server message like `"FLOOD_WAIT_30"`.
    pub fn from_message(code: i32, message: &str) -> Self {
        if let Some((name, suffix)) = message.rsplit_once('_') {
            if !suffix.is_empty() && suffix.bytes().all(|c| c.is_ascii_digit()) {
                if let Ok(v) = suffix.parse::<u32>() {
                    return Self { code, name: name.to_string(), value: Some(v) };
                }
            }
        }
        Self { code, name: message.to_string(), value: None }
    }

    /// Match on the error name, with optional wildcard prefix/suffix `'*'`.
    ///
    /// # Examples
    /// - `err.is("FLOOD_WAIT")`: exact match
    /// - `err.is("PHONE_CODE_*")`: starts-with match
    /// - `err.is("*_INVALID")`: ends-with match
    pub fn is(&self, pattern: &str) -> bool {
        if let Some(prefix) = pattern.strip_suffix('*') {
            self.name.starts_with(prefix)
        } else if let Some(suffix) = pattern.strip_prefix('*') {
            self.name.ends_with(suffix)
        } else {
            self.name == pattern
        }
    }
}

impl From<tether_tl::types::RpcError> for RpcError {
    fn from(e: tether_tl::types::RpcError) -> Self {
        Self::from_message(e.error_code, &e.error_message)
    }
}

// ─── BadMessageError ──────────────────────────────────────────────────────────

/// The server refused a message we sent (`bad_msg_notification` or
/// `bad_server_salt`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BadMessageError {
    pub code:     i32,
    /// Set for `bad_server_salt`: the salt to use from now on.
    pub new_salt: Option<i64>,
}

impl BadMessageError {
    /// Incorrect server salt.
    pub const BAD_SALT: i32 = 48;

    pub fn is_bad_salt(&self) -> bool { self.code == Self::BAD_SALT }

    /// Human-readable meaning of [`code`](Self::code).
    pub fn description(&self) -> &'static str {
        match self.code {
            16 => "msg_id too low",
            17 => "msg_id too high",
            18 => "incorrect two lower order msg_id bits",
            19 => "container msg_id is the same as msg_id of a previously received message",
            20 => "message too old",
            32 => "msg_seqno too low",
            33 => "msg_seqno too high",
            34 => "an even msg_seqno expected, but odd received",
            35 => "odd msg_seqno expected, but even received",
            48 => "incorrect server salt",
            64 => "invalid container",
            _  => "unknown bad message code",
        }
    }
}

impl fmt::Display for BadMessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bad message ({}): {}", self.code, self.description())
    }
}

impl std::error::Error for BadMessageError {}

// ─── InvocationError ──────────────────────────────────────────────────────────

/// The error type returned from anything that talks to the server.
#[derive(Debug)]
pub enum InvocationError {
    /// The server rejected the request.
    Rpc(RpcError),
    /// The server rejected the message envelope.
    BadMessage(BadMessageError),
    /// Network / I/O failure.
    Io(io::Error),
    /// Response deserialization failed.
    Deserialize(String),
    /// An inbound frame failed to decrypt.
    Decrypt(DecryptError),
    /// The auth-key handshake failed.
    Exchange(ExchangeError),
    /// A bounded operation ran out of time; names the operation.
    Timeout(&'static str),
    /// No `pong` arrived for a keepalive ping.
    PongMissed,
    /// The caller cancelled the request.
    Cancelled,
    /// The request was re-sent the maximum number of times without an ack.
    RetriesExhausted { retries: u32 },
    /// The engine shut down before the request was resolved.
    EngineClosed,
    /// The connection has not been established yet.
    NotConnected,
    /// `run` was called a second time.
    AlreadyRan,
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rpc(e)                       => write!(f, "{e}"),
            Self::BadMessage(e)                => write!(f, "{e}"),
            Self::Io(e)                        => write!(f, "I/O error: {e}"),
            Self::Deserialize(s)               => write!(f, "deserialize error: {s}"),
            Self::Decrypt(e)                   => write!(f, "decrypt error: {e}"),
            Self::Exchange(e)                  => write!(f, "{e}"),
            Self::Timeout(op)                  => write!(f, "{op} timed out"),
            Self::PongMissed                   => write!(f, "no pong received"),
            Self::Cancelled                    => write!(f, "request cancelled"),
            Self::RetriesExhausted { retries } => write!(f, "retry limit reached after {retries} attempts"),
            Self::EngineClosed                 => write!(f, "engine was closed"),
            Self::NotConnected                 => write!(f, "not connected"),
            Self::AlreadyRan                   => write!(f, "connection already ran"),
        }
    }
}

impl std::error::Error for InvocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Rpc(e)        => Some(e),
            Self::BadMessage(e) => Some(e),
            Self::Io(e)         => Some(e),
            Self::Decrypt(e)    => Some(e),
            Self::Exchange(e)   => Some(e),
            _                   => None,
        }
    }
}

impl From<io::Error> for InvocationError {
    fn from(e: io::Error) -> Self { Self::Io(e) }
}

impl From<tether_tl::deserialize::Error> for InvocationError {
    fn from(e: tether_tl::deserialize::Error) -> Self { Self::Deserialize(e.to_string()) }
}

impl From<RpcError> for InvocationError {
    fn from(e: RpcError) -> Self { Self::Rpc(e) }
}

impl From<BadMessageError> for InvocationError {
    fn from(e: BadMessageError) -> Self { Self::BadMessage(e) }
}

impl From<DecryptError> for InvocationError {
    fn from(e: DecryptError) -> Self { Self::Decrypt(e) }
}

impl From<ExchangeError> for InvocationError {
    fn from(e: ExchangeError) -> Self { Self::Exchange(e) }
}

impl InvocationError {
    /// Returns `true` if this is the named RPC error (supports `'*'` wildcards).
    pub fn is(&self, pattern: &str) -> bool {
        match self {
            Self::Rpc(e) => e.is(pattern),
            _            => false,
        }
    }

    /// The bad-message details, if the server refused the envelope.
    pub fn bad_message(&self) -> Option<&BadMessageError> {
        match self {
            Self::BadMessage(e) => Some(e),
            _                   => None,
        }
    }
}
