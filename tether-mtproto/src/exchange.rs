//! Interface to the auth-key handshake.
//!
//! The Diffie-Hellman steps themselves are not part of this workspace; a
//! [`KeyExchange`] implementation is injected into the connection and run
//! over a freshly dialed transport whenever no auth key is available.

use std::future::Future;
use std::io;
use std::pin::Pin;

use tether_crypto::AuthKey;

use crate::transport::Transport;

/// Boxed future returned by [`KeyExchange`], so the trait stays object safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A server RSA key the client may encrypt the handshake to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    /// Lower 64 bits of `SHA-1(n, e)`, as the server announces it.
    pub fingerprint: i64,
    /// Big-endian modulus.
    pub n: Vec<u8>,
    /// Big-endian exponent.
    pub e: Vec<u8>,
}

/// What a successful client-side exchange yields.
#[derive(Clone, Debug, PartialEq)]
pub struct ExchangeResult {
    pub auth_key:    AuthKey,
    pub session_id:  i64,
    pub server_salt: i64,
}

/// What a successful server-side exchange yields.
///
/// The connection never builds one; it is the key material a server (or a
/// test double standing in for one) encrypts its replies with.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerExchangeResult {
    pub auth_key:    AuthKey,
    pub server_salt: i64,
}

/// Why a key exchange failed.
#[derive(Debug)]
pub enum ExchangeError {
    /// The handshake did not finish within the allotted time.
    Timeout,
    /// None of the server's fingerprints match a known public key.
    UnknownFingerprint,
    /// The peer sent something that does not parse or does not verify.
    Malformed(String),
    Io(io::Error),
}

impl ExchangeError {
    /// Whether retrying the same exchange can never succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::UnknownFingerprint)
    }
}

impl std::fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "key exchange timed out"),
            Self::UnknownFingerprint => write!(f, "no known public key matches the server fingerprints"),
            Self::Malformed(m) => write!(f, "malformed key exchange message: {m}"),
            Self::Io(e) => write!(f, "key exchange I/O: {e}"),
        }
    }
}

impl std::error::Error for ExchangeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ExchangeError {
    fn from(e: io::Error) -> Self { Self::Io(e) }
}

/// Runs the client side of the handshake over `transport`.
pub trait KeyExchange<T: Transport>: Send + Sync {
    fn client<'a>(
        &'a self,
        transport: &'a T,
        public_keys: &'a [PublicKey],
    ) -> BoxFuture<'a, Result<ExchangeResult, ExchangeError>>;
}
