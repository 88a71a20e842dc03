//! Pluggable transport layer.
//!
//! The session engine only ever moves whole frames; implement [`Transport`]
//! over TCP, WebSocket, or an in-memory pipe and the framing underneath is
//! up to you.

use std::future::Future;
use std::io;

/// A full-duplex, frame-oriented transport.
///
/// Methods take `&self` so that one task can block in [`recv`](Self::recv)
/// while others [`send`](Self::send). [`close`](Self::close) must be
/// idempotent and must wake a pending `recv` with an error.
pub trait Transport: Send + Sync + 'static {
    /// Send one complete frame.
    fn send(&self, frame: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Receive the next complete frame.
    fn recv(&self) -> impl Future<Output = io::Result<Vec<u8>>> + Send;

    /// Tear the connection down.
    fn close(&self) -> impl Future<Output = io::Result<()>> + Send;
}

/// Opens new transports to a fixed endpoint.
pub trait Dialer: Send + Sync + 'static {
    type Transport: Transport;

    fn dial(&self) -> impl Future<Output = io::Result<Self::Transport>> + Send;
}
