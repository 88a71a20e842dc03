//! TL binary serialization and the MTProto service-message schema.
//!
//! Only the low-level `mtproto.tl` constructors the session engine talks in
//! are defined here; application payloads travel as opaque byte blobs.
//!
//! # Overview
//!
//! | Module        | Contents                                                   |
//! |---------------|------------------------------------------------------------|
//! | [`types`]     | Service-message constructors as `struct`s                  |
//! | [`functions`] | Service calls as `struct`s implementing [`RemoteCall`]     |
//! | [`enums`]     | Boxed types with several constructors                      |
//! | [`service`]   | [`ServiceMessage`]: tag-peeking decoder for inbound bodies |
//!
//! ```rust
//! use tether_tl::{functions, Serializable};
//!
//! let bytes = functions::Ping { ping_id: 1337 }.to_bytes();
//! assert_eq!(&bytes[..4], &0x7abe77ecu32.to_le_bytes());
//! ```

#![deny(unsafe_code)]

#[macro_use]
mod macros;

pub mod deserialize;
pub mod enums;
pub mod functions;
pub mod serialize;
pub mod service;
pub mod types;

pub use deserialize::{Cursor, Deserializable, peek_id};
pub use serialize::Serializable;
pub use service::{RpcAnswer, ServiceMessage};

/// Bare `vector` (lowercase), as opposed to the boxed `Vector`.
///
/// MTProto uses it for `future_salts` and message containers, which carry a
/// length-prefixed list without the usual `0x1cb5c415` constructor ID header.
#[derive(Clone, Debug, PartialEq)]
pub struct RawVec<T>(pub Vec<T>);

// ─── Core traits ──────────────────────────────────────────────────────────────

/// Every schema type has a unique 32-bit constructor ID.
pub trait Identifiable {
    /// The constructor ID as specified in the TL schema.
    const CONSTRUCTOR_ID: u32;
}

/// Marks a function type that can be sent as an RPC call.
///
/// `Return` is the type the server will respond with.
pub trait RemoteCall: Serializable {
    /// The deserialized response type.
    type Return: Deserializable;
}

/// Read the constructor ID and fail unless it equals `T::CONSTRUCTOR_ID`.
pub(crate) fn expect_id<T: Identifiable>(buf: deserialize::Buffer) -> deserialize::Result<()> {
    let id = u32::deserialize(buf)?;
    if id != T::CONSTRUCTOR_ID {
        return Err(deserialize::Error::UnexpectedConstructor { id });
    }
    Ok(())
}
