//! Cryptography for MTProto 2.0 sessions.
//!
//! * [`aes`]: AES-256-IGE.
//! * [`sha1!`] and [`sha256!`]: digests over several slices at once.
//! * [`AuthKey`]: the 256-byte shared key and its id.
//! * [`seal`] and [`open`]: the encrypted frame, for either direction.
//!
//! Producing an [`AuthKey`] (the Diffie-Hellman handshake) is not done here.

#![deny(unsafe_code)]

pub mod aes;
mod auth_key;
mod envelope;
mod sha;

pub use auth_key::AuthKey;
pub use envelope::{DecryptError, Side, open, seal};

#[doc(hidden)]
pub mod __private {
    pub use sha1;
    pub use sha2;
}
