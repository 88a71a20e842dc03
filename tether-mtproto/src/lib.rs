//! MTProto session primitives.
//!
//! This crate handles:
//! * Message identifiers and sequence numbers
//! * The inbound replay window
//! * Encrypted envelopes and the [`Cipher`] that seals them
//! * Server salt bookkeeping
//! * Transport, dialer and key-exchange interfaces
//!
//! It is intentionally runtime-agnostic: no executor, no sockets. The async
//! connection that drives all of this lives in `tether-client`.

#![deny(unsafe_code)]

pub mod clock;
pub mod encrypted;
pub mod exchange;
pub mod message;
pub mod replay;
pub mod salts;
pub mod session;
pub mod transport;

pub use clock::{Clock, SystemClock};
pub use encrypted::{Cipher, DecryptError, EncryptedMessage, Mtproto2Cipher};
pub use exchange::{ExchangeError, ExchangeResult, KeyExchange, PublicKey, ServerExchangeResult};
pub use message::{MessageId, MessageIdGen, MessageType};
pub use replay::MessageIdBuf;
pub use salts::Salts;
pub use session::{Sequencer, Session, random_session_id};
pub use transport::{Dialer, Transport};
