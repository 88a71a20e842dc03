//! Encrypted MTProto 2.0 envelopes.
//!
//! The plaintext inside every encrypted frame is:
//!
//! ```text
//! salt:       i64
//! session_id: i64
//! msg_id:     i64
//! seq_no:     i32
//! body_len:   i32
//! body:       [u8; body_len]
//! padding:    12..=1024 random bytes
//! ```

use std::io;

use tether_crypto::{AuthKey, Side, open, seal};

const HEADER_LEN: usize = 8 + 8 + 8 + 4 + 4;
const MIN_PADDING: usize = 12;
const MAX_PADDING: usize = 1024;

/// Errors that can occur when opening an encrypted frame.
#[derive(Clone, Debug, PartialEq)]
pub enum DecryptError {
    /// The underlying crypto layer rejected the message.
    Crypto(tether_crypto::DecryptError),
    /// The decrypted plaintext was too short to contain the header.
    FrameTooShort,
    /// `body_len` is not a multiple of 4 or leaves invalid padding.
    BadLength { body_len: i32, plaintext_len: usize },
}

impl std::fmt::Display for DecryptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Crypto(e) => write!(f, "crypto: {e}"),
            Self::FrameTooShort => write!(f, "inner plaintext too short"),
            Self::BadLength { body_len, plaintext_len } => {
                write!(f, "body length {body_len} invalid for {plaintext_len}-byte plaintext")
            }
        }
    }
}
impl std::error::Error for DecryptError {}

impl From<tether_crypto::DecryptError> for DecryptError {
    fn from(e: tether_crypto::DecryptError) -> Self { Self::Crypto(e) }
}

/// One message inside an encrypted frame.
#[derive(Clone, Debug, PartialEq)]
pub struct EncryptedMessage {
    pub salt:       i64,
    pub session_id: i64,
    pub msg_id:     i64,
    pub seq_no:     i32,
    /// TL-serialized body, starting with its constructor id.
    pub body:       Vec<u8>,
}

impl EncryptedMessage {
    fn plaintext(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.body.len());
        out.extend(self.salt.to_le_bytes());
        out.extend(self.session_id.to_le_bytes());
        out.extend(self.msg_id.to_le_bytes());
        out.extend(self.seq_no.to_le_bytes());
        out.extend((self.body.len() as i32).to_le_bytes());
        out.extend_from_slice(&self.body);
        out
    }

    fn read_plaintext(plaintext: &[u8]) -> Result<Self, DecryptError> {
        if plaintext.len() < HEADER_LEN {
            return Err(DecryptError::FrameTooShort);
        }
        let long = |at: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&plaintext[at..at + 8]);
            i64::from_le_bytes(b)
        };
        let int = |at: usize| {
            let mut b = [0u8; 4];
            b.copy_from_slice(&plaintext[at..at + 4]);
            i32::from_le_bytes(b)
        };

        let body_len = int(28);
        let bad_len = DecryptError::BadLength { body_len, plaintext_len: plaintext.len() };
        if body_len < 0 || body_len % 4 != 0 {
            return Err(bad_len);
        }
        let room = plaintext.len() - HEADER_LEN;
        let padding = room.checked_sub(body_len as usize).ok_or(bad_len.clone())?;
        if !(MIN_PADDING..=MAX_PADDING).contains(&padding) {
            return Err(bad_len);
        }

        Ok(Self {
            salt:       long(0),
            session_id: long(8),
            msg_id:     long(16),
            seq_no:     int(24),
            body:       plaintext[HEADER_LEN..HEADER_LEN + body_len as usize].to_vec(),
        })
    }
}

// ─── Cipher ──────────────────────────────────────────────────────────────────

/// Seals and opens frames for one end of the connection.
pub trait Cipher: Send + Sync {
    /// Encrypt `msg` into a complete frame (`key_id || msg_key || data`).
    fn encrypt(&self, key: &AuthKey, msg: &EncryptedMessage) -> io::Result<Vec<u8>>;

    /// Decrypt a frame produced by the other end.
    fn decrypt(&self, key: &AuthKey, frame: &mut [u8]) -> Result<EncryptedMessage, DecryptError>;
}

/// The MTProto 2.0 cipher.
#[derive(Clone, Copy, Debug)]
pub struct Mtproto2Cipher {
    side: Side,
}

impl Mtproto2Cipher {
    /// Encrypts as the client, decrypts what the server sent.
    pub fn client() -> Self { Self { side: Side::Client } }

    /// Encrypts as the server, decrypts what the client sent.
    pub fn server() -> Self { Self { side: Side::Server } }

    fn peer(&self) -> Side {
        match self.side {
            Side::Client => Side::Server,
            Side::Server => Side::Client,
        }
    }
}

impl Default for Mtproto2Cipher {
    fn default() -> Self { Self::client() }
}

impl Cipher for Mtproto2Cipher {
    fn encrypt(&self, key: &AuthKey, msg: &EncryptedMessage) -> io::Result<Vec<u8>> {
        seal(&msg.plaintext(), key, self.side).map_err(|e| io::Error::other(e.to_string()))
    }

    fn decrypt(&self, key: &AuthKey, frame: &mut [u8]) -> Result<EncryptedMessage, DecryptError> {
        let plaintext = open(frame, key, self.peer())?;
        EncryptedMessage::read_plaintext(plaintext)
    }
}
