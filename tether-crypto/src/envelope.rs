//! The MTProto 2.0 encrypted frame:
//!
//! ```text
//! auth_key_id: [u8; 8]
//! msg_key:     [u8; 16]    middle of SHA-256(auth_key fragment || plaintext || padding)
//! data:        AES-256-IGE(plaintext || padding)
//! ```
//!
//! Key material is taken from different parts of the auth key depending on
//! which side sent the frame, so the opener must name the sender too.

use crate::{AuthKey, aes, sha256};

const KEY_ID_LEN: usize = 8;
const MSG_KEY_LEN: usize = 16;
const PREFIX_LEN: usize = KEY_ID_LEN + MSG_KEY_LEN;

/// Why a frame could not be opened.
#[derive(Clone, Debug, PartialEq)]
pub enum DecryptError {
    /// Shorter than the prefix, or the payload is not whole AES blocks.
    InvalidBuffer,
    /// Encrypted under a different auth key.
    AuthKeyMismatch,
    /// The `msg_key` does not match the decrypted payload.
    MessageKeyMismatch,
}

impl std::fmt::Display for DecryptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBuffer      => write!(f, "frame is not a whole number of AES blocks"),
            Self::AuthKeyMismatch    => write!(f, "frame is for another auth key"),
            Self::MessageKeyMismatch => write!(f, "msg_key does not match the payload"),
        }
    }
}

impl std::error::Error for DecryptError {}

/// Which end of the connection produced a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Client,
    Server,
}

impl Side {
    /// Offset into the auth key used for this sender's key material.
    fn offset(self) -> usize {
        match self {
            Self::Client => 0,
            Self::Server => 8,
        }
    }
}

struct Cipher {
    key: [u8; 32],
    iv:  [u8; 32],
}

fn derive(auth_key: &AuthKey, msg_key: &[u8; MSG_KEY_LEN], sender: Side) -> Cipher {
    let x = sender.offset();
    let a = sha256!(msg_key, &auth_key.data[x..x + 36]);
    let b = sha256!(&auth_key.data[x + 40..x + 76], msg_key);

    let mut c = Cipher { key: [0; 32], iv: [0; 32] };
    for (dst, src) in [(&mut c.key, (&a, &b)), (&mut c.iv, (&b, &a))] {
        let (outer, inner) = src;
        dst[..8].copy_from_slice(&outer[..8]);
        dst[8..24].copy_from_slice(&inner[8..24]);
        dst[24..].copy_from_slice(&outer[24..]);
    }
    c
}

fn msg_key(auth_key: &AuthKey, padded: &[u8], sender: Side) -> [u8; MSG_KEY_LEN] {
    let x = sender.offset();
    let digest = sha256!(&auth_key.data[x + 88..x + 120], padded);
    let mut out = [0; MSG_KEY_LEN];
    out.copy_from_slice(&digest[8..24]);
    out
}

/// Random padding length: at least 12 bytes, and enough to fill the last
/// AES block.
fn padding_len(plain_len: usize) -> usize {
    32 - plain_len % 16
}

/// Encrypt `plaintext` into a complete frame sent by `sender`.
///
/// Fails only if the OS random source does.
pub fn seal(plaintext: &[u8], auth_key: &AuthKey, sender: Side) -> Result<Vec<u8>, getrandom::Error> {
    let mut noise = [0u8; 32];
    getrandom::getrandom(&mut noise)?;
    Ok(seal_with(plaintext, auth_key, sender, &noise))
}

pub(crate) fn seal_with(plaintext: &[u8], auth_key: &AuthKey, sender: Side, noise: &[u8; 32]) -> Vec<u8> {
    let pad = padding_len(plaintext.len());
    let mut frame = Vec::with_capacity(PREFIX_LEN + plaintext.len() + pad);
    frame.extend_from_slice(&auth_key.key_id);
    frame.extend_from_slice(&[0; MSG_KEY_LEN]);
    frame.extend_from_slice(plaintext);
    frame.extend_from_slice(&noise[..pad]);

    let (prefix, payload) = frame.split_at_mut(PREFIX_LEN);
    let key = msg_key(auth_key, payload, sender);
    prefix[KEY_ID_LEN..].copy_from_slice(&key);
    let c = derive(auth_key, &key, sender);
    aes::ige_encrypt(payload, &c.key, &c.iv);
    frame
}

/// Decrypt a frame that `sender` produced, in place.
///
/// Returns the plaintext, padding included.
pub fn open<'a>(frame: &'a mut [u8], auth_key: &AuthKey, sender: Side) -> Result<&'a mut [u8], DecryptError> {
    if frame.len() < PREFIX_LEN || (frame.len() - PREFIX_LEN) % 16 != 0 {
        return Err(DecryptError::InvalidBuffer);
    }
    let (prefix, payload) = frame.split_at_mut(PREFIX_LEN);
    if prefix[..KEY_ID_LEN] != auth_key.key_id {
        return Err(DecryptError::AuthKeyMismatch);
    }
    let mut key = [0; MSG_KEY_LEN];
    key.copy_from_slice(&prefix[KEY_ID_LEN..]);

    let c = derive(auth_key, &key, sender);
    aes::ige_decrypt(payload, &c.key, &c.iv);
    if msg_key(auth_key, payload, sender) != key {
        return Err(DecryptError::MessageKeyMismatch);
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> AuthKey {
        let mut data = [0u8; 256];
        for (i, b) in data.iter_mut().enumerate() {
            *b = i as u8;
        }
        AuthKey::from_bytes(data)
    }

    #[test]
    fn padding_fills_blocks_and_meets_minimum() {
        for len in 0..64 {
            let pad = padding_len(len);
            assert!((12..=32).contains(&pad), "len {len} pad {pad}");
            assert_eq!((len + pad) % 16, 0);
        }
    }

    #[test]
    fn same_noise_same_frame() {
        let plain = [1u8; 40];
        let a = seal_with(&plain, &key(), Side::Client, &[0; 32]);
        let b = seal_with(&plain, &key(), Side::Client, &[0; 32]);
        assert_eq!(a, b);
        assert_eq!(&a[..8], &key().key_id());
        assert_eq!((a.len() - PREFIX_LEN) % 16, 0);
    }
}
