//! The 256-byte authorization key shared with the server.

use crate::sha1;

/// Long-lived key material plus its derived 8-byte identifier.
///
/// Equality compares identifiers only; two keys with the same id are the
/// same key as far as the server is concerned.
#[derive(Clone)]
pub struct AuthKey {
    pub(crate) data:   [u8; 256],
    pub(crate) key_id: [u8; 8],
}

impl AuthKey {
    /// Wrap raw key material, deriving the id as `SHA-1(key)[12..20]`.
    pub fn from_bytes(data: [u8; 256]) -> Self {
        let sha = sha1!(&data);
        let mut key_id = [0u8; 8];
        key_id.copy_from_slice(&sha[12..20]);
        Self { data, key_id }
    }

    /// The raw 256 bytes, for persistence.
    pub fn to_bytes(&self) -> [u8; 256] { self.data }

    /// The 8-byte identifier that prefixes every encrypted frame.
    pub fn key_id(&self) -> [u8; 8] { self.key_id }

    /// [`key_id`](Self::key_id) read as a little-endian integer.
    pub fn id(&self) -> u64 { u64::from_le_bytes(self.key_id) }
}

impl std::fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthKey(id={:#018x})", self.id())
    }
}

impl PartialEq for AuthKey {
    fn eq(&self, other: &Self) -> bool { self.key_id == other.key_id }
}

impl Eq for AuthKey {}
