//! Hash helpers over concatenated inputs.
//!
//! MTProto derives every key from hashes of two or three adjacent slices, so
//! both macros take a list of byte slices and feed them in order without an
//! intermediate allocation.

/// SHA-1 of the concatenation of the given byte slices, as `[u8; 20]`.
///
/// ```
/// let a = tether_crypto::sha1!(b"ab", b"c");
/// let b = tether_crypto::sha1!(b"abc");
/// assert_eq!(a, b);
/// ```
#[macro_export]
macro_rules! sha1 {
    ( $( $x:expr ),+ $(,)? ) => {{
        use $crate::__private::sha1::{Digest, Sha1};
        let mut h = Sha1::new();
        $( h.update($x); )+
        let out: [u8; 20] = h.finalize().into();
        out
    }};
}

/// SHA-256 of the concatenation of the given byte slices, as `[u8; 32]`.
#[macro_export]
macro_rules! sha256 {
    ( $( $x:expr ),+ $(,)? ) => {{
        use $crate::__private::sha2::{Digest, Sha256};
        let mut h = Sha256::new();
        $( h.update($x); )+
        let out: [u8; 32] = h.finalize().into();
        out
    }};
}
