//! Decoding: [`Deserializable`], the [`Cursor`] it reads from, and the
//! primitive impls.

use std::fmt;

/// Constructor ID of the boxed `Vector t` type.
pub(crate) const VECTOR_ID: u32 = 0x1cb5c415;

// ─── Error ───────────────────────────────────────────────────────────────────

/// Why a body could not be decoded.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// The input ended in the middle of a value.
    UnexpectedEof,
    /// A boxed value started with the wrong constructor ID.
    UnexpectedConstructor { id: u32 },
    /// A length or count is negative or exceeds the remaining input.
    InvalidLength { len: i64 },
    /// `gzip_packed` data did not inflate.
    Decompress,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof                => write!(f, "unexpected end of input"),
            Self::UnexpectedConstructor { id } => write!(f, "unexpected constructor {id:#010x}"),
            Self::InvalidLength { len }        => write!(f, "invalid length {len}"),
            Self::Decompress                   => write!(f, "could not inflate gzip_packed data"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Read position over a borrowed frame body.
///
/// Slices handed out by [`read_slice`](Self::read_slice) borrow the
/// original input, not the cursor.
#[derive(Debug)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn pos(&self) -> usize { self.pos }

    /// Bytes left.
    pub fn remaining(&self) -> usize { self.buf.len() - self.pos }

    /// The constructor ID at the current position, without consuming it.
    pub fn peek_id(&self) -> Result<u32> {
        peek_id(&self.buf[self.pos..])
    }

    /// Borrow the next `len` bytes and move past them.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        let rest = &self.buf[self.pos..];
        if len > rest.len() {
            return Err(Error::UnexpectedEof);
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    /// The next `N` bytes as an array.
    pub fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_slice(N)?);
        Ok(out)
    }

    /// Append everything left to `out`; returns how much was copied.
    pub fn read_to_end(&mut self, out: &mut Vec<u8>) -> usize {
        let rest = &self.buf[self.pos..];
        out.extend_from_slice(rest);
        self.pos = self.buf.len();
        rest.len()
    }

    /// Turn a wire count into a `usize`.
    ///
    /// Each element takes at least one byte, so a count above the bytes
    /// left is rejected before anything is allocated for it.
    pub(crate) fn check_len(&self, len: i32) -> Result<usize> {
        match usize::try_from(len) {
            Ok(n) if n <= self.remaining() => Ok(n),
            _ => Err(Error::InvalidLength { len: i64::from(len) }),
        }
    }
}

/// What [`Deserializable::deserialize`] reads from.
pub type Buffer<'a, 'b> = &'a mut Cursor<'b>;

/// The leading constructor ID of `body`.
pub fn peek_id(body: &[u8]) -> Result<u32> {
    body.first_chunk::<4>()
        .map(|id| u32::from_le_bytes(*id))
        .ok_or(Error::UnexpectedEof)
}

// ─── Deserializable ──────────────────────────────────────────────────────────

pub trait Deserializable: Sized {
    fn deserialize(buf: Buffer) -> Result<Self>;

    /// Decode a value from the start of `bytes`; trailing bytes are ignored.
    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::deserialize(&mut Cursor::from_slice(bytes))
    }
}

macro_rules! le_int {
    ($($ty:ty),*) => {$(
        impl Deserializable for $ty {
            fn deserialize(buf: Buffer) -> Result<Self> {
                buf.take().map(<$ty>::from_le_bytes)
            }
        }
    )*};
}

le_int!(i32, u32, i64);

// ─── Bytes / String ───────────────────────────────────────────────────────────

/// `bytes`: a one-byte length (or `0xfe` and a three-byte length), the
/// data, then zero padding to a multiple of four.
impl Deserializable for Vec<u8> {
    fn deserialize(buf: Buffer) -> Result<Self> {
        let start = buf.pos();
        let [first] = buf.take::<1>()?;
        let len = match first {
            0xfe => {
                let [a, b, c] = buf.take::<3>()?;
                u32::from_le_bytes([a, b, c, 0]) as usize
            }
            short => usize::from(short),
        };
        let data = buf.read_slice(len)?.to_vec();
        let used = buf.pos() - start;
        buf.read_slice(used.next_multiple_of(4) - used)?;
        Ok(data)
    }
}

/// Invalid UTF-8 is replaced with `U+FFFD`.
impl Deserializable for String {
    fn deserialize(buf: Buffer) -> Result<Self> {
        let bytes = Vec::<u8>::deserialize(buf)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

// ─── Vectors ─────────────────────────────────────────────────────────────────

fn read_items<T: Deserializable>(buf: Buffer) -> Result<Vec<T>> {
    let count = i32::deserialize(buf)?;
    let count = buf.check_len(count)?;
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(T::deserialize(buf)?);
    }
    Ok(items)
}

/// Boxed `Vector<T>`.
impl<T: Deserializable> Deserializable for Vec<T> {
    fn deserialize(buf: Buffer) -> Result<Self> {
        match u32::deserialize(buf)? {
            VECTOR_ID => read_items(buf),
            id => Err(Error::UnexpectedConstructor { id }),
        }
    }
}

/// Bare `vector<T>`.
impl<T: Deserializable> Deserializable for crate::RawVec<T> {
    fn deserialize(buf: Buffer) -> Result<Self> {
        read_items(buf).map(crate::RawVec)
    }
}
