//! Encoding: [`Serializable`] and the primitive impls.
//!
//! Encoding follows [MTProto Binary Serialization].
//!
//! [MTProto Binary Serialization]: https://core.telegram.org/mtproto/serialize

pub trait Serializable {
    /// Append the wire form of `self` to `buf`.
    fn serialize(&self, buf: &mut impl Extend<u8>);

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.serialize(&mut out);
        out
    }
}

macro_rules! le_int {
    ($($ty:ty),*) => {$(
        impl Serializable for $ty {
            fn serialize(&self, buf: &mut impl Extend<u8>) {
                buf.extend(self.to_le_bytes());
            }
        }
    )*};
}

le_int!(i32, u32, i64);

// ─── bytes ───────────────────────────────────────────────────────────────────

/// The length header of a `bytes` value: one byte up to 253, otherwise
/// `0xfe` followed by three little-endian length bytes.
fn bytes_header(len: usize) -> ([u8; 4], usize) {
    if len <= 253 {
        ([len as u8, 0, 0, 0], 1)
    } else {
        let [a, b, c, _] = (len as u32).to_le_bytes();
        ([0xfe, a, b, c], 4)
    }
}

impl Serializable for &[u8] {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        let (header, header_len) = bytes_header(self.len());
        let used = header_len + self.len();
        buf.extend(header[..header_len].iter().copied());
        buf.extend(self.iter().copied());
        buf.extend(std::iter::repeat_n(0u8, used.next_multiple_of(4) - used));
    }
}

impl Serializable for Vec<u8> {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.as_slice().serialize(buf);
    }
}

impl Serializable for String {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.as_bytes().serialize(buf);
    }
}

// ─── vectors ─────────────────────────────────────────────────────────────────

fn write_items<T: Serializable>(items: &[T], buf: &mut impl Extend<u8>) {
    (items.len() as i32).serialize(buf);
    items.iter().for_each(|item| item.serialize(buf));
}

/// Boxed `Vector<T>`.
impl<T: Serializable> Serializable for Vec<T> {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        crate::deserialize::VECTOR_ID.serialize(buf);
        write_items(self, buf);
    }
}

/// Bare `vector<T>`: the count and the items, no constructor ID.
impl<T: Serializable> Serializable for crate::RawVec<T> {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        write_items(&self.0, buf);
    }
}
