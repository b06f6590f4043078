use std::fmt;
use std::hash::Hasher;

use storage::PageId;

/// Fixed-width little-endian encoding for keys and values stored in
/// hash table block pages.
///
/// The encoded bytes are persisted verbatim, so `SIZE` and the byte order of
/// an implementation must never change once data has been written with it.
pub trait SlotCodec: Sized {
    /// Number of bytes one encoded value occupies.
    const SIZE: usize;

    /// Writes the value into `buf[..Self::SIZE]`.
    fn encode(&self, buf: &mut [u8]);

    /// Reads a value back from `buf[..Self::SIZE]`.
    fn decode(buf: &[u8]) -> Self;

    /// Feeds exactly the bytes `encode` would produce into `state`.
    fn write_encoded<H: Hasher>(&self, state: &mut H);
}

macro_rules! int_codec {
    ($($ty:ty),*) => {
        $(
            impl SlotCodec for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn encode(&self, buf: &mut [u8]) {
                    buf[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
                }

                fn decode(buf: &[u8]) -> Self {
                    let mut bytes = [0u8; std::mem::size_of::<$ty>()];
                    bytes.copy_from_slice(&buf[..Self::SIZE]);
                    <$ty>::from_le_bytes(bytes)
                }

                fn write_encoded<H: Hasher>(&self, state: &mut H) {
                    state.write(&self.to_le_bytes());
                }
            }
        )*
    };
}

int_codec!(i32, i64, u32, u64);

/// Record identifier: the page holding a tuple and its slot within the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rid {
    pub page_id: PageId,
    pub slot_id: u32,
}

impl Rid {
    pub fn new(page_id: PageId, slot_id: u32) -> Self {
        Self { page_id, slot_id }
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.page_id, self.slot_id)
    }
}

impl SlotCodec for Rid {
    const SIZE: usize = 12;

    fn encode(&self, buf: &mut [u8]) {
        self.page_id.encode(&mut buf[..8]);
        self.slot_id.encode(&mut buf[8..12]);
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            page_id: PageId::decode(&buf[..8]),
            slot_id: u32::decode(&buf[8..12]),
        }
    }

    fn write_encoded<H: Hasher>(&self, state: &mut H) {
        self.page_id.write_encoded(state);
        self.slot_id.write_encoded(state);
    }
}

/// Opaque `N`-byte key, compared bytewise.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenericKey<const N: usize> {
    data: [u8; N],
}

impl<const N: usize> GenericKey<N> {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut data = [0u8; N];
        let len = bytes.len().min(N);
        data[..len].copy_from_slice(&bytes[..len]);
        Self { data }
    }

    /// Stores an integer in the leading bytes, zero padding the rest.
    pub fn from_integer(value: i64) -> Self {
        Self::from_bytes(&value.to_le_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.data
    }
}

impl<const N: usize> Default for GenericKey<N> {
    fn default() -> Self {
        Self { data: [0u8; N] }
    }
}

impl<const N: usize> fmt::Debug for GenericKey<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GenericKey<{}>(", N)?;
        for byte in &self.data {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}

impl<const N: usize> SlotCodec for GenericKey<N> {
    const SIZE: usize = N;

    fn encode(&self, buf: &mut [u8]) {
        buf[..N].copy_from_slice(&self.data);
    }

    fn decode(buf: &[u8]) -> Self {
        Self::from_bytes(&buf[..N])
    }

    fn write_encoded<H: Hasher>(&self, state: &mut H) {
        state.write(&self.data);
    }
}
