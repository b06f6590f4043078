//! Disk-resident hash index: a linear probing table whose slots live in
//! buffer pool pages.

mod block_page;
mod codec;
mod error;
mod hash;
mod header_page;
mod linear_probe;

pub use block_page::{HashTableBlockPage, block_array_size, block_capacity};
pub use codec::{GenericKey, Rid, SlotCodec};
pub use error::{IndexError, IndexResult};
pub use hash::{KeyHasher, SipKeyHasher};
pub use header_page::{HashTableHeaderPage, MAX_BLOCKS};
pub use linear_probe::LinearProbeHashTable;
