//! Block page of a linear probe hash table.
//!
//! A block holds a contiguous run of the table's slots. Two bitmaps precede
//! the slot array: `occupied` marks slots that have ever held an entry and
//! `readable` marks slots whose entry is live. A slot that is occupied but not
//! readable is a tombstone; it keeps probe chains intact while being reusable
//! for inserts.

use std::borrow::{Borrow, BorrowMut};
use std::marker::PhantomData;

use storage::PAGE_SIZE;

use crate::codec::SlotCodec;

/// Number of slots that fit in one block page for a `slot_size`-byte entry.
///
/// Each slot costs `slot_size` bytes plus one bit in each bitmap; the two
/// bytes held back cover the bitmaps rounding up to whole bytes.
pub const fn block_array_size(slot_size: usize) -> usize {
    4 * (PAGE_SIZE - 2) / (4 * slot_size + 1)
}

/// Slot capacity of a block page storing `K -> V` entries.
pub const fn block_capacity<K: SlotCodec, V: SlotCodec>() -> usize {
    block_array_size(K::SIZE + V::SIZE)
}

/// Typed view over the bytes of a block page.
pub struct HashTableBlockPage<B, K, V> {
    data: B,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<B, K: SlotCodec, V: SlotCodec> HashTableBlockPage<B, K, V> {
    /// Slots per block.
    pub const CAPACITY: usize = block_capacity::<K, V>();
    const BITMAP_SIZE: usize = Self::CAPACITY.div_ceil(8);
    const READABLE_OFFSET: usize = Self::BITMAP_SIZE;
    const SLOTS_OFFSET: usize = 2 * Self::BITMAP_SIZE;
    const SLOT_SIZE: usize = K::SIZE + V::SIZE;

    pub fn new(data: B) -> Self {
        Self {
            data,
            _marker: PhantomData,
        }
    }

    fn slot_offset(offset: usize) -> usize {
        Self::SLOTS_OFFSET + offset * Self::SLOT_SIZE
    }
}

impl<B: Borrow<[u8; PAGE_SIZE]>, K: SlotCodec, V: SlotCodec> HashTableBlockPage<B, K, V> {
    fn bytes(&self) -> &[u8; PAGE_SIZE] {
        self.data.borrow()
    }

    fn bit(&self, base: usize, offset: usize) -> bool {
        self.bytes()[base + offset / 8] & (1 << (offset % 8)) != 0
    }

    /// Key stored at `offset`. Meaningless unless the slot is occupied.
    pub fn key_at(&self, offset: usize) -> K {
        let start = Self::slot_offset(offset);
        K::decode(&self.bytes()[start..start + K::SIZE])
    }

    /// Value stored at `offset`. Meaningless unless the slot is occupied.
    pub fn value_at(&self, offset: usize) -> V {
        let start = Self::slot_offset(offset) + K::SIZE;
        V::decode(&self.bytes()[start..start + V::SIZE])
    }

    /// Whether the slot has ever held an entry.
    pub fn is_occupied(&self, offset: usize) -> bool {
        self.bit(0, offset)
    }

    /// Whether the slot holds a live entry.
    pub fn is_readable(&self, offset: usize) -> bool {
        self.bit(Self::READABLE_OFFSET, offset)
    }
}

impl<B: BorrowMut<[u8; PAGE_SIZE]>, K: SlotCodec, V: SlotCodec> HashTableBlockPage<B, K, V> {
    fn bytes_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        self.data.borrow_mut()
    }

    fn set_bit(&mut self, base: usize, offset: usize, value: bool) {
        let byte = &mut self.bytes_mut()[base + offset / 8];
        let mask = 1 << (offset % 8);
        if value {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }

    /// Stores `key -> value` at `offset`.
    ///
    /// Returns false if the slot already holds a live entry. Tombstones are
    /// overwritten.
    pub fn insert(&mut self, offset: usize, key: &K, value: &V) -> bool {
        if self.is_readable(offset) {
            return false;
        }
        let start = Self::slot_offset(offset);
        let slot = &mut self.bytes_mut()[start..start + Self::SLOT_SIZE];
        key.encode(&mut slot[..K::SIZE]);
        value.encode(&mut slot[K::SIZE..]);
        self.set_bit(0, offset, true);
        self.set_bit(Self::READABLE_OFFSET, offset, true);
        true
    }

    /// Turns the entry at `offset` into a tombstone.
    pub fn remove(&mut self, offset: usize) {
        self.set_bit(Self::READABLE_OFFSET, offset, false);
    }
}
