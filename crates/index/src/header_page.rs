//! Header page of a linear probe hash table.
//!
//! Layout (little-endian):
//!
//! ```text
//! | lsn (8) | page_id (8) | size (8) | num_blocks (8) | block_page_ids (8 * MAX_BLOCKS) |
//! ```
//!
//! `size` is the number of addressable slots. The block page ids are the
//! table's slot array split into `BLOCK_CAPACITY`-sized segments, in order.

use std::borrow::{Borrow, BorrowMut};

use storage::{PAGE_LSN_SIZE, PAGE_SIZE, PageId};

use crate::error::{IndexError, IndexResult};

const LSN_OFFSET: usize = 0;
const PAGE_ID_OFFSET: usize = PAGE_LSN_SIZE;
const SIZE_OFFSET: usize = PAGE_ID_OFFSET + 8;
const NUM_BLOCKS_OFFSET: usize = SIZE_OFFSET + 8;
const BLOCK_IDS_OFFSET: usize = NUM_BLOCKS_OFFSET + 8;

/// Maximum number of block pages one header can reference.
pub const MAX_BLOCKS: usize = (PAGE_SIZE - BLOCK_IDS_OFFSET) / 8;

fn read_u64(data: &[u8; PAGE_SIZE], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

fn write_u64(data: &mut [u8; PAGE_SIZE], offset: usize, value: u64) {
    data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

/// Typed view over the bytes of a header page.
///
/// Borrowing `&[u8; PAGE_SIZE]` gives a read-only view, `&mut [u8; PAGE_SIZE]`
/// adds the setters.
pub struct HashTableHeaderPage<B> {
    data: B,
}

impl<B: Borrow<[u8; PAGE_SIZE]>> HashTableHeaderPage<B> {
    pub fn new(data: B) -> Self {
        Self { data }
    }

    fn bytes(&self) -> &[u8; PAGE_SIZE] {
        self.data.borrow()
    }

    pub fn lsn(&self) -> u64 {
        read_u64(self.bytes(), LSN_OFFSET)
    }

    pub fn page_id(&self) -> PageId {
        read_u64(self.bytes(), PAGE_ID_OFFSET)
    }

    /// Number of addressable slots in the table.
    pub fn size(&self) -> usize {
        read_u64(self.bytes(), SIZE_OFFSET) as usize
    }

    /// Number of block page ids recorded so far.
    pub fn num_blocks(&self) -> usize {
        read_u64(self.bytes(), NUM_BLOCKS_OFFSET) as usize
    }

    pub fn block_page_id(&self, index: usize) -> IndexResult<PageId> {
        let num_blocks = self.num_blocks();
        if index >= num_blocks || index >= MAX_BLOCKS {
            return Err(IndexError::BlockIndexOutOfRange { index, num_blocks });
        }
        Ok(read_u64(self.bytes(), BLOCK_IDS_OFFSET + index * 8))
    }

    pub fn block_page_ids(&self) -> IndexResult<Vec<PageId>> {
        (0..self.num_blocks())
            .map(|index| self.block_page_id(index))
            .collect()
    }
}

impl<B: BorrowMut<[u8; PAGE_SIZE]>> HashTableHeaderPage<B> {
    fn bytes_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        self.data.borrow_mut()
    }

    pub fn set_lsn(&mut self, lsn: u64) {
        write_u64(self.bytes_mut(), LSN_OFFSET, lsn);
    }

    pub fn set_page_id(&mut self, page_id: PageId) {
        write_u64(self.bytes_mut(), PAGE_ID_OFFSET, page_id);
    }

    pub fn set_size(&mut self, size: usize) {
        write_u64(self.bytes_mut(), SIZE_OFFSET, size as u64);
    }

    /// Appends a block page id after the ones already recorded.
    pub fn add_block_page_id(&mut self, page_id: PageId) -> IndexResult<()> {
        let index = self.num_blocks();
        if index >= MAX_BLOCKS {
            return Err(IndexError::HeaderFull { max: MAX_BLOCKS });
        }
        write_u64(self.bytes_mut(), BLOCK_IDS_OFFSET + index * 8, page_id);
        write_u64(self.bytes_mut(), NUM_BLOCKS_OFFSET, index as u64 + 1);
        Ok(())
    }

    /// Forgets every recorded block page id.
    pub fn reset_blocks(&mut self) {
        write_u64(self.bytes_mut(), NUM_BLOCKS_OFFSET, 0);
    }
}
