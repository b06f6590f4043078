use crate::{PAGE_SIZE, PageId};

pub const PAGE_LSN_SIZE: usize = 8;

/// In-memory content of one buffer frame.
///
/// The bytes are only reachable through the frame's latch, see
/// [`PinnedPage`](crate::PinnedPage).
#[derive(Debug, Clone)]
pub struct Page {
    data: Box<[u8; PAGE_SIZE]>,
}

impl Page {
    /// Creates a zeroed page.
    pub fn new() -> Self {
        Self {
            data: Box::new([0u8; PAGE_SIZE]),
        }
    }

    /// Returns the page LSN stored in the first bytes of the page.
    pub fn lsn(&self) -> u64 {
        let mut bytes = [0u8; PAGE_LSN_SIZE];
        bytes.copy_from_slice(&self.data[..PAGE_LSN_SIZE]);
        u64::from_le_bytes(bytes)
    }

    /// Updates the page LSN.
    pub fn set_lsn(&mut self, lsn: u64) {
        self.data[..PAGE_LSN_SIZE].copy_from_slice(&lsn.to_le_bytes());
    }

    /// Returns the entire page data.
    pub fn data(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    /// Returns a mutable reference to the entire page data.
    pub fn data_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.data
    }

    /// Reads a slice of bytes from the page.
    pub fn read_bytes(&self, offset: usize, len: usize) -> Option<&[u8]> {
        if offset.checked_add(len)? > PAGE_SIZE {
            return None;
        }
        Some(&self.data[offset..offset + len])
    }

    /// Writes bytes into the page at the given offset.
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> bool {
        match offset.checked_add(bytes.len()) {
            Some(end) if end <= PAGE_SIZE => {
                self.data[offset..end].copy_from_slice(bytes);
                true
            }
            _ => false,
        }
    }

    /// Zeroes the page content.
    pub fn reset_memory(&mut self) {
        self.data.fill(0);
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

/// Bookkeeping for one frame, guarded by the pool-wide lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FrameHeader {
    pub(crate) page_id: Option<PageId>,
    pub(crate) pin_count: u32,
    pub(crate) is_dirty: bool,
}

impl FrameHeader {
    pub(crate) fn pinned(page_id: PageId) -> Self {
        Self {
            page_id: Some(page_id),
            pin_count: 1,
            is_dirty: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lsn_roundtrips_through_header_bytes() {
        let mut page = Page::new();
        assert_eq!(page.lsn(), 0);
        page.set_lsn(0xDEAD_BEEF);
        assert_eq!(page.lsn(), 0xDEAD_BEEF);
        assert_eq!(page.read_bytes(0, 4).unwrap(), &0xDEAD_BEEFu32.to_le_bytes());
    }

    #[test]
    fn byte_access_is_bounds_checked() {
        let mut page = Page::new();
        assert!(page.write_bytes(PAGE_SIZE - 2, b"ok"));
        assert!(!page.write_bytes(PAGE_SIZE - 1, b"no"));
        assert!(!page.write_bytes(usize::MAX, b"x"));
        assert_eq!(page.read_bytes(PAGE_SIZE - 2, 2).unwrap(), b"ok");
        assert!(page.read_bytes(PAGE_SIZE, 1).is_none());
        assert!(page.read_bytes(usize::MAX, 2).is_none());

        page.reset_memory();
        assert!(page.data().iter().all(|&b| b == 0));
    }
}
