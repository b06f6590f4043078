//! Storage collaborators: the page-granular device the buffer pool reads
//! from and writes back to.
//!
//! Invariants of [`FileDiskManager`]:
//! - Page 0 is a reserved header storing next_page_id as u64 (format: bytes 0..8)
//! - Every allocation persists the header before returning
//! - Deallocated ids are handed out again (LIFO) and re-zeroed on reuse
//! - Reads past the end of the file yield a zero-filled page

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Error, ErrorKind, Result};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

pub type PageId = u64;
pub const PAGE_SIZE: usize = 4096;
pub const HEADER_SIZE: usize = PAGE_SIZE; // header occupies page 0

/// Sentinel meaning "no page". Never handed out by a disk manager.
pub const INVALID_PAGE_ID: PageId = 0;

/// First id a fresh disk manager allocates.
pub const FIRST_PAGE_ID: PageId = 1;

/// Page-granular storage device consumed by the buffer pool.
pub trait DiskManager: Send {
    /// Returns a fresh, currently unused page id.
    fn allocate_page(&mut self) -> Result<PageId>;

    /// Marks `page_id` as reusable. No frame may still map to it.
    fn deallocate_page(&mut self, page_id: PageId) -> Result<()>;

    /// Fills `buf` with the persisted content of `page_id`.
    fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> Result<()>;

    /// Persists `buf` as the content of `page_id`.
    fn write_page(&mut self, page_id: PageId, buf: &[u8]) -> Result<()>;

    /// Forces buffered data to stable storage.
    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}

fn check_buffer(len: usize) -> Result<()> {
    if len != PAGE_SIZE {
        return Err(Error::new(ErrorKind::InvalidInput, "buf wrong size"));
    }
    Ok(())
}

fn check_page_id(page_id: PageId) -> Result<()> {
    if page_id == INVALID_PAGE_ID {
        return Err(Error::new(ErrorKind::InvalidInput, "invalid page id"));
    }
    Ok(())
}

struct Header {
    next_page_id: u64, // always points to next never-allocated id
}

impl Header {
    fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..8].copy_from_slice(&self.next_page_id.to_le_bytes());
        buf
    }
    fn from_bytes(buf: &[u8]) -> Self {
        let mut b = [0u8; 8];
        b.copy_from_slice(&buf[..8]);
        let next_page_id = u64::from_le_bytes(b);
        Self { next_page_id }
    }
}

/// Single-file disk manager. Page `n` lives at byte offset `n * PAGE_SIZE`.
pub struct FileDiskManager {
    file: File,
    header: Header, // in-memory header (synced on every allocation)
    free_pages: Vec<PageId>,
    path: PathBuf,
}

impl FileDiskManager {
    /// Opens or creates the file; loads or initializes a valid header
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        let mut dm = FileDiskManager {
            file,
            header: Header {
                next_page_id: FIRST_PAGE_ID,
            },
            free_pages: Vec::new(),
            path: path.as_ref().to_path_buf(),
        };
        dm.header = dm.load_or_init_header()?;
        Ok(dm)
    }

    /// Loads or initializes the header page (page 0)
    fn load_or_init_header(&mut self) -> Result<Header> {
        let meta = self.file.metadata()?;
        if meta.len() < HEADER_SIZE as u64 {
            let header = Header {
                next_page_id: FIRST_PAGE_ID,
            };
            self.file.write_all_at(&header.to_bytes(), 0)?;
            Ok(header)
        } else {
            let mut buf = [0u8; HEADER_SIZE];
            self.file.read_exact_at(&mut buf, 0)?;
            let header = Header::from_bytes(&buf);
            if header.next_page_id < FIRST_PAGE_ID {
                return Err(Error::new(ErrorKind::InvalidData, "corrupt file header"));
            }
            Ok(header)
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the id the next fresh (non-reused) allocation will receive.
    pub fn next_page_id(&self) -> PageId {
        self.header.next_page_id
    }

    fn check_allocated(&self, page_id: PageId) -> Result<()> {
        check_page_id(page_id)?;
        if page_id >= self.header.next_page_id {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("page {} was never allocated", page_id),
            ));
        }
        Ok(())
    }
}

impl DiskManager for FileDiskManager {
    fn allocate_page(&mut self) -> Result<PageId> {
        let zero_buf = [0u8; PAGE_SIZE];
        if let Some(page_id) = self.free_pages.pop() {
            self.file
                .write_all_at(&zero_buf, page_id * PAGE_SIZE as u64)?;
            debug!("reusing deallocated page {}", page_id);
            return Ok(page_id);
        }
        let page_id = self.header.next_page_id;
        // Write virgin zeroed page before the header points past it
        self.file
            .write_all_at(&zero_buf, page_id * PAGE_SIZE as u64)?;
        self.header.next_page_id += 1;
        self.file.write_all_at(&self.header.to_bytes(), 0)?;
        self.file.sync_data()?;
        Ok(page_id)
    }

    fn deallocate_page(&mut self, page_id: PageId) -> Result<()> {
        self.check_allocated(page_id)?;
        if self.free_pages.contains(&page_id) {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("page {} already deallocated", page_id),
            ));
        }
        self.free_pages.push(page_id);
        Ok(())
    }

    fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        check_buffer(buf.len())?;
        check_page_id(page_id)?;
        buf.fill(0);
        let offset = page_id * PAGE_SIZE as u64;
        let mut read = 0;
        while read < PAGE_SIZE {
            let n = self.file.read_at(&mut buf[read..], offset + read as u64)?;
            if n == 0 {
                break;
            }
            read += n;
        }
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, buf: &[u8]) -> Result<()> {
        check_buffer(buf.len())?;
        check_page_id(page_id)?;
        self.file.write_all_at(buf, page_id * PAGE_SIZE as u64)
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_data()
    }
}

#[derive(Default)]
struct MemoryDiskState {
    pages: HashMap<PageId, Box<[u8; PAGE_SIZE]>>,
    next_page_id: PageId,
    free_pages: Vec<PageId>,
    reads: Vec<PageId>,
    writes: Vec<PageId>,
    allocations: usize,
    deallocations: usize,
    fail_writes: bool,
    fail_reads: bool,
}

/// In-memory disk manager that records every call it receives.
///
/// Clones share the same pages and counters, so a test can keep one handle
/// while the buffer pool owns another.
#[derive(Clone)]
pub struct MemoryDiskManager {
    inner: Arc<Mutex<MemoryDiskState>>,
}

impl MemoryDiskManager {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryDiskState {
                next_page_id: FIRST_PAGE_ID,
                ..MemoryDiskState::default()
            })),
        }
    }

    /// Total number of `read_page` calls.
    pub fn read_count(&self) -> usize {
        self.inner.lock().reads.len()
    }

    /// Total number of `write_page` calls.
    pub fn write_count(&self) -> usize {
        self.inner.lock().writes.len()
    }

    /// Number of `write_page` calls that targeted `page_id`.
    pub fn writes_to(&self, page_id: PageId) -> usize {
        self.inner
            .lock()
            .writes
            .iter()
            .filter(|&&id| id == page_id)
            .count()
    }

    /// Number of `read_page` calls that targeted `page_id`.
    pub fn reads_of(&self, page_id: PageId) -> usize {
        self.inner
            .lock()
            .reads
            .iter()
            .filter(|&&id| id == page_id)
            .count()
    }

    /// Page ids in the order they were written.
    pub fn write_log(&self) -> Vec<PageId> {
        self.inner.lock().writes.clone()
    }

    pub fn allocation_count(&self) -> usize {
        self.inner.lock().allocations
    }

    pub fn deallocation_count(&self) -> usize {
        self.inner.lock().deallocations
    }

    /// Makes subsequent writes fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    /// Makes subsequent reads fail with an I/O error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.lock().fail_reads = fail;
    }

    /// Persisted bytes of `page_id`, if it was ever written.
    pub fn page_content(&self, page_id: PageId) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .pages
            .get(&page_id)
            .map(|data| data.to_vec())
    }
}

impl Default for MemoryDiskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskManager for MemoryDiskManager {
    fn allocate_page(&mut self) -> Result<PageId> {
        let mut state = self.inner.lock();
        state.allocations += 1;
        let page_id = match state.free_pages.pop() {
            Some(page_id) => page_id,
            None => {
                let page_id = state.next_page_id;
                state.next_page_id += 1;
                page_id
            }
        };
        state.pages.remove(&page_id);
        Ok(page_id)
    }

    fn deallocate_page(&mut self, page_id: PageId) -> Result<()> {
        check_page_id(page_id)?;
        let mut state = self.inner.lock();
        if page_id >= state.next_page_id || state.free_pages.contains(&page_id) {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("page {} is not allocated", page_id),
            ));
        }
        state.deallocations += 1;
        state.free_pages.push(page_id);
        Ok(())
    }

    fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        check_buffer(buf.len())?;
        check_page_id(page_id)?;
        let mut state = self.inner.lock();
        if state.fail_reads {
            return Err(Error::other("injected read failure"));
        }
        state.reads.push(page_id);
        match state.pages.get(&page_id) {
            Some(data) => buf.copy_from_slice(&data[..]),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, buf: &[u8]) -> Result<()> {
        check_buffer(buf.len())?;
        check_page_id(page_id)?;
        let mut state = self.inner.lock();
        if state.fail_writes {
            return Err(Error::other("injected write failure"));
        }
        state.writes.push(page_id);
        let mut data = Box::new([0u8; PAGE_SIZE]);
        data.copy_from_slice(buf);
        state.pages.insert(page_id, data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    // Keeps the temp dir alive for the duration of a test.
    struct TestContext {
        _dir: TempDir,
        path: PathBuf,
    }

    impl TestContext {
        fn new(test_name: &str) -> Self {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join(format!("clockdb_disk_{}.db", test_name));
            Self { _dir: dir, path }
        }
    }

    #[test]
    fn test_pages_and_header_survive_reopen() {
        let ctx = TestContext::new("reopen");
        let marker = |fill: u8| {
            let mut page = [fill; PAGE_SIZE];
            page[..4].copy_from_slice(b"PAGE");
            page
        };

        {
            let mut dm = FileDiskManager::open(&ctx.path).unwrap();
            let first = dm.allocate_page().unwrap();
            let second = dm.allocate_page().unwrap();
            assert_eq!((first, second), (FIRST_PAGE_ID, FIRST_PAGE_ID + 1));
            dm.write_page(second, &marker(0x22)).unwrap();
            dm.write_page(first, &marker(0x11)).unwrap();
        }

        let mut dm = FileDiskManager::open(&ctx.path).unwrap();
        assert_eq!(dm.next_page_id(), FIRST_PAGE_ID + 2);
        let mut buf = [0u8; PAGE_SIZE];
        dm.read_page(FIRST_PAGE_ID, &mut buf).unwrap();
        assert_eq!(buf, marker(0x11));
        dm.read_page(FIRST_PAGE_ID + 1, &mut buf).unwrap();
        assert_eq!(buf, marker(0x22), "neighbouring write bled into page");
    }

    #[test]
    fn test_rejects_bad_buffers_and_sentinel_id() {
        let ctx = TestContext::new("bad_input");
        let mut dm = FileDiskManager::open(&ctx.path).unwrap();
        let page_id = dm.allocate_page().unwrap();

        assert!(dm.write_page(page_id, &[0u8; 16]).is_err());
        let mut oversized = vec![0u8; PAGE_SIZE + 1];
        assert!(dm.read_page(page_id, &mut oversized).is_err());
        assert!(dm.write_page(INVALID_PAGE_ID, &[0u8; PAGE_SIZE]).is_err());
        assert!(dm.deallocate_page(INVALID_PAGE_ID).is_err());
    }

    #[test]
    fn test_read_past_end_is_zeroed() {
        let ctx = TestContext::new("read_past_end");
        let mut dm = FileDiskManager::open(&ctx.path).unwrap();
        let mut buf = [0xFFu8; PAGE_SIZE];
        dm.read_page(42, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_file_grows_one_page_per_allocation() {
        let ctx = TestContext::new("growth");
        let mut dm = FileDiskManager::open(&ctx.path).unwrap();
        let ids: Vec<PageId> = (0..20).map(|_| dm.allocate_page().unwrap()).collect();
        assert_eq!(ids, (FIRST_PAGE_ID..FIRST_PAGE_ID + 20).collect::<Vec<_>>());
        drop(dm);

        let mut dm = FileDiskManager::open(&ctx.path).unwrap();
        assert_eq!(dm.allocate_page().unwrap(), 21);
        let len = fs::metadata(&ctx.path).unwrap().len();
        assert_eq!(len, (HEADER_SIZE + 21 * PAGE_SIZE) as u64);
    }

    #[test]
    fn test_deallocated_page_is_reused_zeroed() {
        let ctx = TestContext::new("reuse");
        let mut dm = FileDiskManager::open(&ctx.path).unwrap();
        let p1 = dm.allocate_page().unwrap();
        let _p2 = dm.allocate_page().unwrap();
        dm.write_page(p1, &[0x11; PAGE_SIZE]).unwrap();

        dm.deallocate_page(p1).unwrap();
        assert!(dm.deallocate_page(p1).is_err(), "double deallocation must fail");
        assert!(dm.deallocate_page(99).is_err(), "unknown page must fail");

        let reused = dm.allocate_page().unwrap();
        assert_eq!(reused, p1);
        let mut buf = [0xFFu8; PAGE_SIZE];
        dm.read_page(reused, &mut buf).unwrap();
        assert_eq!(buf, [0u8; PAGE_SIZE]);
        assert_eq!(dm.next_page_id(), 3);
    }

    #[test]
    fn test_memory_disk_counts_io() {
        let disk = MemoryDiskManager::new();
        let mut handle = disk.clone();
        let page_id = handle.allocate_page().unwrap();
        handle.write_page(page_id, &[7u8; PAGE_SIZE]).unwrap();
        let mut buf = [0u8; PAGE_SIZE];
        handle.read_page(page_id, &mut buf).unwrap();

        assert_eq!(buf, [7u8; PAGE_SIZE]);
        assert_eq!(disk.write_count(), 1);
        assert_eq!(disk.writes_to(page_id), 1);
        assert_eq!(disk.read_count(), 1);
        assert_eq!(disk.allocation_count(), 1);

        disk.set_fail_writes(true);
        assert!(handle.write_page(page_id, &[0u8; PAGE_SIZE]).is_err());
        assert_eq!(disk.write_count(), 1);
    }
}
