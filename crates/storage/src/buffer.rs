use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use log::{debug, trace, warn};
use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

use crate::config::BufferPoolConfig;
use crate::page::{FrameHeader, Page};
use crate::replacer::{ClockReplacer, FrameId, Replacer};
use crate::{DiskManager, INVALID_PAGE_ID, PageId};

/// Errors returned by the buffer pool manager.
#[derive(Debug, Error)]
pub enum BufferPoolError {
    /// The pool configuration was rejected.
    #[error("invalid buffer pool config: {0}")]
    Config(&'static str),
    /// The sentinel page id was passed where a real page is required.
    #[error("invalid page id")]
    InvalidPageId,
    /// The underlying disk manager failed.
    #[error("disk manager error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for buffer pool results.
pub type BufferPoolResult<T> = Result<T, BufferPoolError>;

/// Cumulative counters since the pool was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferPoolStats {
    /// Fetches served from a resident frame.
    pub hits: u64,
    /// Fetches that had to read from disk.
    pub misses: u64,
    /// Frames taken from the replacer and repurposed.
    pub evictions: u64,
    /// Dirty victims written back before reuse.
    pub write_backs: u64,
    /// Explicit flushes that reached the disk.
    pub flushes: u64,
}

/// Handle to a page pinned in the buffer pool.
///
/// The handle does not unpin on drop; pin counts are plain counters and
/// every successful fetch or new-page call must be matched by exactly one
/// unpin. [`PinnedPage::unpin`] consumes the handle so it cannot be used
/// after the pin is given back. Latch guards borrow the handle, so none can
/// outlive the pin:
///
/// ```compile_fail
/// use storage::{BufferPoolManager, MemoryDiskManager};
///
/// let bpm = BufferPoolManager::new(MemoryDiskManager::new(), 1);
/// let page = bpm.new_page().unwrap().unwrap();
/// let guard = page.read();
/// page.unpin(false);
/// drop(guard);
/// ```
pub struct PinnedPage<'a> {
    pool: &'a BufferPoolManager,
    page_id: PageId,
    frame_id: FrameId,
}

impl<'a> PinnedPage<'a> {
    /// Returns the page id this handle pins.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the frame id backing this handle.
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Takes the frame latch in shared mode.
    pub fn read(&self) -> RwLockReadGuard<'_, Page> {
        self.pool.inner.frames[self.frame_id].read()
    }

    /// Takes the frame latch in exclusive mode.
    pub fn write(&self) -> RwLockWriteGuard<'_, Page> {
        self.pool.inner.frames[self.frame_id].write()
    }

    /// Gives the pin back, marking the page dirty if requested.
    pub fn unpin(self, is_dirty: bool) -> bool {
        self.pool.unpin_page(self.page_id, is_dirty)
    }
}

impl fmt::Debug for PinnedPage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinnedPage")
            .field("page_id", &self.page_id)
            .field("frame_id", &self.frame_id)
            .finish()
    }
}

struct BufferPoolState {
    headers: Vec<FrameHeader>,
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
    replacer: ClockReplacer,
    stats: BufferPoolStats,
}

struct BufferPoolInner {
    // Frame content latches, indexed by frame id. Lock order: state, then a
    // frame latch, then the disk manager.
    frames: Vec<RwLock<Page>>,
    state: Mutex<BufferPoolState>,
    disk_manager: Mutex<Box<dyn DiskManager>>,
}

/// Buffer pool manager for caching pages between disk and memory.
#[derive(Clone)]
pub struct BufferPoolManager {
    inner: Arc<BufferPoolInner>,
}

impl BufferPoolManager {
    /// Creates a new buffer pool manager with a fixed number of frames.
    pub fn new<D: DiskManager + 'static>(disk_manager: D, pool_size: usize) -> Self {
        let frames = (0..pool_size).map(|_| RwLock::new(Page::new())).collect();
        let state = BufferPoolState {
            headers: vec![FrameHeader::default(); pool_size],
            page_table: HashMap::with_capacity(pool_size),
            free_list: (0..pool_size).collect(),
            replacer: ClockReplacer::new(pool_size),
            stats: BufferPoolStats::default(),
        };
        Self {
            inner: Arc::new(BufferPoolInner {
                frames,
                state: Mutex::new(state),
                disk_manager: Mutex::new(Box::new(disk_manager)),
            }),
        }
    }

    /// Creates a buffer pool manager after validating `config`.
    pub fn with_config<D: DiskManager + 'static>(
        disk_manager: D,
        config: &BufferPoolConfig,
    ) -> BufferPoolResult<Self> {
        config.validate().map_err(BufferPoolError::Config)?;
        Ok(Self::new(disk_manager, config.pool_size))
    }

    fn lock_state(&self) -> MutexGuard<'_, BufferPoolState> {
        self.inner.state.lock()
    }

    fn pinned(&self, page_id: PageId, frame_id: FrameId) -> PinnedPage<'_> {
        PinnedPage {
            pool: self,
            page_id,
            frame_id,
        }
    }

    /// Finds a frame for a new resident page: the free list first, then a
    /// replacer victim whose old content is written back if dirty. The
    /// returned frame is unmapped and its header reset.
    fn acquire_frame(&self, state: &mut BufferPoolState) -> BufferPoolResult<Option<FrameId>> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(Some(frame_id));
        }
        let Some(frame_id) = state.replacer.victim() else {
            return Ok(None);
        };

        let FrameHeader {
            page_id, is_dirty, ..
        } = state.headers[frame_id];
        if let Some(old_page_id) = page_id {
            if is_dirty {
                let page = self.inner.frames[frame_id].read();
                let written = self
                    .inner
                    .disk_manager
                    .lock()
                    .write_page(old_page_id, page.data());
                if let Err(err) = written {
                    // The victim keeps its page and stays evictable.
                    state.replacer.unpin(frame_id);
                    return Err(err.into());
                }
                state.stats.write_backs += 1;
                debug!(
                    "wrote back dirty page {} before reusing frame {}",
                    old_page_id, frame_id
                );
            }
            state.page_table.remove(&old_page_id);
            state.stats.evictions += 1;
            trace!("evicted page {} from frame {}", old_page_id, frame_id);
        }
        state.headers[frame_id] = FrameHeader::default();
        Ok(Some(frame_id))
    }

    /// Allocates a new page on disk and pins it in a zeroed frame.
    pub fn new_page(&self) -> BufferPoolResult<Option<PinnedPage<'_>>> {
        let mut state = self.lock_state();
        let Some(frame_id) = self.acquire_frame(&mut state)? else {
            debug!("new_page: every frame is pinned");
            return Ok(None);
        };

        let allocated = self.inner.disk_manager.lock().allocate_page();
        let page_id = match allocated {
            Ok(page_id) => page_id,
            Err(err) => {
                state.free_list.push_back(frame_id);
                return Err(err.into());
            }
        };

        self.inner.frames[frame_id].write().reset_memory();
        state.headers[frame_id] = FrameHeader::pinned(page_id);
        state.page_table.insert(page_id, frame_id);
        state.replacer.pin(frame_id);
        Ok(Some(self.pinned(page_id, frame_id)))
    }

    /// Fetches a page into memory and pins it.
    ///
    /// Returns `Ok(None)` when the page is not resident and every frame is
    /// pinned.
    pub fn fetch_page(&self, page_id: PageId) -> BufferPoolResult<Option<PinnedPage<'_>>> {
        if page_id == INVALID_PAGE_ID {
            return Err(BufferPoolError::InvalidPageId);
        }
        let mut state = self.lock_state();
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            state.headers[frame_id].pin_count += 1;
            state.replacer.pin(frame_id);
            state.stats.hits += 1;
            return Ok(Some(self.pinned(page_id, frame_id)));
        }

        let Some(frame_id) = self.acquire_frame(&mut state)? else {
            debug!("fetch_page({}): every frame is pinned", page_id);
            return Ok(None);
        };
        state.stats.misses += 1;

        // The frame is unmapped and absent from the replacer, so nobody else
        // can reach it while the pool lock is held.
        {
            let mut page = self.inner.frames[frame_id].write();
            let loaded = self
                .inner
                .disk_manager
                .lock()
                .read_page(page_id, page.data_mut());
            if let Err(err) = loaded {
                page.reset_memory();
                state.free_list.push_back(frame_id);
                return Err(err.into());
            }
        }
        state.headers[frame_id] = FrameHeader::pinned(page_id);
        state.page_table.insert(page_id, frame_id);
        state.replacer.pin(frame_id);
        Ok(Some(self.pinned(page_id, frame_id)))
    }

    /// Unpins a page and optionally marks it dirty.
    ///
    /// Unpinning a page that is not resident succeeds as a no-op. Unpinning a
    /// page whose pin count is already zero fails.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let mut state = self.lock_state();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return true;
        };
        let header = &mut state.headers[frame_id];
        if header.pin_count == 0 {
            warn!("unpin of page {} which is not pinned", page_id);
            return false;
        }
        header.pin_count -= 1;
        header.is_dirty |= is_dirty;
        if header.pin_count == 0 {
            state.replacer.unpin(frame_id);
        }
        true
    }

    /// Writes a resident page back to disk if it is dirty.
    ///
    /// Returns `Ok(false)` if the page is not resident. The page is pinned for
    /// the duration of the write, which happens outside the pool lock.
    pub fn flush_page(&self, page_id: PageId) -> BufferPoolResult<bool> {
        let frame_id = {
            let mut state = self.lock_state();
            let Some(&frame_id) = state.page_table.get(&page_id) else {
                return Ok(false);
            };
            let header = &mut state.headers[frame_id];
            if !header.is_dirty {
                return Ok(true);
            }
            // Cleared up front so an unpin(dirty) racing with the write
            // re-marks the page instead of being lost.
            header.is_dirty = false;
            header.pin_count += 1;
            state.replacer.pin(frame_id);
            frame_id
        };

        let written = {
            let page = self.inner.frames[frame_id].read();
            self.inner
                .disk_manager
                .lock()
                .write_page(page_id, page.data())
        };

        let mut state = self.lock_state();
        let header = &mut state.headers[frame_id];
        header.pin_count -= 1;
        if written.is_err() {
            header.is_dirty = true;
        }
        if header.pin_count == 0 {
            state.replacer.unpin(frame_id);
        }
        written?;
        state.stats.flushes += 1;
        Ok(true)
    }

    /// Flushes every dirty resident page, best effort.
    ///
    /// Returns the number of pages written. Failures are logged and skipped.
    pub fn flush_all_pages(&self) -> usize {
        let dirty: Vec<PageId> = {
            let state = self.lock_state();
            state
                .headers
                .iter()
                .filter(|header| header.is_dirty)
                .filter_map(|header| header.page_id)
                .collect()
        };

        let mut flushed = 0;
        for page_id in dirty {
            match self.flush_page(page_id) {
                Ok(true) => flushed += 1,
                Ok(false) => {}
                Err(err) => warn!("flush of page {} failed: {}", page_id, err),
            }
        }
        if let Err(err) = self.inner.disk_manager.lock().sync() {
            warn!("disk sync after flushing {} pages failed: {}", flushed, err);
        }
        flushed
    }

    /// Deletes a page from the pool and deallocates it on disk.
    ///
    /// Succeeds as a no-op for the invalid id and for pages that are not
    /// resident. Returns `Ok(false)` if the page is still pinned.
    pub fn delete_page(&self, page_id: PageId) -> BufferPoolResult<bool> {
        if page_id == INVALID_PAGE_ID {
            return Ok(true);
        }
        let mut state = self.lock_state();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(true);
        };
        if state.headers[frame_id].pin_count != 0 {
            warn!(
                "delete of page {} refused, pin count {}",
                page_id, state.headers[frame_id].pin_count
            );
            return Ok(false);
        }

        state.page_table.remove(&page_id);
        if let Err(err) = self.inner.disk_manager.lock().deallocate_page(page_id) {
            state.page_table.insert(page_id, frame_id);
            return Err(err.into());
        }
        state.replacer.pin(frame_id);
        state.headers[frame_id] = FrameHeader::default();
        self.inner.frames[frame_id].write().reset_memory();
        state.free_list.push_back(frame_id);
        Ok(true)
    }

    /// Number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.inner.frames.len()
    }

    /// Number of frames that have never held a page or were freed by delete.
    pub fn free_frame_count(&self) -> usize {
        self.lock_state().free_list.len()
    }

    /// Number of pages currently mapped to a frame.
    pub fn resident_page_count(&self) -> usize {
        self.lock_state().page_table.len()
    }

    /// Number of resident pages the replacer may evict.
    pub fn evictable_count(&self) -> usize {
        self.lock_state().replacer.size()
    }

    /// Pin count of a resident page.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.lock_state();
        let frame_id = *state.page_table.get(&page_id)?;
        Some(state.headers[frame_id].pin_count)
    }

    /// Dirty flag of a resident page.
    pub fn is_dirty(&self, page_id: PageId) -> Option<bool> {
        let state = self.lock_state();
        let frame_id = *state.page_table.get(&page_id)?;
        Some(state.headers[frame_id].is_dirty)
    }

    /// Snapshot of the pool counters.
    pub fn stats(&self) -> BufferPoolStats {
        self.lock_state().stats
    }
}
