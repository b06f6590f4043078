//! Disk-backed page cache: a fixed pool of frames in front of a page-granular
//! storage device, with CLOCK eviction.

mod buffer;
mod config;
mod disk;
mod page;
mod replacer;

pub use buffer::{BufferPoolError, BufferPoolManager, BufferPoolResult, BufferPoolStats, PinnedPage};
pub use config::{BufferPoolConfig, DEFAULT_POOL_SIZE};
pub use disk::{
    DiskManager, FIRST_PAGE_ID, FileDiskManager, HEADER_SIZE, INVALID_PAGE_ID, MemoryDiskManager,
    PAGE_SIZE, PageId,
};
pub use page::{PAGE_LSN_SIZE, Page};
pub use replacer::{ClockReplacer, FrameId, Replacer};
