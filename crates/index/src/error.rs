use storage::{BufferPoolError, PageId};
use thiserror::Error;

/// Errors returned by the hash index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    BufferPool(#[from] BufferPoolError),
    /// Every frame is pinned; retry once other users unpin.
    #[error("buffer pool has no free frames")]
    BufferPoolExhausted,
    #[error("hash table size must be positive")]
    InvalidSize,
    #[error("block index {index} out of range ({num_blocks} blocks)")]
    BlockIndexOutOfRange { index: usize, num_blocks: usize },
    #[error("header page cannot reference more than {max} block pages")]
    HeaderFull { max: usize },
    #[error("no free slot for entry after resize")]
    TableFull,
    #[error("page {page_id} is not a valid hash table header")]
    CorruptHeader { page_id: PageId },
}

pub type IndexResult<T> = Result<T, IndexError>;
