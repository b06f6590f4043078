use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use index::{LinearProbeHashTable, Rid, SipKeyHasher};
use log::{debug, info};
use storage::{
    BufferPoolConfig, BufferPoolManager, BufferPoolStats, FIRST_PAGE_ID, FileDiskManager, PageId,
};

use crate::commands::Statement;
use crate::printer::ReplOutput;

/// Slots of the index created for a fresh database file.
pub const DEFAULT_BUCKETS: usize = 256;

/// The index is the first thing written to a fresh file, so its header
/// always lands on the first page.
pub const INDEX_HEADER_PAGE_ID: PageId = FIRST_PAGE_ID;

pub type RidIndex = LinearProbeHashTable<i64, Rid>;

/// A database file holding one `i64 -> Rid` hash index.
///
/// Dirty pages are flushed when the engine is dropped.
pub struct Engine {
    buffer_pool: BufferPoolManager,
    index: RidIndex,
    db_path: PathBuf,
}

impl Engine {
    pub fn new(db_path: &Path) -> Result<Self> {
        Self::open(db_path, &BufferPoolConfig::default(), DEFAULT_BUCKETS)
    }

    /// Opens `db_path`, creating the index with `buckets` slots if the file
    /// is new.
    pub fn open(db_path: &Path, config: &BufferPoolConfig, buckets: usize) -> Result<Self> {
        let disk_manager = FileDiskManager::open(db_path).context("open database file")?;
        let fresh = disk_manager.next_page_id() == FIRST_PAGE_ID;
        let buffer_pool =
            BufferPoolManager::with_config(disk_manager, config).context("create buffer pool")?;

        let index = if fresh {
            let index = RidIndex::new(buffer_pool.clone(), buckets, SipKeyHasher)
                .context("create index")?;
            if index.header_page_id() != INDEX_HEADER_PAGE_ID {
                bail!(
                    "index header landed on page {} instead of {}",
                    index.header_page_id(),
                    INDEX_HEADER_PAGE_ID
                );
            }
            index
        } else {
            RidIndex::open(buffer_pool.clone(), INDEX_HEADER_PAGE_ID, SipKeyHasher)
                .context("open index")?
        };
        info!(
            "{} {} with {} frames",
            if fresh { "created" } else { "opened" },
            db_path.display(),
            config.pool_size
        );

        Ok(Self {
            buffer_pool,
            index,
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn buffer_pool(&self) -> &BufferPoolManager {
        &self.buffer_pool
    }

    pub fn insert(&self, key: i64, rid: Rid) -> Result<bool> {
        self.index
            .insert(&key, &rid)
            .with_context(|| format!("insert key {}", key))
    }

    pub fn get(&self, key: i64) -> Result<Vec<Rid>> {
        let mut rids = self
            .index
            .get_value(&key)
            .with_context(|| format!("look up key {}", key))?;
        rids.sort();
        Ok(rids)
    }

    pub fn remove(&self, key: i64, rid: Rid) -> Result<bool> {
        self.index
            .remove(&key, &rid)
            .with_context(|| format!("remove key {}", key))
    }

    /// Logical size of the index in slots.
    pub fn size(&self) -> Result<usize> {
        self.index.size().context("read index size")
    }

    /// Writes every dirty page back to the file and returns how many were written.
    pub fn flush(&self) -> usize {
        self.buffer_pool.flush_all_pages()
    }

    pub fn stats(&self) -> BufferPoolStats {
        self.buffer_pool.stats()
    }

    pub fn execute(&self, statement: &Statement) -> Result<ReplOutput> {
        debug!("executing {}", statement);
        let output = match *statement {
            Statement::Insert { key, rid } => {
                if self.insert(key, rid)? {
                    ReplOutput::message("INSERT 1")
                } else {
                    ReplOutput::message(format!("INSERT 0 ({} -> {} already present)", key, rid))
                }
            }
            Statement::Get { key } => rids_to_output(key, &self.get(key)?),
            Statement::Remove { key, rid } => {
                let removed = self.remove(key, rid)?;
                ReplOutput::message(format!("REMOVE {}", u8::from(removed)))
            }
            Statement::Size => {
                let blocks = self.index.num_blocks().context("read index block count")?;
                ReplOutput::rows(
                    ["slots", "blocks"],
                    vec![vec![self.size()?.to_string(), blocks.to_string()]],
                )
            }
        };
        Ok(output)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let flushed = self.buffer_pool.flush_all_pages();
        debug!("flushed {} pages closing {}", flushed, self.db_path.display());
    }
}

pub fn rids_to_output(key: i64, rids: &[Rid]) -> ReplOutput {
    let rows = rids
        .iter()
        .map(|rid| {
            vec![
                key.to_string(),
                rid.page_id.to_string(),
                rid.slot_id.to_string(),
            ]
        })
        .collect();
    ReplOutput::rows(["key", "page", "slot"], rows)
}

pub fn stats_to_output(buffer_pool: &BufferPoolManager) -> ReplOutput {
    let stats = buffer_pool.stats();
    let rows = [
        ("pool_size", buffer_pool.pool_size() as u64),
        ("resident_pages", buffer_pool.resident_page_count() as u64),
        ("free_frames", buffer_pool.free_frame_count() as u64),
        ("evictable_frames", buffer_pool.evictable_count() as u64),
        ("hits", stats.hits),
        ("misses", stats.misses),
        ("evictions", stats.evictions),
        ("write_backs", stats.write_backs),
        ("flushes", stats.flushes),
    ]
    .into_iter()
    .map(|(name, value)| vec![name.to_string(), value.to_string()])
    .collect();
    ReplOutput::rows(["metric", "value"], rows)
}
