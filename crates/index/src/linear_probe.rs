use std::cell::Cell;
use std::marker::PhantomData;

use log::{debug, trace, warn};
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};
use storage::{BufferPoolManager, Page, PageId, PinnedPage};

use crate::block_page::{HashTableBlockPage, block_capacity};
use crate::codec::SlotCodec;
use crate::error::{IndexError, IndexResult};
use crate::hash::{KeyHasher, SipKeyHasher};
use crate::header_page::{HashTableHeaderPage, MAX_BLOCKS};

/// A pinned page that gives its pin back when dropped.
struct Pinned<'a> {
    bpm: &'a BufferPoolManager,
    page: PinnedPage<'a>,
    dirty: Cell<bool>,
}

impl<'a> Pinned<'a> {
    fn fetch(bpm: &'a BufferPoolManager, page_id: PageId) -> IndexResult<Self> {
        let page = bpm
            .fetch_page(page_id)?
            .ok_or(IndexError::BufferPoolExhausted)?;
        Ok(Self {
            bpm,
            page,
            dirty: Cell::new(false),
        })
    }

    /// Allocates a zeroed page. It is written back on eviction even if
    /// nothing else touches it.
    fn allocate(bpm: &'a BufferPoolManager) -> IndexResult<Self> {
        let page = bpm.new_page()?.ok_or(IndexError::BufferPoolExhausted)?;
        Ok(Self {
            bpm,
            page,
            dirty: Cell::new(true),
        })
    }

    fn page_id(&self) -> PageId {
        self.page.page_id()
    }

    fn read(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    fn write(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    fn mark_dirty(&self) {
        self.dirty.set(true);
    }
}

impl Drop for Pinned<'_> {
    fn drop(&mut self) {
        if !self.bpm.unpin_page(self.page.page_id(), self.dirty.get()) {
            warn!("hash table lost track of pin on page {}", self.page.page_id());
        }
    }
}

/// Keeps the most recently visited block pinned so a probe run inside one
/// block costs a single fetch.
struct BlockCursor<'a> {
    bpm: &'a BufferPoolManager,
    current: Option<(PageId, Pinned<'a>)>,
}

impl<'a> BlockCursor<'a> {
    fn new(bpm: &'a BufferPoolManager) -> Self {
        Self { bpm, current: None }
    }

    fn block(&mut self, page_id: PageId) -> IndexResult<&Pinned<'a>> {
        let pinned = match self.current.take() {
            Some((cached, pinned)) if cached == page_id => pinned,
            stale => {
                // Release the old pin first; small pools may not fit both.
                drop(stale);
                Pinned::fetch(self.bpm, page_id)?
            }
        };
        Ok(&self.current.insert((page_id, pinned)).1)
    }
}

/// Snapshot of the header: logical size and the block page list.
struct TableLayout {
    size: usize,
    capacity: usize,
    block_page_ids: Vec<PageId>,
}

impl TableLayout {
    fn load<K: SlotCodec, V: SlotCodec>(
        header_page_id: PageId,
        page: &Page,
    ) -> IndexResult<Self> {
        let header = HashTableHeaderPage::new(page.data());
        if header.size() == 0 {
            return Err(IndexError::CorruptHeader {
                page_id: header_page_id,
            });
        }
        Ok(Self {
            size: header.size(),
            capacity: block_capacity::<K, V>(),
            block_page_ids: header.block_page_ids()?,
        })
    }

    /// Maps a slot index to its block page and the offset inside it.
    fn locate(&self, slot: usize) -> IndexResult<(PageId, usize)> {
        let index = slot / self.capacity;
        let page_id = self
            .block_page_ids
            .get(index)
            .copied()
            .ok_or(IndexError::BlockIndexOutOfRange {
                index,
                num_blocks: self.block_page_ids.len(),
            })?;
        Ok((page_id, slot % self.capacity))
    }
}

/// Slots visited for `hash` in a table of `size` slots: every slot once,
/// starting at the home slot and wrapping around.
fn probe_sequence(hash: u64, size: usize) -> impl Iterator<Item = usize> {
    let start = (hash % size as u64) as usize;
    (0..size).map(move |step| (start + step) % size)
}

enum InsertOutcome {
    Inserted,
    Duplicate,
    Full,
}

/// Allocates `count` empty block pages. On failure the pages allocated so far
/// are deleted again.
fn allocate_blocks(bpm: &BufferPoolManager, count: usize) -> IndexResult<Vec<PageId>> {
    let mut page_ids = Vec::with_capacity(count);
    for _ in 0..count {
        match Pinned::allocate(bpm) {
            Ok(block) => page_ids.push(block.page_id()),
            Err(err) => {
                release_pages(bpm, &page_ids);
                return Err(err);
            }
        }
    }
    Ok(page_ids)
}

/// Best-effort cleanup after a failed operation; failures are only logged.
fn release_pages(bpm: &BufferPoolManager, page_ids: &[PageId]) {
    for &page_id in page_ids {
        if let Err(err) = discard_page(bpm, page_id) {
            warn!("could not release page {}: {}", page_id, err);
        }
    }
}

/// Deletes a page that nobody holds a pin on.
fn discard_page(bpm: &BufferPoolManager, page_id: PageId) -> IndexResult<()> {
    // The pool only deallocates resident pages.
    drop(Pinned::fetch(bpm, page_id)?);
    if !bpm.delete_page(page_id)? {
        warn!("page {} is still pinned and was not deleted", page_id);
    }
    Ok(())
}

/// Disk-backed hash index with open addressing and linear probing.
///
/// The table's slots live in block pages listed by a header page. Keys may
/// map to several distinct values; an identical `(key, value)` pair is
/// stored once.
///
/// Readers hold the header latch shared, `insert` and `remove` hold it
/// exclusively, so mutations are serialized and never observed half done.
/// Block latches are only held while one slot is inspected or written.
pub struct LinearProbeHashTable<K, V, H = SipKeyHasher> {
    bpm: BufferPoolManager,
    header_page_id: PageId,
    hasher: H,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V, H> LinearProbeHashTable<K, V, H>
where
    K: SlotCodec + PartialEq,
    V: SlotCodec + PartialEq,
    H: KeyHasher<K>,
{
    /// Slots per block page for this key/value layout.
    pub const BLOCK_CAPACITY: usize = block_capacity::<K, V>();

    /// Creates an empty table with `num_buckets` slots.
    pub fn new(bpm: BufferPoolManager, num_buckets: usize, hasher: H) -> IndexResult<Self> {
        if num_buckets == 0 {
            return Err(IndexError::InvalidSize);
        }
        let num_blocks = num_buckets.div_ceil(Self::BLOCK_CAPACITY);
        if num_blocks > MAX_BLOCKS {
            return Err(IndexError::HeaderFull { max: MAX_BLOCKS });
        }

        let header_page_id = Self::create(&bpm, num_buckets, num_blocks)?;
        debug!(
            "created hash table at page {} with {} slots in {} blocks",
            header_page_id, num_buckets, num_blocks
        );
        Ok(Self {
            bpm,
            header_page_id,
            hasher,
            _marker: PhantomData,
        })
    }

    fn create(
        bpm: &BufferPoolManager,
        num_buckets: usize,
        num_blocks: usize,
    ) -> IndexResult<PageId> {
        let header = Pinned::allocate(bpm)?;
        let header_page_id = header.page_id();

        let block_page_ids = match allocate_blocks(bpm, num_blocks) {
            Ok(page_ids) => page_ids,
            Err(err) => {
                drop(header);
                release_pages(bpm, &[header_page_id]);
                return Err(err);
            }
        };
        // Empty blocks must reach the disk before the header that lists them.
        for &page_id in &block_page_ids {
            if let Err(err) = bpm.flush_page(page_id) {
                drop(header);
                release_pages(bpm, &block_page_ids);
                release_pages(bpm, &[header_page_id]);
                return Err(err.into());
            }
        }

        {
            let mut page = header.write();
            let mut view = HashTableHeaderPage::new(page.data_mut());
            view.set_page_id(header_page_id);
            view.set_size(num_buckets);
            for &page_id in &block_page_ids {
                view.add_block_page_id(page_id)?;
            }
        }
        drop(header);
        bpm.flush_page(header_page_id)?;
        Ok(header_page_id)
    }

    /// Attaches to a table created earlier whose header lives at
    /// `header_page_id`.
    pub fn open(bpm: BufferPoolManager, header_page_id: PageId, hasher: H) -> IndexResult<Self> {
        {
            let header = Pinned::fetch(&bpm, header_page_id)?;
            let page = header.read();
            let view = HashTableHeaderPage::new(page.data());
            let valid = view.page_id() == header_page_id
                && view.size() > 0
                && view.num_blocks() == view.size().div_ceil(Self::BLOCK_CAPACITY);
            if !valid {
                return Err(IndexError::CorruptHeader {
                    page_id: header_page_id,
                });
            }
            debug!(
                "opened hash table at page {} with {} slots",
                header_page_id,
                view.size()
            );
        }
        Ok(Self {
            bpm,
            header_page_id,
            hasher,
            _marker: PhantomData,
        })
    }

    pub fn header_page_id(&self) -> PageId {
        self.header_page_id
    }

    /// Logical size: the number of slots probed, not the number of entries.
    pub fn size(&self) -> IndexResult<usize> {
        let header = Pinned::fetch(&self.bpm, self.header_page_id)?;
        let page = header.read();
        Ok(HashTableHeaderPage::new(page.data()).size())
    }

    pub fn num_blocks(&self) -> IndexResult<usize> {
        let header = Pinned::fetch(&self.bpm, self.header_page_id)?;
        let page = header.read();
        Ok(HashTableHeaderPage::new(page.data()).num_blocks())
    }

    /// Returns every value stored under `key`.
    pub fn get_value(&self, key: &K) -> IndexResult<Vec<V>> {
        let header = Pinned::fetch(&self.bpm, self.header_page_id)?;
        let latch = header.read();
        let layout = TableLayout::load::<K, V>(self.header_page_id, &latch)?;

        let mut cursor = BlockCursor::new(&self.bpm);
        let mut values = Vec::new();
        for slot in probe_sequence(self.hasher.hash(key), layout.size) {
            let (page_id, offset) = layout.locate(slot)?;
            let page = cursor.block(page_id)?.read();
            let block = HashTableBlockPage::<_, K, V>::new(page.data());
            if !block.is_occupied(offset) {
                break;
            }
            if block.is_readable(offset) && block.key_at(offset) == *key {
                values.push(block.value_at(offset));
            }
        }
        Ok(values)
    }

    /// Inserts `key -> value`.
    ///
    /// Returns `Ok(false)` if the probe meets the identical pair before it
    /// finds a free slot. The pair is stored in the first slot that is empty
    /// or a tombstone, so an identical pair sitting past such a slot goes
    /// unnoticed. A table with no free slot is doubled once and the insert
    /// retried.
    pub fn insert(&self, key: &K, value: &V) -> IndexResult<bool> {
        let header = Pinned::fetch(&self.bpm, self.header_page_id)?;
        let mut latch = header.write();

        let mut resized = false;
        loop {
            let layout = TableLayout::load::<K, V>(self.header_page_id, &latch)?;
            match self.try_insert(&layout, key, value)? {
                InsertOutcome::Inserted => return Ok(true),
                InsertOutcome::Duplicate => return Ok(false),
                InsertOutcome::Full if resized => return Err(IndexError::TableFull),
                InsertOutcome::Full => {
                    self.grow(&mut latch, layout)?;
                    header.mark_dirty();
                    resized = true;
                }
            }
        }
    }

    fn try_insert(
        &self,
        layout: &TableLayout,
        key: &K,
        value: &V,
    ) -> IndexResult<InsertOutcome> {
        let mut cursor = BlockCursor::new(&self.bpm);
        for slot in probe_sequence(self.hasher.hash(key), layout.size) {
            let (page_id, offset) = layout.locate(slot)?;
            let block = cursor.block(page_id)?;
            {
                let page = block.read();
                let view = HashTableBlockPage::<_, K, V>::new(page.data());
                if view.is_readable(offset) {
                    if view.key_at(offset) == *key && view.value_at(offset) == *value {
                        return Ok(InsertOutcome::Duplicate);
                    }
                    continue;
                }
            }
            let mut page = block.write();
            if HashTableBlockPage::<_, K, V>::new(page.data_mut()).insert(offset, key, value) {
                block.mark_dirty();
                trace!("inserted into slot {} (block page {})", slot, page_id);
                return Ok(InsertOutcome::Inserted);
            }
        }
        Ok(InsertOutcome::Full)
    }

    /// Removes the pair `key -> value`.
    ///
    /// Only the first live match is cleared, but the probe still runs to the
    /// end of the chain. Returns whether a pair was removed.
    pub fn remove(&self, key: &K, value: &V) -> IndexResult<bool> {
        let header = Pinned::fetch(&self.bpm, self.header_page_id)?;
        let latch = header.write();
        let layout = TableLayout::load::<K, V>(self.header_page_id, &latch)?;

        let mut cursor = BlockCursor::new(&self.bpm);
        let mut removed = false;
        for slot in probe_sequence(self.hasher.hash(key), layout.size) {
            let (page_id, offset) = layout.locate(slot)?;
            let block = cursor.block(page_id)?;
            {
                let page = block.read();
                let view = HashTableBlockPage::<_, K, V>::new(page.data());
                if !view.is_occupied(offset) {
                    break;
                }
                let matches = view.is_readable(offset)
                    && view.key_at(offset) == *key
                    && view.value_at(offset) == *value;
                if removed || !matches {
                    continue;
                }
            }
            let mut page = block.write();
            HashTableBlockPage::<_, K, V>::new(page.data_mut()).remove(offset);
            block.mark_dirty();
            removed = true;
        }
        Ok(removed)
    }

    /// Doubles the table if its logical size is still `old_size`.
    ///
    /// Returns `Ok(false)` when the size has already moved on.
    pub fn resize(&self, old_size: usize) -> IndexResult<bool> {
        let header = Pinned::fetch(&self.bpm, self.header_page_id)?;
        let mut latch = header.write();
        let layout = TableLayout::load::<K, V>(self.header_page_id, &latch)?;
        if layout.size != old_size {
            return Ok(false);
        }
        self.grow(&mut latch, layout)?;
        header.mark_dirty();
        Ok(true)
    }

    /// Rebuilds the table at twice its size.
    ///
    /// Live entries are rehashed into fresh blocks first. The header is only
    /// switched over once every entry has landed, so a failure leaves the
    /// header and the old blocks as they were. Old blocks are deleted last.
    fn grow(&self, header: &mut Page, layout: TableLayout) -> IndexResult<()> {
        let new_size = layout.size * 2;
        let num_blocks = new_size.div_ceil(layout.capacity);
        if num_blocks > MAX_BLOCKS {
            return Err(IndexError::HeaderFull { max: MAX_BLOCKS });
        }

        let entries = self.live_entries(&layout)?;
        let grown = TableLayout {
            size: new_size,
            capacity: layout.capacity,
            block_page_ids: allocate_blocks(&self.bpm, num_blocks)?,
        };
        if let Err(err) = self.rehash(&grown, &entries) {
            release_pages(&self.bpm, &grown.block_page_ids);
            return Err(err);
        }

        {
            let mut view = HashTableHeaderPage::new(header.data_mut());
            view.set_size(new_size);
            view.reset_blocks();
            for &page_id in &grown.block_page_ids {
                view.add_block_page_id(page_id)?;
            }
        }
        release_pages(&self.bpm, &layout.block_page_ids);

        debug!(
            "resized hash table {} from {} to {} slots, rehashed {} entries",
            self.header_page_id,
            layout.size,
            new_size,
            entries.len()
        );
        Ok(())
    }

    fn rehash(&self, layout: &TableLayout, entries: &[(K, V)]) -> IndexResult<()> {
        for (key, value) in entries {
            if let InsertOutcome::Full = self.try_insert(layout, key, value)? {
                return Err(IndexError::TableFull);
            }
        }
        Ok(())
    }

    fn live_entries(&self, layout: &TableLayout) -> IndexResult<Vec<(K, V)>> {
        let mut entries = Vec::new();
        for &page_id in &layout.block_page_ids {
            let block = Pinned::fetch(&self.bpm, page_id)?;
            let page = block.read();
            let view = HashTableBlockPage::<_, K, V>::new(page.data());
            entries.extend(
                (0..layout.capacity)
                    .filter(|&offset| view.is_readable(offset))
                    .map(|offset| (view.key_at(offset), view.value_at(offset))),
            );
        }
        Ok(entries)
    }
}
