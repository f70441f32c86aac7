//! Buffer pool: cached pages, the STEAL/NO-FORCE write-back policy, and
//! the `insert_tuple`/`delete_tuple`/`read_page` surface transactions use
//! to touch table data.
//!
//! Every page lookup acquires the appropriate lock before the cache is
//! consulted. STEAL means a dirty page can be written back to disk before
//! its transaction commits (on eviction, or at a checkpoint); NO-FORCE
//! means commit itself never flushes -- a committed page's bytes ride out
//! to disk whenever eviction or a checkpoint next touches it.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::DbResult;
use crate::heap_page::HeapPageLayout;
use crate::log::LogManager;
use crate::page::Page;
use crate::page_id::PageId;
use crate::page_lock::PageLockTable;
use crate::permissions::Permission;
use crate::transaction_id::TransactionId;
use crate::tuple::{RecordId, Tuple};

struct CachedPage {
    page: Page,
    /// Live bytes differ from what is on disk and must be written back
    /// before this slot can be reused or discarded. Distinct from
    /// `Page::is_dirty`, which tracks *which active transaction* owns the
    /// uncommitted change -- STEAL lets a page stay disk-dirty even after
    /// its transaction commits, until NO-FORCE's lazy write-back catches up.
    needs_flush: bool,
}

pub struct BufferPool {
    capacity: usize,
    cache: Mutex<HashMap<PageId, CachedPage>>,
    /// Approximate LRU order: most-recently-touched at the back.
    lru: Mutex<VecDeque<PageId>>,
    touched_by_tx: Mutex<HashMap<TransactionId, HashSet<PageId>>>,
    pub locks: PageLockTable,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            cache: Mutex::new(HashMap::new()),
            lru: Mutex::new(VecDeque::new()),
            touched_by_tx: Mutex::new(HashMap::new()),
            locks: PageLockTable::new(),
        }
    }

    fn touch_lru(&self, page_id: PageId) {
        let mut lru = self.lru.lock().unwrap();
        lru.retain(|p| *p != page_id);
        lru.push_back(page_id);
    }

    fn remember_touch(&self, tid: TransactionId, page_id: PageId) {
        self.touched_by_tx
            .lock()
            .unwrap()
            .entry(tid)
            .or_default()
            .insert(page_id);
    }

    /// Transactions that currently own at least one dirty page -- used by
    /// `Database::checkpoint` to snapshot the live set.
    pub fn live_transactions(&self) -> Vec<TransactionId> {
        self.touched_by_tx.lock().unwrap().keys().copied().collect()
    }

    /// Read a page's current bytes, acquiring the appropriate lock first.
    /// Loads from disk on a cache miss, evicting under STEAL if the pool
    /// is full.
    pub fn read_page(
        &self,
        tid: TransactionId,
        catalog: &Catalog,
        page_id: PageId,
        perm: Permission,
        config: &Config,
        log_manager: &LogManager,
    ) -> DbResult<Vec<u8>> {
        self.locks.acquire(tid, page_id, perm.to_lock_mode(), config)?;
        self.ensure_cached(catalog, page_id, config, log_manager)?;
        let cache = self.cache.lock().unwrap();
        Ok(cache.get(&page_id).unwrap().page.bytes().to_vec())
    }

    fn ensure_cached(
        &self,
        catalog: &Catalog,
        page_id: PageId,
        config: &Config,
        log_manager: &LogManager,
    ) -> DbResult<()> {
        {
            let cache = self.cache.lock().unwrap();
            if cache.contains_key(&page_id) {
                drop(cache);
                self.touch_lru(page_id);
                return Ok(());
            }
        }

        self.evict_if_full(catalog, config, log_manager)?;

        let table = catalog.get_table(page_id.table_id)?;
        let bytes = {
            let mut file = table.lock().unwrap();
            file.read_page_bytes(page_id.page_number)?
        };
        let page = Page::from_disk(page_id, bytes);
        self.cache.lock().unwrap().insert(
            page_id,
            CachedPage {
                page,
                needs_flush: false,
            },
        );
        self.touch_lru(page_id);
        Ok(())
    }

    /// STEAL: evict the least-recently-used page, flushing it to disk
    /// first if its bytes have not been written back yet. The
    /// write-ahead rule is respected by `force`ing the log before the
    /// page write, since every mutation already logged an UPDATE record
    /// synchronously when it happened.
    fn evict_if_full(&self, catalog: &Catalog, config: &Config, log_manager: &LogManager) -> DbResult<()> {
        let victim = {
            let cache = self.cache.lock().unwrap();
            if cache.len() < self.capacity {
                return Ok(());
            }
            let lru = self.lru.lock().unwrap();
            lru.front().copied()
        };
        if let Some(page_id) = victim {
            self.flush_page(catalog, page_id, log_manager)?;
            self.cache.lock().unwrap().remove(&page_id);
            self.lru.lock().unwrap().retain(|p| *p != page_id);
        }
        Ok(())
    }

    fn flush_page(&self, catalog: &Catalog, page_id: PageId, log_manager: &LogManager) -> DbResult<()> {
        let bytes = {
            let cache = self.cache.lock().unwrap();
            match cache.get(&page_id) {
                Some(cached) if cached.needs_flush => cached.page.bytes().to_vec(),
                _ => return Ok(()),
            }
        };
        log_manager.force()?;
        let table = catalog.get_table(page_id.table_id)?;
        table.lock().unwrap().write_page_bytes(page_id.page_number, &bytes)?;
        if let Some(cached) = self.cache.lock().unwrap().get_mut(&page_id) {
            cached.needs_flush = false;
        }
        Ok(())
    }

    fn mutate_page<F>(
        &self,
        tid: TransactionId,
        catalog: &Catalog,
        page_id: PageId,
        config: &Config,
        log_manager: &LogManager,
        mutator: F,
    ) -> DbResult<()>
    where
        F: FnOnce(&mut Vec<u8>),
    {
        self.locks
            .acquire(tid, page_id, crate::permissions::LockMode::Exclusive, config)?;
        self.ensure_cached(catalog, page_id, config, log_manager)?;

        let mut cache = self.cache.lock().unwrap();
        let cached = cache.get_mut(&page_id).unwrap();
        let before = cached.page.bytes().to_vec();
        mutator(cached.page.bytes_mut());
        let after = cached.page.bytes().to_vec();
        cached.page.mark_dirty(tid);
        cached.needs_flush = true;
        drop(cache);

        log_manager.log_update(tid, page_id, &before, &after)?;
        self.remember_touch(tid, page_id);
        self.touch_lru(page_id);
        Ok(())
    }

    /// Insert `tuple` into the first page of `table_id` with a free slot,
    /// allocating a new page if every existing page is full.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        catalog: &Catalog,
        table_id: u32,
        config: &Config,
        log_manager: &LogManager,
        tuple: &mut Tuple,
    ) -> DbResult<RecordId> {
        let table = catalog.get_table(table_id)?;
        let (layout, num_pages) = {
            let file = table.lock().unwrap();
            (*file.layout(), file.num_pages()?)
        };

        for page_number in 0..num_pages as u32 {
            let page_id = PageId::new(table_id, page_number);
            self.locks
                .acquire(tid, page_id, crate::permissions::LockMode::Exclusive, config)?;
            self.ensure_cached(catalog, page_id, config, log_manager)?;
            let has_room = {
                let cache = self.cache.lock().unwrap();
                let bytes = cache.get(&page_id).unwrap().page.bytes();
                layout.find_free_slot(bytes).is_some()
            };
            if has_room {
                let mut assigned = None;
                self.mutate_page(tid, catalog, page_id, config, log_manager, |bytes| {
                    assigned = layout.insert_into_free_slot(bytes, tuple.desc(), page_id, tuple);
                })?;
                return Ok(assigned.expect("checked has_room under the same page lock"));
            }
        }

        let new_page_id = {
            let mut file = table.lock().unwrap();
            file.allocate_page()?
        };
        self.locks
            .acquire(tid, new_page_id, crate::permissions::LockMode::Exclusive, config)?;
        self.ensure_cached(catalog, new_page_id, config, log_manager)?;
        let mut assigned = None;
        self.mutate_page(tid, catalog, new_page_id, config, log_manager, |bytes| {
            assigned = layout.insert_into_free_slot(bytes, tuple.desc(), new_page_id, tuple);
        })?;
        Ok(assigned.expect("freshly allocated page always has room for one tuple"))
    }

    /// Clear `record_id`'s slot bit. The slot's bytes and its `RecordId`
    /// both stay valid after this -- only the presence bit is flipped.
    pub fn delete_tuple(
        &self,
        tid: TransactionId,
        catalog: &Catalog,
        config: &Config,
        log_manager: &LogManager,
        record_id: RecordId,
    ) -> DbResult<()> {
        let table = catalog.get_table(record_id.page_id.table_id)?;
        let layout = *table.lock().unwrap().layout();
        self.mutate_page(tid, catalog, record_id.page_id, config, log_manager, |bytes| {
            layout.delete_slot(bytes, record_id.slot);
        })
    }

    /// Every tuple currently visible on `page_id`, for scans and tests.
    pub fn read_tuples(
        &self,
        tid: TransactionId,
        catalog: &Catalog,
        page_id: PageId,
        config: &Config,
        log_manager: &LogManager,
    ) -> DbResult<Vec<Tuple>> {
        let table = catalog.get_table(page_id.table_id)?;
        let (layout, desc) = {
            let file = table.lock().unwrap();
            (*file.layout(), file.tuple_desc().clone())
        };
        let bytes = self.read_page(tid, catalog, page_id, Permission::ReadOnly, config, log_manager)?;
        Ok(layout.iter_tuples(&bytes, &desc, page_id))
    }

    pub fn layout_for(&self, catalog: &Catalog, table_id: u32) -> DbResult<HeapPageLayout> {
        Ok(*catalog.get_table(table_id)?.lock().unwrap().layout())
    }

    /// Commit path: stop attributing this transaction's dirty pages to it
    /// (their committed bytes become the new before-image) and write the
    /// COMMIT record. NO-FORCE: dirty pages are *not* flushed here -- they
    /// ride out to disk whenever eviction or a checkpoint next touches
    /// them.
    pub fn commit(&self, tid: TransactionId, log_manager: &LogManager) -> DbResult<()> {
        let pages = self.touched_by_tx.lock().unwrap().remove(&tid).unwrap_or_default();
        {
            let mut cache = self.cache.lock().unwrap();
            for page_id in &pages {
                if let Some(cached) = cache.get_mut(page_id) {
                    cached.page.set_before_image();
                    cached.page.mark_clean();
                }
            }
        }
        log_manager.log_commit(tid)?;
        self.locks.release_all(tid);
        Ok(())
    }

    /// Abort path: undo this transaction's writes through the WAL (so
    /// STEAL-evicted pages are fixed up on disk too), then drop any
    /// cached copy so the next reader re-fetches the corrected bytes.
    pub fn abort(&self, tid: TransactionId, catalog: &Catalog, log_manager: &LogManager) -> DbResult<()> {
        let mut losers = HashSet::new();
        losers.insert(tid);
        log_manager.rollback(&losers, catalog)?;

        let pages = self.touched_by_tx.lock().unwrap().remove(&tid).unwrap_or_default();
        {
            let mut cache = self.cache.lock().unwrap();
            for page_id in &pages {
                cache.remove(page_id);
            }
        }
        {
            let mut lru = self.lru.lock().unwrap();
            lru.retain(|p| !pages.contains(p));
        }

        log_manager.log_abort(tid)?;
        self.locks.release_all(tid);
        Ok(())
    }

    /// Drop a specific page from the cache without flushing -- used by
    /// `recovery::RecoveryManager` so a freshly undone/redone on-disk page
    /// is re-read rather than served from a stale cached copy.
    pub fn discard_page(&self, page_id: PageId) {
        self.cache.lock().unwrap().remove(&page_id);
        self.lru.lock().unwrap().retain(|p| *p != page_id);
    }

    pub fn cached_page_count(&self) -> usize {
        self.cache.lock().unwrap().len()
    }
}
