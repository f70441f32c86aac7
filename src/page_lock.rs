//! Per-page shared/exclusive lock table.
//!
//! A latch map keyed by `PageId`, with a poll loop that retries acquiring
//! a lock on a short interval. Deadlocks are avoided rather than detected:
//! there is no wait-for-graph, so a cycle of waiters is never found and
//! broken explicitly. Instead every acquire picks a randomized deadline
//! (`floor + rand(0..jitter)`) and the waiter gives up once it elapses.
//! Lock identity is the `TransactionId`, not the holding thread, so a
//! transaction re-entering its own lock, or upgrading shared to exclusive
//! when it is the sole reader, never blocks on itself.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::config::Config;
use crate::error::{DbError, DbResult};
use crate::page_id::PageId;
use crate::permissions::LockMode;
use crate::transaction_id::TransactionId;

#[derive(Debug, Clone)]
enum Holders {
    Shared(HashSet<TransactionId>),
    Exclusive(TransactionId),
}

#[derive(Default)]
pub struct PageLockTable {
    entries: Mutex<HashMap<PageId, Holders>>,
    held_by_tx: Mutex<HashMap<TransactionId, HashSet<PageId>>>,
}

impl PageLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `tid` holds `mode` on `page_id`, or the randomized
    /// deadline elapses. Reentrant: a transaction that already holds a
    /// lock strong enough for `mode` returns immediately.
    pub fn acquire(&self, tid: TransactionId, page_id: PageId, mode: LockMode, config: &Config) -> DbResult<()> {
        let deadline = self.pick_deadline(config);

        loop {
            if self.try_grant(tid, page_id, mode) {
                self.record_held(tid, page_id);
                return Ok(());
            }

            if Instant::now() >= deadline {
                log::debug!("{} timed out waiting for {:?} on {}", tid, mode, page_id);
                return Err(DbError::TxnAborted { tid, page_id });
            }

            std::thread::sleep(Duration::from_millis(config.lock_poll_interval_ms));
        }
    }

    fn pick_deadline(&self, config: &Config) -> Instant {
        let jitter = if config.lock_timeout_jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..config.lock_timeout_jitter_ms)
        };
        Instant::now() + Duration::from_millis(config.lock_timeout_floor_ms + jitter)
    }

    /// Attempt a single, non-blocking grant. Returns `true` if `tid` now
    /// holds `mode` (or stronger) on `page_id`.
    fn try_grant(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> bool {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(&page_id) {
            None => {
                let holders = match mode {
                    LockMode::Shared => Holders::Shared(HashSet::from([tid])),
                    LockMode::Exclusive => Holders::Exclusive(tid),
                };
                entries.insert(page_id, holders);
                true
            }
            Some(Holders::Exclusive(holder)) => *holder == tid,
            Some(Holders::Shared(readers)) => match mode {
                LockMode::Shared => {
                    readers.insert(tid);
                    true
                }
                LockMode::Exclusive => {
                    if readers.len() == 1 && readers.contains(&tid) {
                        entries.insert(page_id, Holders::Exclusive(tid));
                        true
                    } else {
                        false
                    }
                }
            },
        }
    }

    fn record_held(&self, tid: TransactionId, page_id: PageId) {
        self.held_by_tx
            .lock()
            .unwrap()
            .entry(tid)
            .or_default()
            .insert(page_id);
    }

    pub fn holds(&self, tid: TransactionId, page_id: PageId) -> bool {
        match self.entries.lock().unwrap().get(&page_id) {
            Some(Holders::Exclusive(holder)) => *holder == tid,
            Some(Holders::Shared(readers)) => readers.contains(&tid),
            None => false,
        }
    }

    pub fn pages_held_by(&self, tid: TransactionId) -> Vec<PageId> {
        self.held_by_tx
            .lock()
            .unwrap()
            .get(&tid)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Release every lock `tid` holds, on commit or abort.
    pub fn release_all(&self, tid: TransactionId) {
        let pages = self
            .held_by_tx
            .lock()
            .unwrap()
            .remove(&tid)
            .unwrap_or_default();

        let mut entries = self.entries.lock().unwrap();
        for page_id in pages {
            let drop_entry = match entries.get_mut(&page_id) {
                Some(Holders::Exclusive(holder)) if *holder == tid => true,
                Some(Holders::Shared(readers)) => {
                    readers.remove(&tid);
                    readers.is_empty()
                }
                _ => false,
            };
            if drop_entry {
                entries.remove(&page_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> Config {
        Config {
            lock_timeout_floor_ms: 20,
            lock_timeout_jitter_ms: 0,
            lock_poll_interval_ms: 5,
            ..Config::default()
        }
    }

    #[test]
    fn two_readers_do_not_block() {
        let table = PageLockTable::new();
        let page = PageId::new(1, 0);
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        table.acquire(t1, page, LockMode::Shared, &cfg()).unwrap();
        table.acquire(t2, page, LockMode::Shared, &cfg()).unwrap();
        assert!(table.holds(t1, page));
        assert!(table.holds(t2, page));
    }

    #[test]
    fn writer_blocks_reader_until_timeout() {
        let table = PageLockTable::new();
        let page = PageId::new(1, 0);
        let writer = TransactionId::new();
        let reader = TransactionId::new();
        table.acquire(writer, page, LockMode::Exclusive, &cfg()).unwrap();
        let err = table
            .acquire(reader, page, LockMode::Shared, &cfg())
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn reentrant_exclusive_does_not_self_block() {
        let table = PageLockTable::new();
        let page = PageId::new(1, 0);
        let tid = TransactionId::new();
        table.acquire(tid, page, LockMode::Exclusive, &cfg()).unwrap();
        table.acquire(tid, page, LockMode::Exclusive, &cfg()).unwrap();
        table.acquire(tid, page, LockMode::Shared, &cfg()).unwrap();
    }

    #[test]
    fn sole_reader_self_upgrades_to_exclusive() {
        let table = PageLockTable::new();
        let page = PageId::new(1, 0);
        let tid = TransactionId::new();
        table.acquire(tid, page, LockMode::Shared, &cfg()).unwrap();
        table.acquire(tid, page, LockMode::Exclusive, &cfg()).unwrap();
        assert!(table.holds(tid, page));
    }

    #[test]
    fn release_all_frees_page_for_waiters() {
        let table = PageLockTable::new();
        let page = PageId::new(1, 0);
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        table.acquire(t1, page, LockMode::Exclusive, &cfg()).unwrap();
        table.release_all(t1);
        table.acquire(t2, page, LockMode::Exclusive, &cfg()).unwrap();
        assert!(table.holds(t2, page));
    }
}
