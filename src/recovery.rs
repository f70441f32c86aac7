//! ARIES-style crash recovery: analysis, redo, and undo as three distinct
//! passes over the write-ahead log.
//!
//! - Analysis: seeded from the last completed checkpoint (if any) --
//!   `redoStart` is the earliest record any checkpointed-live transaction
//!   still needs, or the start of the log if there has never been a
//!   checkpoint -- then scans forward from there to EOF, classifying each
//!   transaction into `liveTxns` (STARTed, never COMMITted/ABORTed) or
//!   `committedTxns`.
//! - Redo: a second forward scan over the same range, reapplying an
//!   UPDATE's after-image only when its transaction is in `committedTxns`
//!   -- an uncommitted transaction's writes are left for undo instead.
//! - Undo: a single reverse scan over the whole log (`LogManager::
//!   rollback`) restoring before-images for every UPDATE whose tid is
//!   still in `liveTxns`, then logging an ABORT for each of them.

use std::collections::HashSet;

use crate::buffer_pool::BufferPool;
use crate::catalog::Catalog;
use crate::error::DbResult;
use crate::log::{LogManager, LogRecord};
use crate::transaction_id::TransactionId;

pub struct RecoveryManager<'a> {
    log_manager: &'a LogManager,
    buffer_pool: &'a BufferPool,
}

impl<'a> RecoveryManager<'a> {
    pub fn new(log_manager: &'a LogManager, buffer_pool: &'a BufferPool) -> Self {
        Self {
            log_manager,
            buffer_pool,
        }
    }

    pub fn recover(&self, catalog: &Catalog) -> DbResult<()> {
        let redo_start = self.redo_start()?;
        let records = self.log_manager.scan_from(redo_start)?;

        let (live, committed) = self.analyze(&records);
        log::info!(
            "recovery analysis: {} live, {} committed, scanning from offset {}",
            live.len(),
            committed.len(),
            redo_start
        );
        self.redo(&records, &committed, catalog)?;
        self.undo(&live, catalog)?;

        Ok(())
    }

    /// The offset the redo/analysis scan must start from: the earliest
    /// record any transaction live at the last completed checkpoint still
    /// needs, or the very first record if there has never been a
    /// checkpoint.
    fn redo_start(&self) -> DbResult<u64> {
        let Some(ckpt_offset) = self.log_manager.last_checkpoint()? else {
            return Ok(self.log_manager.first_record_offset());
        };
        let located = self.log_manager.read_at(ckpt_offset)?;
        let LogRecord::Checkpoint { active } = located.record else {
            return Ok(ckpt_offset);
        };
        Ok(active
            .iter()
            .map(|(_, first_offset)| *first_offset)
            .min()
            .unwrap_or(ckpt_offset))
    }

    /// Classifies every transaction touched by `records` as still live
    /// (STARTed, no matching COMMIT/ABORT) or committed.
    fn analyze(
        &self,
        records: &[crate::log::Located],
    ) -> (HashSet<TransactionId>, HashSet<TransactionId>) {
        let mut live = HashSet::new();
        let mut committed = HashSet::new();
        for located in records {
            match &located.record {
                LogRecord::Start { tid } => {
                    live.insert(*tid);
                }
                LogRecord::Commit { tid } => {
                    live.remove(tid);
                    committed.insert(*tid);
                }
                LogRecord::Abort { tid } => {
                    live.remove(tid);
                    committed.remove(tid);
                }
                _ => {}
            }
        }
        (live, committed)
    }

    fn redo(
        &self,
        records: &[crate::log::Located],
        committed: &HashSet<TransactionId>,
        catalog: &Catalog,
    ) -> DbResult<()> {
        for located in records {
            if let LogRecord::Update {
                tid,
                page_id,
                after_image,
                ..
            } = &located.record
            {
                if !committed.contains(tid) {
                    continue;
                }
                let table = catalog.get_table(page_id.table_id)?;
                table
                    .lock()
                    .unwrap()
                    .write_page_bytes(page_id.page_number, after_image)?;
                self.buffer_pool.discard_page(*page_id);
            }
        }
        Ok(())
    }

    fn undo(&self, losers: &HashSet<TransactionId>, catalog: &Catalog) -> DbResult<()> {
        self.log_manager.rollback(losers, catalog)?;
        for &tid in losers {
            self.log_manager.log_abort(tid)?;
            log::info!("recovery rolled back incomplete {}", tid);
        }
        Ok(())
    }
}
