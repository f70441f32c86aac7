//! `Transaction`: a thin handle wrapping a `TransactionId`, with
//! `commit`/`abort` delegating to the buffer pool and log manager owned
//! by the database.

use crate::database::Database;
use crate::error::DbResult;
use crate::transaction_id::TransactionId;

pub struct Transaction {
    id: TransactionId,
    finished: bool,
}

impl Transaction {
    /// Begin a new transaction: mint an id and write its START record.
    pub fn begin(db: &Database) -> DbResult<Self> {
        let id = TransactionId::new();
        db.log_manager().log_start(id)?;
        Ok(Self {
            id,
            finished: false,
        })
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Commit: stop attributing this transaction's dirty pages to it,
    /// write + force the COMMIT record, release all locks.
    pub fn commit(mut self, db: &Database) -> DbResult<()> {
        db.buffer_pool().commit(self.id, db.log_manager())?;
        self.finished = true;
        Ok(())
    }

    /// Abort: undo this transaction's writes through the WAL, drop cached
    /// copies of touched pages, write the ABORT record, release all locks.
    pub fn abort(mut self, db: &Database) -> DbResult<()> {
        db.buffer_pool()
            .abort(self.id, &db.catalog(), db.log_manager())?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.finished {
            log::error!(
                "{} dropped without commit or abort -- locks leaked until process exit",
                self.id
            );
        }
    }
}
