//! Error kinds.
//!
//! Every caller needs to react differently to a lock timeout (retry the
//! transaction) than to an I/O fault (fatal) or a malformed request
//! (programmer error), so these are split into a `thiserror`-derived enum
//! rather than one stringly-typed error.

use crate::page_id::PageId;
use crate::transaction_id::TransactionId;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Lock acquisition exceeded its randomized deadline. Always
    /// recoverable: the caller should invoke `transaction_complete(tid,
    /// commit=false)` and may retry the transaction from scratch.
    #[error("transaction {tid} aborted waiting for lock on {page_id}")]
    TxnAborted {
        tid: TransactionId,
        page_id: PageId,
    },

    /// I/O failure reading or writing a page or the log file.
    #[error("storage fault on {context}: {source}")]
    StorageFault {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Mismatched tuple descriptor, bad field type, or similar.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// Wrong tableId for a page, read beyond EOF, misuse of a closed
    /// iterator. Programmer error.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl DbError {
    pub fn storage_fault(context: impl Into<String>, source: std::io::Error) -> Self {
        DbError::StorageFault {
            context: context.into(),
            source,
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        DbError::InvalidRequest(msg.into())
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        DbError::SchemaViolation(msg.into())
    }

    /// True for errors a caller can recover from by aborting and retrying
    /// the transaction, as opposed to a fatal storage fault.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::TxnAborted { .. })
    }
}

pub type DbResult<T> = Result<T, DbError>;
