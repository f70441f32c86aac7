//! Process-unique transaction identity.
//!
//! Identity is keyed by this value, not by thread, because a single
//! transaction may be driven from multiple threads over its lifetime.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub(crate) u64);

impl TransactionId {
    /// Mint a new, never-before-seen transaction id.
    pub fn new() -> Self {
        TransactionId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Reconstruct a transaction id read back from the log. Never used to
    /// mint a fresh id -- that is `new()`'s job alone.
    pub(crate) fn from_raw(raw: u64) -> Self {
        TransactionId(raw)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx_{}", self.0)
    }
}
