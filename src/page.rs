//! `Page`: an in-memory page image plus the bookkeeping the buffer pool
//! and recovery manager need around it -- which transaction (if any) has
//! dirtied it, and what its bytes looked like before that write.

use crate::page_id::PageId;
use crate::transaction_id::TransactionId;

#[derive(Debug, Clone)]
pub struct Page {
    id: PageId,
    bytes: Vec<u8>,
    /// Bytes most recently committed (or as last read from disk, if no
    /// committed writer has touched this page yet).
    before_image: Vec<u8>,
    dirtier: Option<TransactionId>,
}

impl Page {
    /// Construct a page freshly read from disk: before-image equals the
    /// bytes just read.
    pub fn from_disk(id: PageId, bytes: Vec<u8>) -> Self {
        let before_image = bytes.clone();
        Self {
            id,
            bytes,
            before_image,
            dirtier: None,
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut Vec<u8> {
        &mut self.bytes
    }

    pub fn before_image(&self) -> &[u8] {
        &self.before_image
    }

    pub fn is_dirty(&self) -> bool {
        self.dirtier.is_some()
    }

    pub fn dirtier(&self) -> Option<TransactionId> {
        self.dirtier
    }

    /// Mark this page as dirtied by `tid`. Idempotent for the same
    /// transaction; a page may only be dirtied by one transaction at a
    /// time because writers hold an exclusive lock.
    pub fn mark_dirty(&mut self, tid: TransactionId) {
        self.dirtier = Some(tid);
    }

    pub fn mark_clean(&mut self) {
        self.dirtier = None;
    }

    /// Commit: live bytes become the new before-image.
    pub fn set_before_image(&mut self) {
        self.before_image = self.bytes.clone();
    }

    /// Abort/rollback: restore live bytes from the before-image. The caller is still
    /// responsible for discarding the page from the cache afterwards so a
    /// later read re-fetches from disk.
    pub fn restore_before_image(&mut self) {
        self.bytes = self.before_image.clone();
    }
}
