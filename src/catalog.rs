//! Table directory: `table_id -> HeapFile`.
//!
//! Handles are `Arc<Mutex<HeapFile>>` rather than a single-threaded
//! `Rc<RefCell<_>>`, since the buffer pool and recovery manager both
//! reach a table's file from whatever thread is running a transaction.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::{DbError, DbResult};
use crate::heap_file::HeapFile;
use crate::tuple::TupleDesc;

#[derive(Default)]
pub struct Catalog {
    tables: HashMap<u32, Arc<Mutex<HeapFile>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or create) a table's backing file and register it under
    /// `table_id`.
    pub fn add_table(
        &mut self,
        table_id: u32,
        path: impl AsRef<Path>,
        tuple_desc: TupleDesc,
        page_size: usize,
    ) -> DbResult<()> {
        let file = HeapFile::open(path, table_id, tuple_desc, page_size)?;
        self.tables.insert(table_id, Arc::new(Mutex::new(file)));
        Ok(())
    }

    pub fn get_table(&self, table_id: u32) -> DbResult<Arc<Mutex<HeapFile>>> {
        self.tables
            .get(&table_id)
            .cloned()
            .ok_or_else(|| DbError::invalid(format!("no table registered with id {}", table_id)))
    }

    pub fn table_ids(&self) -> Vec<u32> {
        self.tables.keys().copied().collect()
    }
}
