//! `Database`: the process-wide handle gluing the catalog, buffer pool,
//! and log manager together.
//!
//! An optional process-global instance is available via `install_global`/
//! `global`, backed by `once_cell`, but callers normally hold a `Database`
//! directly and pass it to `Transaction::begin` rather than reaching
//! through a global -- tests in particular want one fresh, isolated
//! `Database` per `tempfile` directory rather than one shared global.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use once_cell::sync::OnceCell;

use crate::buffer_pool::BufferPool;
use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::DbResult;
use crate::log::LogManager;
use crate::recovery::RecoveryManager;
use crate::tuple::TupleDesc;

static GLOBAL: OnceCell<Database> = OnceCell::new();

pub struct Database {
    config: Config,
    catalog: Mutex<Catalog>,
    buffer_pool: BufferPool,
    log_manager: LogManager,
    log_path: PathBuf,
}

impl Database {
    /// Open (or create) a database rooted at `log_path` for its WAL file.
    /// Tables are registered afterwards via `create_table`.
    pub fn new(log_path: impl AsRef<Path>, config: Config) -> DbResult<Self> {
        let log_manager = LogManager::open(&log_path, config.page_size)?;
        Ok(Self {
            buffer_pool: BufferPool::new(config.buffer_pool_capacity),
            catalog: Mutex::new(Catalog::new()),
            log_manager,
            log_path: log_path.as_ref().to_path_buf(),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }

    pub fn log_manager(&self) -> &LogManager {
        &self.log_manager
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Register a table's backing heap file under `table_id`.
    pub fn create_table(&self, table_id: u32, path: impl AsRef<Path>, tuple_desc: TupleDesc) -> DbResult<()> {
        self.catalog
            .lock()
            .unwrap()
            .add_table(table_id, path, tuple_desc, self.config.page_size)
    }

    /// Run ARIES analysis/redo/undo against the WAL written so far. Call
    /// once at process start, before any transaction begins.
    pub fn recover(&self) -> DbResult<()> {
        RecoveryManager::new(&self.log_manager, &self.buffer_pool).recover(&self.locked_catalog())
    }

    /// Snapshot every transaction still holding a dirty page and write a
    /// checkpoint bounding how far back a future recovery's redo pass
    /// must scan.
    pub fn checkpoint(&self) -> DbResult<u64> {
        let active = self.buffer_pool.live_transactions();
        self.log_manager.checkpoint(&active)
    }

    fn locked_catalog(&self) -> std::sync::MutexGuard<'_, Catalog> {
        self.catalog.lock().unwrap()
    }

    pub fn catalog(&self) -> std::sync::MutexGuard<'_, Catalog> {
        self.locked_catalog()
    }

    /// Install this `Database` as the process-wide instance. Optional:
    /// most call sites, and every test, thread a `&Database` explicitly
    /// instead.
    pub fn install_global(self) -> Result<(), Database> {
        GLOBAL.set(self)
    }

    pub fn global() -> &'static Database {
        GLOBAL.get().expect("Database::install_global was never called")
    }
}
