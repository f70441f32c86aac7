//! Process-lifetime configuration.
//!
//! Page size is fixed once a `Config` is built and handed to
//! `Database::new` -- there is deliberately no setter to change it
//! afterwards, since every page already on disk was laid out for the
//! size in force when it was written.

#[derive(Debug, Clone)]
pub struct Config {
    /// Bytes per page, including the slot bitmap header. Default: 4096.
    pub page_size: usize,

    /// Maximum number of pages the buffer pool holds at once.
    pub buffer_pool_capacity: usize,

    /// Lock-wait deadline floor in milliseconds (default 50ms).
    pub lock_timeout_floor_ms: u64,

    /// Lock-wait deadline jitter range in milliseconds, added on top of
    /// the floor (default 400ms).
    pub lock_timeout_jitter_ms: u64,

    /// How often a blocked acquire rechecks its grant condition.
    pub lock_poll_interval_ms: u64,
}

pub const DEFAULT_PAGE_SIZE: usize = 4096;

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            buffer_pool_capacity: 50,
            lock_timeout_floor_ms: 50,
            lock_timeout_jitter_ms: 400,
            lock_poll_interval_ms: 100,
        }
    }
}

/// A handful of named setters culminating in `build()`.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.config.page_size = page_size;
        self
    }

    pub fn buffer_pool_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_pool_capacity = capacity;
        self
    }

    pub fn lock_timeout(mut self, floor_ms: u64, jitter_ms: u64) -> Self {
        self.config.lock_timeout_floor_ms = floor_ms;
        self.config.lock_timeout_jitter_ms = jitter_ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
