//! Small helpers with no better home.

use std::sync::Once;

static LOGGING: Once = Once::new();

/// Initialize `env_logger` exactly once. Safe to call from every test;
/// subsequent calls are no-ops.
pub fn init_logging() {
    LOGGING.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}
