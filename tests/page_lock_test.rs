mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use heapdb::page_lock::PageLockTable;
use heapdb::permissions::LockMode;
use heapdb::{Config, PageId, TransactionId};

fn fast_timeout_config() -> Config {
    Config {
        lock_timeout_floor_ms: 30,
        lock_timeout_jitter_ms: 0,
        lock_poll_interval_ms: 5,
        ..Config::default()
    }
}

#[test]
fn two_readers_proceed_concurrently() {
    let table = Arc::new(PageLockTable::new());
    let page = PageId::new(1, 0);
    let cfg = fast_timeout_config();

    let t1 = TransactionId::new();
    let t2 = TransactionId::new();

    table.acquire(t1, page, LockMode::Shared, &cfg).unwrap();
    table.acquire(t2, page, LockMode::Shared, &cfg).unwrap();

    assert!(table.holds(t1, page));
    assert!(table.holds(t2, page));
}

#[test]
fn writer_blocks_a_reader_until_the_writer_commits() {
    let table = Arc::new(PageLockTable::new());
    let page = PageId::new(1, 0);
    let cfg = Config {
        lock_timeout_floor_ms: 2000,
        lock_timeout_jitter_ms: 0,
        lock_poll_interval_ms: 10,
        ..Config::default()
    };

    let writer = TransactionId::new();
    table.acquire(writer, page, LockMode::Exclusive, &cfg).unwrap();

    let reader_table = Arc::clone(&table);
    let reader = TransactionId::new();
    let reader_cfg = cfg.clone();
    let handle = thread::spawn(move || reader_table.acquire(reader, page, LockMode::Shared, &reader_cfg));

    thread::sleep(Duration::from_millis(50));
    table.release_all(writer);

    assert!(handle.join().unwrap().is_ok());
    assert!(table.holds(reader, page));
}

#[test]
fn blocked_waiter_times_out_and_aborts() {
    let table = PageLockTable::new();
    let page = PageId::new(1, 0);
    let cfg = fast_timeout_config();

    let writer = TransactionId::new();
    let reader = TransactionId::new();
    table.acquire(writer, page, LockMode::Exclusive, &cfg).unwrap();

    let err = table.acquire(reader, page, LockMode::Shared, &cfg).unwrap_err();
    assert!(err.is_retryable());
}
