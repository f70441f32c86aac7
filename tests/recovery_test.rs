mod common;

use heapdb::{Config, Database, Transaction, Tuple, TupleDesc};

#[test]
fn recovery_undoes_a_transaction_that_never_committed() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("log.bin");
    let table_path = dir.path().join("t0.tbl");
    let config = Config::default();

    // "First process": open the table, start a transaction, log + apply an
    // update, but never commit or abort -- simulating a crash mid-transaction.
    {
        let db = Database::new(&log_path, config.clone()).unwrap();
        db.create_table(0, &table_path, TupleDesc::ints(2)).unwrap();

        let tx = Transaction::begin(&db).unwrap();
        let mut tuple = Tuple::new(TupleDesc::ints(2), vec![42, 43]);
        db.buffer_pool()
            .insert_tuple(tx.id(), &db.catalog(), 0, db.config(), db.log_manager(), &mut tuple)
            .unwrap();
        std::mem::forget(tx); // drop without commit/abort: no ABORT record either
    }

    // "Second process": reopen against the same files and recover.
    let db = Database::new(&log_path, config).unwrap();
    db.create_table(0, &table_path, TupleDesc::ints(2)).unwrap();
    db.recover().unwrap();

    let tx = Transaction::begin(&db).unwrap();
    let table = db.catalog().get_table(0).unwrap();
    let num_pages = table.lock().unwrap().num_pages().unwrap();
    assert!(num_pages >= 1);

    let page_id = heapdb::PageId::new(0, 0);
    let tuples = db
        .buffer_pool()
        .read_tuples(tx.id(), &db.catalog(), page_id, db.config(), db.log_manager())
        .unwrap();
    tx.commit(&db).unwrap();

    assert!(tuples.is_empty(), "uncommitted insert must be undone by recovery");
}

#[test]
fn recovery_preserves_a_committed_transaction() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("log.bin");
    let table_path = dir.path().join("t0.tbl");
    let config = Config::default();

    {
        let db = Database::new(&log_path, config.clone()).unwrap();
        db.create_table(0, &table_path, TupleDesc::ints(2)).unwrap();

        let tx = Transaction::begin(&db).unwrap();
        let mut tuple = Tuple::new(TupleDesc::ints(2), vec![1, 2]);
        db.buffer_pool()
            .insert_tuple(tx.id(), &db.catalog(), 0, db.config(), db.log_manager(), &mut tuple)
            .unwrap();
        tx.commit(&db).unwrap();
    }

    let db = Database::new(&log_path, config).unwrap();
    db.create_table(0, &table_path, TupleDesc::ints(2)).unwrap();
    db.recover().unwrap();

    let tx = Transaction::begin(&db).unwrap();
    let page_id = heapdb::PageId::new(0, 0);
    let tuples = db
        .buffer_pool()
        .read_tuples(tx.id(), &db.catalog(), page_id, db.config(), db.log_manager())
        .unwrap();
    tx.commit(&db).unwrap();

    assert_eq!(tuples.len(), 1);
    assert_eq!(tuples[0].get_field(0), 1);
}
