mod common;

use heapdb::Transaction;

#[test]
fn committed_insert_is_visible_after_commit() {
    let h = common::setup();
    let rid = common::insert(&h, 7, 9);

    let tx = Transaction::begin(&h.db).unwrap();
    let tuples = h
        .db
        .buffer_pool()
        .read_tuples(
            tx.id(),
            &h.db.catalog(),
            rid.page_id,
            h.db.config(),
            h.db.log_manager(),
        )
        .unwrap();
    tx.commit(&h.db).unwrap();

    assert_eq!(tuples.len(), 1);
    assert_eq!(tuples[0].get_field(0), 7);
    assert_eq!(tuples[0].get_field(1), 9);
}

#[test]
fn aborted_insert_is_rolled_back() {
    let h = common::setup();

    let tx = Transaction::begin(&h.db).unwrap();
    let mut tuple = heapdb::Tuple::new(heapdb::TupleDesc::ints(2), vec![1, 2]);
    let rid = h
        .db
        .buffer_pool()
        .insert_tuple(
            tx.id(),
            &h.db.catalog(),
            h.table_id,
            h.db.config(),
            h.db.log_manager(),
            &mut tuple,
        )
        .unwrap();
    tx.abort(&h.db).unwrap();

    let tx2 = Transaction::begin(&h.db).unwrap();
    let tuples = h
        .db
        .buffer_pool()
        .read_tuples(
            tx2.id(),
            &h.db.catalog(),
            rid.page_id,
            h.db.config(),
            h.db.log_manager(),
        )
        .unwrap();
    tx2.commit(&h.db).unwrap();

    assert!(tuples.is_empty(), "rolled-back insert must not be visible");
}

#[test]
fn insert_across_many_pages_grows_the_file() {
    let h = common::setup();
    let layout = h.db.buffer_pool().layout_for(&h.db.catalog(), h.table_id).unwrap();

    // Fill past one page's worth of slots so the table grows to 2 pages.
    for i in 0..(layout.slot_count as i32 + 1) {
        common::insert(&h, i, i);
    }

    let table = h.db.catalog().get_table(h.table_id).unwrap();
    let num_pages = table.lock().unwrap().num_pages().unwrap();
    assert!(num_pages >= 2, "expected the heap file to grow past one page");
}

#[test]
fn delete_then_reinsert_reuses_the_freed_slot() {
    let h = common::setup();
    let rid = common::insert(&h, 3, 4);

    let tx = Transaction::begin(&h.db).unwrap();
    h.db
        .buffer_pool()
        .delete_tuple(tx.id(), &h.db.catalog(), h.db.config(), h.db.log_manager(), rid)
        .unwrap();
    tx.commit(&h.db).unwrap();

    let rid2 = common::insert(&h, 5, 6);
    assert_eq!(rid2.slot, rid.slot, "freed slot should be reused");
}
