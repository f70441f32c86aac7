use heapdb::{Config, Database, RecordId, Tuple, TupleDesc};

/// A fresh database rooted in its own temp directory, with one
/// two-int-column table already registered -- one helper every test
/// starts from, instead of repeating log-init and table-creation
/// boilerplate.
pub struct Harness {
    pub db: Database,
    pub table_id: u32,
    _dir: tempfile::TempDir,
}

pub fn setup() -> Harness {
    heapdb::utils::init_logging();
    let dir = tempfile::tempdir().unwrap();
    let config = Config::default();
    let db = Database::new(dir.path().join("log.bin"), config).unwrap();
    let table_id = 0;
    db.create_table(table_id, dir.path().join("t0.tbl"), TupleDesc::ints(2))
        .unwrap();
    Harness {
        db,
        table_id,
        _dir: dir,
    }
}

pub fn insert(h: &Harness, a: i32, b: i32) -> RecordId {
    let tx = heapdb::Transaction::begin(&h.db).unwrap();
    let mut tuple = Tuple::new(TupleDesc::ints(2), vec![a, b]);
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
    tx.commit(&h.db).unwrap();
    rid
}
