mod support;

use support::{codex, setup_db};
use tracker_db::Db;

#[test]
fn migrate_creates_all_tables() {
    let test_db = setup_db();
    let tables = test_db.db.table_names().expect("tables");
    for table in [
        "daily_token_bucket",
        "ingest_file_state",
        "session_fact",
        "session_rollup",
    ] {
        assert!(tables.iter().any(|name| name == table), "missing {table}");
    }
}

#[test]
fn migrate_is_idempotent_and_keeps_rows() {
    let mut test_db = setup_db();
    test_db
        .db
        .upsert_session(&codex("s1", "2026-02-18T01:00:00.000Z", "gpt-5", 10, 5))
        .expect("upsert");
    drop(test_db.db);

    let mut db = Db::open(&test_db.path).expect("reopen");
    db.migrate().expect("migrate again");
    assert_eq!(db.count_session_facts().expect("count"), 1);
}
