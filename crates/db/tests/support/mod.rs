#![allow(dead_code)]

use std::path::PathBuf;

use tempfile::TempDir;
use tracker_core::{SessionRecord, SessionSource, TokenCounts};
use tracker_db::Db;

pub struct TestDb {
    pub _dir: TempDir,
    pub db: Db,
    pub path: PathBuf,
}

pub fn setup_db() -> TestDb {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("test.sqlite");
    let mut db = Db::open(&path).expect("open db");
    db.migrate().expect("migrate db");
    TestDb {
        _dir: dir,
        db,
        path,
    }
}

pub fn make_record(
    source: SessionSource,
    session_id: &str,
    ts: &str,
    model: &str,
    usage: TokenCounts,
) -> SessionRecord {
    SessionRecord {
        source,
        session_id: session_id.to_string(),
        agent_id: None,
        label: None,
        model: model.to_string(),
        updated_at: ts.to_string(),
        usage,
        input_query: None,
        source_path: Some(format!("/logs/{session_id}.jsonl")),
    }
}

pub fn codex(session_id: &str, ts: &str, model: &str, input: u64, output: u64) -> SessionRecord {
    make_record(
        SessionSource::Codex,
        session_id,
        ts,
        model,
        TokenCounts::new(input, output),
    )
}

pub fn openclaw(session_id: &str, ts: &str, model: &str, input: u64, output: u64) -> SessionRecord {
    let mut record = make_record(
        SessionSource::OpenClaw,
        session_id,
        ts,
        model,
        TokenCounts::new(input, output),
    );
    record.agent_id = Some("main".to_string());
    record
}
