use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, TimeZone, Utc};
use ingest::{IngestError, IngestOptions, Registry, ingest_sessions, load_registry};
use tempfile::{TempDir, tempdir};
use tracker_core::{SessionSource, UNKNOWN_MODEL};
use tracker_db::Db;

struct Fixture {
    dir: TempDir,
    db: Db,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().expect("temp dir");
        let mut db = Db::open(dir.path().join("ingest.sqlite")).expect("open db");
        db.migrate().expect("migrate db");
        Self { dir, db }
    }

    fn openclaw_root(&self) -> PathBuf {
        self.dir.path().join("openclaw")
    }

    fn codex_root(&self) -> PathBuf {
        self.dir.path().join("codex")
    }

    fn options(&self, retention_days: u32) -> IngestOptions {
        IngestOptions {
            openclaw_root: Some(self.openclaw_root()),
            codex_root: Some(self.codex_root()),
            retention_days,
            query_max_chars: 1200,
            now: now(),
        }
    }

    fn openclaw_log(&self, name: &str, body: &[u8], age: Duration) -> PathBuf {
        let path = self
            .openclaw_root()
            .join("agents/main/sessions")
            .join(name);
        write_with_age(&path, body, age);
        path
    }

    fn codex_log(&self, name: &str, body: &[u8], age: Duration) -> PathBuf {
        let path = self.codex_root().join("sessions/2026/02/18").join(name);
        write_with_age(&path, body, age);
        path
    }

    fn write_registry(&self, body: &str) {
        let path = self
            .openclaw_root()
            .join("agents/main/sessions/sessions.json");
        fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
        fs::write(path, body).expect("write registry");
    }

    fn registry(&self) -> Registry {
        let load = load_registry(&self.openclaw_root());
        assert!(load.issues.is_empty(), "{:?}", load.issues);
        load.registry
    }

    fn run(&mut self, retention_days: u32, registry: &Registry) -> ingest::IngestStats {
        let options = self.options(retention_days);
        ingest_sessions(&mut self.db, &options, registry).expect("ingest")
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 18, 12, 0, 0).unwrap()
}

fn write_with_age(path: &Path, body: &[u8], age: Duration) {
    fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
    fs::write(path, body).expect("write log");
    let file = File::options().write(true).open(path).expect("open log");
    file.set_modified(SystemTime::now() - age).expect("set mtime");
}

const HOUR: Duration = Duration::from_secs(3600);

#[test]
fn later_file_overwrites_same_session() {
    let mut fx = Fixture::new();
    fx.openclaw_log(
        "s1-a.jsonl",
        br#"{"type":"session","id":"s1","timestamp":"2026-02-18T01:00:00.000Z"}
{"type":"message","timestamp":"2026-02-18T01:01:00.000Z","message":{"role":"assistant","model":"m-old","usage":{"input":3,"output":2}}}
"#,
        2 * HOUR,
    );
    fx.openclaw_log(
        "s1-b.jsonl",
        br#"{"type":"session","id":"s1","timestamp":"2026-02-18T02:00:00.000Z"}
{"type":"message","timestamp":"2026-02-18T02:01:00.000Z","message":{"role":"assistant","model":"m-new","usage":{"input":10,"output":5}}}
{"type":"message","timestamp":"2026-02-18T02:02:00.000Z","message":{"role":"assistant","usage":{"output":5}}}
"#,
        HOUR,
    );

    let stats = fx.run(90, &Registry::default());
    assert_eq!(stats.files_scanned, 2);
    assert_eq!(stats.files_ingested, 2);
    assert_eq!(fx.db.count_session_facts().expect("count"), 1);

    let fact = fx
        .db
        .get_session(SessionSource::OpenClaw, "s1")
        .expect("get")
        .expect("fact");
    assert_eq!(fact.updated_at, "2026-02-18T02:02:00.000Z");
    assert_eq!(fact.usage.input_tokens, 10);
    assert_eq!(fact.usage.output_tokens, 10);
    assert_eq!(fact.usage.total_tokens, 20);
    assert_eq!(fact.model, "m-new");
    assert_eq!(fact.agent_id.as_deref(), Some("main"));
}

#[test]
fn second_pass_is_idempotent() {
    let mut fx = Fixture::new();
    fx.openclaw_log(
        "s1.jsonl",
        br#"{"type":"session","id":"s1","timestamp":"2026-02-18T01:00:00.000Z"}
{"type":"message","message":{"role":"user","content":"deploy the api"}}
{"type":"message","message":{"role":"assistant","model":"m1","usage":{"input":7,"output":3}}}
"#,
        HOUR,
    );
    fx.codex_log(
        "rollout-2026-02-18T03-00-00-0199a1b2-c3d4-7e5f-8a9b-0c1d2e3f4a5b.jsonl",
        br#"{"timestamp":"2026-02-18T03:00:00.000Z","type":"session_meta","payload":{"id":"c1"}}
{"timestamp":"2026-02-18T03:00:01.000Z","type":"turn_context","payload":{"model":"gpt-5"}}
{"timestamp":"2026-02-18T03:00:02.000Z","type":"event_msg","payload":{"type":"token_count","info":{"total_token_usage":{"input_tokens":20,"output_tokens":4,"total_tokens":24}}}}
"#,
        HOUR,
    );

    let first = fx.run(90, &Registry::default());
    assert_eq!(first.sessions_upserted, 2);
    let facts_after_first = fx.db.list_session_facts().expect("facts");
    let buckets_after_first = fx.db.daily_buckets().expect("buckets");

    let second = fx.run(90, &Registry::default());
    assert_eq!(second.files_scanned, 2);
    assert_eq!(second.files_skipped, 2);
    assert_eq!(second.files_ingested, 0);
    assert_eq!(fx.db.list_session_facts().expect("facts"), facts_after_first);
    assert_eq!(fx.db.daily_buckets().expect("buckets"), buckets_after_first);
    assert_eq!(fx.db.count_file_states().expect("states"), 2);
}

#[test]
fn changed_file_is_reingested() {
    let mut fx = Fixture::new();
    let body = br#"{"type":"session","id":"s1","timestamp":"2026-02-18T01:00:00.000Z"}
{"type":"message","message":{"role":"assistant","model":"m1","usage":{"input":1,"output":1}}}
"#;
    let path = fx.openclaw_log("s1.jsonl", body, 2 * HOUR);
    fx.run(90, &Registry::default());

    let mut grown = body.to_vec();
    grown.extend_from_slice(
        br#"{"type":"message","timestamp":"2026-02-18T04:00:00.000Z","message":{"role":"assistant","usage":{"input":4,"output":4}}}
"#,
    );
    write_with_age(&path, &grown, HOUR);
    let stats = fx.run(90, &Registry::default());
    assert_eq!(stats.files_ingested, 1);

    let fact = fx
        .db
        .get_session(SessionSource::OpenClaw, "s1")
        .expect("get")
        .expect("fact");
    assert_eq!(fact.usage.total_tokens, 10);
    assert_eq!(fact.updated_at, "2026-02-18T04:00:00.000Z");
}

#[test]
fn noise_sessions_are_not_stored() {
    let mut fx = Fixture::new();
    fx.openclaw_log(
        "empty.jsonl",
        br#"{"type":"session","id":"empty","timestamp":"2026-02-18T01:00:00.000Z"}
{"type":"message","message":{"role":"user","content":"hello?"}}
"#,
        HOUR,
    );
    let stats = fx.run(90, &Registry::default());
    assert_eq!(stats.noise_skipped, 1);
    assert_eq!(stats.sessions_upserted, 0);
    assert_eq!(fx.db.count_session_facts().expect("count"), 0);
    assert_eq!(fx.db.count_file_states().expect("states"), 1);
    assert!(fx.db.daily_buckets().expect("buckets").is_empty());
}

#[test]
fn malformed_and_invalid_utf8_lines_are_skipped() {
    let mut fx = Fixture::new();
    let mut body = Vec::new();
    body.extend_from_slice(b"{\"type\":\"session\",\"id\":\"s1\",\"timestamp\":\"2026-02-18T01:00:00.000Z\"}\n");
    body.extend_from_slice(b"\xff\xfe\xfd not utf8\n");
    body.extend_from_slice(b"{\"type\":\"message\",\"message\":{\"role\":\n");
    body.extend_from_slice(b"{\"type\":\"message\",\"message\":{\"role\":\"assistant\",\"model\":\"m1\",\"usage\":{\"input\":2,\"output\":3}}}\n");
    body.extend_from_slice(b"{\"type\":\"message\",\"message\":{\"role\":\"assist");
    fx.openclaw_log("s1.jsonl", &body, HOUR);

    let stats = fx.run(90, &Registry::default());
    assert!(stats.issues.is_empty());
    let fact = fx
        .db
        .get_session(SessionSource::OpenClaw, "s1")
        .expect("get")
        .expect("fact");
    assert_eq!(fact.usage.total_tokens, 5);
    assert_eq!(fact.model, "m1");
}

#[test]
fn codex_session_id_falls_back_to_file_name() {
    let mut fx = Fixture::new();
    fx.codex_log(
        "rollout-2026-02-18T05-00-00-0199a1b2-c3d4-7e5f-8a9b-0c1d2e3f4a5b.jsonl",
        br#"{"timestamp":"2026-02-18T05:00:00.000Z","type":"turn_context","payload":{"model":"gpt-5"}}
{"timestamp":"2026-02-18T05:00:01.000Z","type":"event_msg","payload":{"type":"token_count","info":{"total_token_usage":{"input_tokens":9,"output_tokens":1}}}}
"#,
        HOUR,
    );
    fx.run(90, &Registry::default());
    let fact = fx
        .db
        .get_session(SessionSource::Codex, "0199a1b2-c3d4-7e5f-8a9b-0c1d2e3f4a5b")
        .expect("get")
        .expect("fact");
    assert_eq!(fact.usage.total_tokens, 10);
    assert_eq!(fact.agent_id, None);
}

#[test]
fn openclaw_without_session_line_records_nothing() {
    let mut fx = Fixture::new();
    fx.openclaw_log(
        "orphan.jsonl",
        br#"{"type":"message","message":{"role":"assistant","model":"m1","usage":{"input":2,"output":3}}}
"#,
        HOUR,
    );
    let stats = fx.run(90, &Registry::default());
    assert_eq!(stats.files_ingested, 1);
    assert_eq!(fx.db.count_session_facts().expect("count"), 0);
    assert_eq!(fx.db.count_file_states().expect("states"), 1);
}

#[test]
fn registry_metadata_and_positive_counters_win() {
    let mut fx = Fixture::new();
    fx.openclaw_log(
        "s1.jsonl",
        br#"{"type":"session","id":"s1","timestamp":"2026-02-18T01:00:00.000Z"}
{"type":"message","message":{"role":"user","content":"rotate the keys"}}
{"type":"message","message":{"role":"assistant","model":"m-log","usage":{"input":10,"output":7}}}
"#,
        HOUR,
    );
    fx.write_registry(
        r#"{
          "agent:main:s1": {"sessionId": "s1", "model": "m-reg", "label": "Deploy bot", "inputTokens": 500, "outputTokens": 0},
          "agent:main:s2": {"sessionId": "s2", "model": "m-reg", "inputTokens": 40, "outputTokens": 2, "updatedAt": "2026-02-18T08:00:00Z"}
        }"#,
    );
    let registry = fx.registry();
    assert_eq!(registry.len(), 2);

    let stats = fx.run(90, &registry);
    assert_eq!(stats.sessions_upserted, 1);
    assert_eq!(stats.registry_upserts, 2);

    let s1 = fx
        .db
        .get_session(SessionSource::OpenClaw, "s1")
        .expect("get")
        .expect("s1");
    assert_eq!(s1.model, "m-reg");
    assert_eq!(s1.label.as_deref(), Some("Deploy bot"));
    assert_eq!(s1.usage.input_tokens, 500);
    assert_eq!(s1.usage.output_tokens, 7);
    assert_eq!(s1.input_query.as_deref(), Some("rotate the keys"));

    let s2 = fx
        .db
        .get_session(SessionSource::OpenClaw, "s2")
        .expect("get")
        .expect("registry-only session");
    assert_eq!(s2.usage.total_tokens, 42);
    assert_eq!(s2.updated_at, "2026-02-18T08:00:00.000Z");
    assert_eq!(s2.input_query, None);

    let facts = fx.db.list_session_facts().expect("facts");
    let again = fx.run(90, &registry);
    assert_eq!(again.files_skipped, 1);
    assert_eq!(again.registry_upserts, 2);
    assert_eq!(fx.db.list_session_facts().expect("facts"), facts);
}

#[test]
fn registry_advance_updates_unchanged_file() {
    let mut fx = Fixture::new();
    fx.openclaw_log(
        "s1.jsonl",
        br#"{"type":"session","id":"s1","timestamp":"2026-02-18T01:00:00.000Z"}
{"type":"message","message":{"role":"user","content":"summarize the incident"}}
{"type":"message","message":{"role":"assistant","model":"m1","usage":{"input":10,"output":7}}}
"#,
        HOUR,
    );
    fx.write_registry(r#"{"k": {"sessionId": "s1", "inputTokens": 500}}"#);
    let registry = fx.registry();
    fx.run(90, &registry);

    fx.write_registry(
        r#"{"k": {"sessionId": "s1", "inputTokens": 900, "updatedAt": "2026-02-18T09:00:00Z"}}"#,
    );
    let registry = fx.registry();
    let stats = fx.run(90, &registry);
    assert_eq!(stats.files_skipped, 1);

    let fact = fx
        .db
        .get_session(SessionSource::OpenClaw, "s1")
        .expect("get")
        .expect("fact");
    assert_eq!(fact.usage.input_tokens, 900);
    assert_eq!(fact.usage.output_tokens, 7);
    assert_eq!(fact.updated_at, "2026-02-18T09:00:00.000Z");
    assert_eq!(fact.input_query.as_deref(), Some("summarize the incident"));
}

#[test]
fn retention_prunes_sessions_but_keeps_old_buckets() {
    let mut fx = Fixture::new();
    fx.codex_log(
        "rollout-old.jsonl",
        br#"{"timestamp":"2025-10-01T10:00:00.000Z","type":"session_meta","payload":{"id":"old"}}
{"timestamp":"2025-10-01T10:00:01.000Z","type":"event_msg","payload":{"type":"token_count","info":{"total_token_usage":{"input_tokens":30,"output_tokens":3}}}}
"#,
        2 * HOUR,
    );
    fx.codex_log(
        "rollout-new.jsonl",
        br#"{"timestamp":"2026-02-18T10:00:00.000Z","type":"session_meta","payload":{"id":"new"}}
{"timestamp":"2026-02-18T10:00:01.000Z","type":"event_msg","payload":{"type":"token_count","info":{"total_token_usage":{"input_tokens":5,"output_tokens":5}}}}
"#,
        HOUR,
    );

    let first = fx.run(0, &Registry::default());
    assert_eq!(first.rows_pruned, 0);
    assert_eq!(fx.db.count_session_facts().expect("count"), 2);
    assert_eq!(fx.db.daily_buckets().expect("buckets").len(), 2);

    let second = fx.run(90, &Registry::default());
    assert_eq!(second.rows_pruned, 1);
    assert_eq!(fx.db.count_session_facts().expect("count"), 1);
    assert!(
        fx.db
            .get_session(SessionSource::Codex, "old")
            .expect("get")
            .is_none()
    );

    let buckets = fx.db.daily_buckets().expect("buckets");
    let days: Vec<&str> = buckets.iter().map(|bucket| bucket.day.as_str()).collect();
    assert_eq!(days, vec!["2025-10-01", "2026-02-18"]);
    assert_eq!(buckets[0].usage.total_tokens, 33);
    assert_eq!(buckets[0].model, UNKNOWN_MODEL);
    let coverage = fx.db.coverage().expect("coverage");
    assert_eq!(coverage.oldest_day.as_deref(), Some("2025-10-01"));
    assert_eq!(coverage.bucket_count, 2);
}

#[test]
fn registry_does_not_revive_expired_sessions() {
    let mut fx = Fixture::new();
    fx.openclaw_log(
        "old.jsonl",
        br#"{"type":"session","id":"old","timestamp":"2025-10-01T10:00:00.000Z"}
{"type":"message","timestamp":"2025-10-01T10:01:00.000Z","message":{"role":"assistant","model":"m1","usage":{"input":30,"output":3}}}
"#,
        HOUR,
    );
    fx.write_registry(
        r#"{
          "agent:main:old": {"sessionId": "old", "inputTokens": 30, "outputTokens": 3},
          "agent:main:undated": {"sessionId": "undated", "inputTokens": 8, "outputTokens": 1},
          "agent:main:stale": {"sessionId": "stale", "inputTokens": 9, "updatedAt": "2025-10-02T00:00:00Z"}
        }"#,
    );
    let registry = fx.registry();

    let first = fx.run(90, &registry);
    assert_eq!(first.rows_pruned, 1);
    let facts = fx.db.list_session_facts().expect("facts");
    let buckets = fx.db.daily_buckets().expect("buckets");
    assert!(facts.is_empty());

    let second = fx.run(90, &registry);
    assert_eq!(second.files_skipped, 1);
    assert_eq!(second.registry_upserts, 0);
    assert_eq!(second.rows_pruned, 0);
    assert_eq!(fx.db.list_session_facts().expect("facts"), facts);
    assert_eq!(fx.db.daily_buckets().expect("buckets"), buckets);
}

#[test]
fn storage_errors_abort_the_pass() {
    let fx = Fixture::new();
    let mut db = Db::open_in_memory().expect("open db");
    let err = ingest_sessions(&mut db, &fx.options(90), &Registry::default())
        .expect_err("unmigrated db");
    assert!(matches!(err, IngestError::Db(_)));
}

#[test]
fn missing_roots_are_not_errors() {
    let mut fx = Fixture::new();
    let stats = fx.run(90, &Registry::default());
    assert_eq!(stats.files_scanned, 0);
    assert!(stats.issues.is_empty());
}
