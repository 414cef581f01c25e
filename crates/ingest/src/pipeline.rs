use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracker_core::{
    DEFAULT_QUERY_MAX_CHARS, IngestFileState, RegistryRecord, SessionRecord, SessionSource,
    reconcile, record_from_registry,
};
use tracker_db::{Db, RetentionCutoff, retention_cutoff};
use walkdir::WalkDir;

use crate::parser::{DecodeContext, format_ts};
use crate::registry::Registry;
use crate::types::{IngestIssue, IngestStats, Result};
use crate::{decoder_for, paths};

pub const DEFAULT_RETENTION_DAYS: u32 = 90;

/// Inputs for one ingestion pass. A `None` root skips that source.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub openclaw_root: Option<PathBuf>,
    pub codex_root: Option<PathBuf>,
    pub retention_days: u32,
    pub query_max_chars: usize,
    pub now: DateTime<Utc>,
}

impl IngestOptions {
    /// Options using the default roots and retention window.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            openclaw_root: Some(paths::default_openclaw_home()),
            codex_root: Some(paths::default_codex_home()),
            retention_days: DEFAULT_RETENTION_DAYS,
            query_max_chars: DEFAULT_QUERY_MAX_CHARS,
            now,
        }
    }
}

struct LogFile {
    source: SessionSource,
    path: PathBuf,
    file_path: String,
    agent_id: Option<String>,
    mtime_ms: i64,
    size_bytes: u64,
}

impl LogFile {
    fn state(&self, now: &str) -> IngestFileState {
        IngestFileState {
            source: self.source,
            file_path: self.file_path.clone(),
            mtime_ms: self.mtime_ms,
            size_bytes: self.size_bytes,
            last_ingested_at: now.to_string(),
        }
    }
}

fn is_log_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|value| value.to_str()),
        Some("jsonl") | Some("ndjson")
    )
}

/// Runs one full pass: changed files, registry reconciliation, retention
/// prune, then the daily-bucket rebuild.
pub fn ingest_sessions(
    db: &mut Db,
    options: &IngestOptions,
    registry: &Registry,
) -> Result<IngestStats> {
    let started = Instant::now();
    let mut stats = IngestStats::default();
    let now = format_ts(options.now);

    let mut files = Vec::new();
    if let Some(root) = options.openclaw_root.as_deref() {
        files.extend(discover_openclaw(root, &mut stats));
    }
    if let Some(root) = options.codex_root.as_deref() {
        files.extend(discover_codex(root, &mut stats));
    }
    files.sort_by(|a, b| {
        a.mtime_ms
            .cmp(&b.mtime_ms)
            .then_with(|| a.file_path.cmp(&b.file_path))
    });

    for file in &files {
        ingest_file(db, file, options, registry, &now, &mut stats)?;
    }

    let cutoff = retention_cutoff(options.now, options.retention_days);
    for entry in registry.entries() {
        let stored = db.get_session(SessionSource::OpenClaw, &entry.session_id)?;
        let Some(base) = stored.or_else(|| registry_only_record(entry, cutoff.as_ref())) else {
            tracing::debug!(
                agent = %entry.agent_id,
                session = %entry.session_id,
                "undated or expired registry entry, skipping"
            );
            continue;
        };
        let merged = reconcile(base, Some(entry));
        if db.upsert_session(&merged)? {
            stats.registry_upserts += 1;
        } else {
            stats.noise_skipped += 1;
        }
    }

    let (cutoff_at, cutoff_day) = match &cutoff {
        Some(cutoff) => (Some(cutoff.at.as_str()), Some(cutoff.day.as_str())),
        None => (None, None),
    };
    stats.rows_pruned = db.prune_sessions(cutoff_at)?.total();
    stats.buckets_rebuilt = db.rebuild_daily_buckets(cutoff_day)?;

    tracing::info!(
        scanned = stats.files_scanned,
        skipped = stats.files_skipped,
        ingested = stats.files_ingested,
        sessions = stats.sessions_upserted,
        registry = stats.registry_upserts,
        noise = stats.noise_skipped,
        pruned = stats.rows_pruned,
        buckets = stats.buckets_rebuilt,
        issues = stats.issues.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "ingest pass complete"
    );
    Ok(stats)
}

/// Registry entries with no stored session need their own `updatedAt`, and
/// it must fall inside the retention window.
fn registry_only_record(
    entry: &RegistryRecord,
    cutoff: Option<&RetentionCutoff>,
) -> Option<SessionRecord> {
    record_from_registry(entry)
        .filter(|record| cutoff.is_none_or(|cutoff| record.updated_at >= cutoff.at))
}

fn ingest_file(
    db: &mut Db,
    file: &LogFile,
    options: &IngestOptions,
    registry: &Registry,
    now: &str,
    stats: &mut IngestStats,
) -> Result<()> {
    if !db.should_ingest(file.source, &file.file_path, file.mtime_ms, file.size_bytes)? {
        stats.files_skipped += 1;
        tracing::debug!(path = %file.file_path, "unchanged, skipping");
        return Ok(());
    }
    let ctx = DecodeContext {
        source_path: file.file_path.clone(),
        agent_id: file.agent_id.clone(),
        fallback_updated_at: DateTime::<Utc>::from_timestamp_millis(file.mtime_ms)
            .map(format_ts)
            .unwrap_or_else(|| now.to_string()),
        query_max_chars: options.query_max_chars,
    };
    let decoded = match decoder_for(file.source).decode_file(&file.path, &ctx) {
        Ok(decoded) => decoded,
        Err(err) => {
            stats.issues.push(IngestIssue::new(file.file_path.clone(), err));
            return Ok(());
        }
    };
    stats.files_ingested += 1;
    match decoded {
        Some(record) => {
            let entry = match (file.source, record.agent_id.as_deref()) {
                (SessionSource::OpenClaw, Some(agent_id)) => {
                    registry.get(agent_id, &record.session_id)
                }
                _ => None,
            };
            let record = reconcile(record, entry);
            if db.upsert_session(&record)? {
                stats.sessions_upserted += 1;
                tracing::debug!(
                    path = %file.file_path,
                    session = %record.session_id,
                    total = record.usage.total_tokens,
                    "upserted session"
                );
            } else {
                stats.noise_skipped += 1;
                tracing::debug!(path = %file.file_path, "noise session skipped");
            }
        }
        None => tracing::debug!(path = %file.file_path, "no session in file"),
    }
    db.record_file_state(&file.state(now))?;
    Ok(())
}

/// `<root>/agents/<agent>/sessions/*.jsonl`
fn discover_openclaw(root: &Path, stats: &mut IngestStats) -> Vec<LogFile> {
    let agents_dir = root.join("agents");
    if !agents_dir.is_dir() {
        return Vec::new();
    }
    let walker = WalkDir::new(&agents_dir)
        .min_depth(3)
        .max_depth(3)
        .follow_links(false);
    collect_files(walker, SessionSource::OpenClaw, stats, |path| {
        let sessions_dir = path.parent()?;
        if sessions_dir.file_name()?.to_str()? != "sessions" || !is_log_path(path) {
            return None;
        }
        let agent_id = sessions_dir.parent()?.file_name()?.to_str()?.to_string();
        Some(Some(agent_id))
    })
}

/// `<root>/sessions/**/*.jsonl`
fn discover_codex(root: &Path, stats: &mut IngestStats) -> Vec<LogFile> {
    let sessions_dir = root.join("sessions");
    if !sessions_dir.is_dir() {
        return Vec::new();
    }
    let walker = WalkDir::new(&sessions_dir).follow_links(false);
    collect_files(walker, SessionSource::Codex, stats, |path| {
        is_log_path(path).then_some(None)
    })
}

/// Walks and stats candidate files. `accept` returns `None` to ignore a path,
/// otherwise the agent id to attach.
fn collect_files(
    walker: WalkDir,
    source: SessionSource,
    stats: &mut IngestStats,
    accept: impl Fn(&Path) -> Option<Option<String>>,
) -> Vec<LogFile> {
    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let file_path = err
                    .path()
                    .map(|path| path.to_string_lossy().to_string())
                    .unwrap_or_else(|| "<unknown>".to_string());
                stats.issues.push(IngestIssue::new(file_path, err));
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(agent_id) = accept(path) else {
            continue;
        };
        stats.files_scanned += 1;
        let file_path = path.to_string_lossy().to_string();
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(err) => {
                stats.files_skipped += 1;
                stats.issues.push(IngestIssue::new(file_path, err));
                continue;
            }
        };
        let mtime_ms = metadata
            .modified()
            .map(|time| DateTime::<Utc>::from(time).timestamp_millis())
            .unwrap_or_default();
        files.push(LogFile {
            source,
            path: path.to_path_buf(),
            file_path,
            agent_id,
            mtime_ms,
            size_bytes: metadata.len(),
        });
    }
    files
}
