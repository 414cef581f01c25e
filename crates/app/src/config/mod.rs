use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use ingest::{DEFAULT_RETENTION_DAYS, IngestOptions};
use serde::{Deserialize, Serialize};
use tracker_core::{DEFAULT_QUERY_MAX_CHARS, DashboardLimits};

pub const DEFAULT_CACHE_TTL_MS: u64 = 5_000;

/// Everything a tracker instance needs to ingest and serve dashboards.
/// A `None` root disables that source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub openclaw_root: Option<PathBuf>,
    pub codex_root: Option<PathBuf>,
    pub retention_days: u32,
    pub cache_ttl_ms: u64,
    pub limits: DashboardLimits,
}

impl AppConfig {
    /// Defaults for everything except the database location.
    pub fn new(db_path: PathBuf) -> Self {
        Self {
            db_path,
            openclaw_root: Some(ingest::default_openclaw_home()),
            codex_root: Some(ingest::default_codex_home()),
            retention_days: DEFAULT_RETENTION_DAYS,
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
            limits: DashboardLimits::default(),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::milliseconds(i64::try_from(self.cache_ttl_ms).unwrap_or(i64::MAX))
    }

    pub fn ingest_options(&self, now: DateTime<Utc>) -> IngestOptions {
        IngestOptions {
            openclaw_root: self.openclaw_root.clone(),
            codex_root: self.codex_root.clone(),
            retention_days: self.retention_days,
            query_max_chars: DEFAULT_QUERY_MAX_CHARS,
            now,
        }
    }
}
