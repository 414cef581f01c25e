use chrono::{DateTime, Utc};
use ingest::{IngestStats, Registry};

use crate::error::Result;
use crate::services::{SharedConfig, open_db};

#[derive(Clone)]
pub struct IngestService {
    config: SharedConfig,
}

impl IngestService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    pub fn run(&self) -> Result<IngestStats> {
        self.run_at(Utc::now())
    }

    /// One pass with `now` as the retention reference. Registry problems are
    /// reported alongside the pass's own issues.
    pub fn run_at(&self, now: DateTime<Utc>) -> Result<IngestStats> {
        let (registry, mut issues) = match self.config.openclaw_root.as_deref() {
            Some(root) => {
                let load = ingest::load_registry(root);
                (load.registry, load.issues)
            }
            None => (Registry::default(), Vec::new()),
        };
        let mut db = open_db(&self.config)?;
        let options = self.config.ingest_options(now);
        let mut stats = ingest::ingest_sessions(&mut db, &options, &registry)?;
        issues.append(&mut stats.issues);
        stats.issues = issues;
        Ok(stats)
    }
}
