use chrono::{DateTime, Utc};
use tracker_core::{CachedValue, Dashboard, SessionRecord, build_dashboard};

use crate::error::{AppError, Result};
use crate::services::{IngestService, SharedConfig, open_db};

#[derive(Clone)]
pub struct AnalyticsService {
    config: SharedConfig,
    ingest: IngestService,
}

impl AnalyticsService {
    pub(super) fn new(config: SharedConfig, ingest: IngestService) -> Self {
        Self { config, ingest }
    }

    /// Returns `cache` while it is fresher than the configured TTL. Otherwise
    /// runs one ingestion pass and rebuilds the dashboard.
    pub fn dashboard(
        &self,
        cache: Option<&CachedValue<Dashboard>>,
        now: DateTime<Utc>,
    ) -> Result<CachedValue<Dashboard>> {
        if let Some(cached) = cache
            && !cached.is_stale(now, self.config.cache_ttl())
        {
            tracing::debug!(computed_at = %cached.computed_at, "dashboard cache hit");
            return Ok(cached.clone());
        }
        self.ingest.run_at(now)?;
        Ok(CachedValue::new(self.build(now)?, now))
    }

    /// Dashboard over the stored facts, without ingesting first.
    pub fn build(&self, now: DateTime<Utc>) -> Result<Dashboard> {
        let db = open_db(&self.config)?;
        let facts = db.list_session_facts()?;
        let mut dashboard = build_dashboard(&facts, &self.config.limits, now);
        dashboard.coverage = db.coverage()?;
        Ok(dashboard)
    }

    pub fn sessions(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        if limit == 0 {
            return Err(AppError::InvalidInput(
                "limit must be greater than zero".to_string(),
            ));
        }
        let db = open_db(&self.config)?;
        Ok(db.recent_session_facts(limit)?)
    }
}
