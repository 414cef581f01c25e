mod analytics;
mod ingest;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::Result;
use tracker_db::Db;

pub use self::analytics::AnalyticsService;
pub use self::ingest::IngestService;

type SharedConfig = Arc<AppConfig>;

/// Service registry for app-level operations.
#[derive(Clone)]
pub struct AppServices {
    pub analytics: AnalyticsService,
    pub ingest: IngestService,
}

impl AppServices {
    pub fn new(config: &AppConfig) -> Self {
        let shared = Arc::new(config.clone());
        let ingest = IngestService::new(shared.clone());
        Self {
            analytics: AnalyticsService::new(shared, ingest.clone()),
            ingest,
        }
    }
}

fn open_db(config: &SharedConfig) -> Result<Db> {
    Ok(Db::open(&config.db_path)?)
}
