use serde::Serialize;

/// Summary of one ingestion pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStats {
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub files_ingested: usize,
    pub sessions_upserted: usize,
    pub registry_upserts: usize,
    pub noise_skipped: usize,
    pub rows_pruned: usize,
    pub buckets_rebuilt: usize,
    pub issues: Vec<IngestIssue>,
}

/// Non-fatal issues encountered during ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestIssue {
    pub file_path: String,
    pub message: String,
}

impl IngestIssue {
    pub fn new(file_path: impl Into<String>, message: impl ToString) -> Self {
        let issue = Self {
            file_path: file_path.into(),
            message: message.to_string(),
        };
        tracing::warn!(path = %issue.file_path, error = %issue.message, "ingest issue");
        issue
    }
}

/// Errors emitted by the ingest pipeline.
#[derive(Debug)]
pub enum IngestError {
    Db(tracker_db::DbError),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "db error: {}", err),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
        }
    }
}

impl From<tracker_db::DbError> for IngestError {
    fn from(err: tracker_db::DbError) -> Self {
        Self::Db(err)
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
