#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("unknown session source: {0}")]
    UnknownSource(String),
}

pub type Result<T> = std::result::Result<T, DbError>;
