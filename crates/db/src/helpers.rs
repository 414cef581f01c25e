use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use tracker_core::{SessionRecord, SessionSource, TokenCounts};

use crate::error::DbError;

pub(crate) const SESSION_FACT_COLUMNS: &str = "source, session_id, agent_id, label, model, updated_at, \
     input_tokens, output_tokens, total_tokens, input_query, source_path";

pub(crate) fn parse_source(index: usize, raw: String) -> rusqlite::Result<SessionSource> {
    SessionSource::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            Type::Text,
            Box::new(DbError::UnknownSource(raw)),
        )
    })
}

pub(crate) fn non_negative_u64(row: &Row<'_>, index: usize) -> rusqlite::Result<u64> {
    Ok(u64::try_from(row.get::<_, i64>(index)?).unwrap_or(0))
}

/// SQLite integers are signed; larger counters saturate.
pub(crate) fn to_sql_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Maps a row selected with [`SESSION_FACT_COLUMNS`].
pub(crate) fn row_to_session_record(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    Ok(SessionRecord {
        source: parse_source(0, row.get(0)?)?,
        session_id: row.get(1)?,
        agent_id: row.get(2)?,
        label: row.get(3)?,
        model: row.get(4)?,
        updated_at: row.get(5)?,
        usage: TokenCounts {
            input_tokens: non_negative_u64(row, 6)?,
            output_tokens: non_negative_u64(row, 7)?,
            total_tokens: non_negative_u64(row, 8)?,
        },
        input_query: row.get(9)?,
        source_path: row.get(10)?,
    })
}

pub(crate) fn now_rfc3339() -> String {
    format_ts(Utc::now())
}

pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
