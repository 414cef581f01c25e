use rusqlite::{OptionalExtension, params};
use tracker_core::{IngestFileState, SessionSource};

use crate::Db;
use crate::error::Result;
use crate::helpers::{non_negative_u64, parse_source, to_sql_i64};

impl Db {
    pub fn get_file_state(
        &self,
        source: SessionSource,
        file_path: &str,
    ) -> Result<Option<IngestFileState>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT source, file_path, mtime_ms, size_bytes, last_ingested_at
                FROM ingest_file_state
                WHERE source = ?1 AND file_path = ?2
                "#,
                params![source.as_str(), file_path],
                |row| {
                    Ok(IngestFileState {
                        source: parse_source(0, row.get(0)?)?,
                        file_path: row.get(1)?,
                        mtime_ms: row.get(2)?,
                        size_bytes: non_negative_u64(row, 3)?,
                        last_ingested_at: row.get(4)?,
                    })
                },
            )
            .optional()?)
    }

    /// True when the file was never recorded or its stat changed since.
    pub fn should_ingest(
        &self,
        source: SessionSource,
        file_path: &str,
        mtime_ms: i64,
        size_bytes: u64,
    ) -> Result<bool> {
        Ok(match self.get_file_state(source, file_path)? {
            Some(state) => state.mtime_ms != mtime_ms || state.size_bytes != size_bytes,
            None => true,
        })
    }

    pub fn record_file_state(&self, state: &IngestFileState) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO ingest_file_state (
              source, file_path, mtime_ms, size_bytes, last_ingested_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(source, file_path) DO UPDATE SET
              mtime_ms = excluded.mtime_ms,
              size_bytes = excluded.size_bytes,
              last_ingested_at = excluded.last_ingested_at
            "#,
            params![
                state.source.as_str(),
                state.file_path,
                state.mtime_ms,
                to_sql_i64(state.size_bytes),
                state.last_ingested_at,
            ],
        )?;
        Ok(())
    }

    pub fn count_file_states(&self) -> Result<u64> {
        self.count_rows("ingest_file_state")
    }
}
