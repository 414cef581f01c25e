use rusqlite::{OptionalExtension, params};
use tracker_core::{SessionRecord, SessionSource};

use crate::Db;
use crate::error::Result;
use crate::helpers::{SESSION_FACT_COLUMNS, now_rfc3339, row_to_session_record, to_sql_i64};

impl Db {
    /// Upserts one session into the rollup and fact tables. Returns `false`
    /// when the record is noise and was skipped.
    pub fn upsert_session(&mut self, record: &SessionRecord) -> Result<bool> {
        Ok(self.upsert_sessions(std::slice::from_ref(record))? == 1)
    }

    pub fn upsert_sessions(&mut self, records: &[SessionRecord]) -> Result<usize> {
        let ingested_at = now_rfc3339();
        let tx = self.conn.transaction()?;
        let mut written = 0usize;
        {
            let mut rollup = tx.prepare(
                r#"
                INSERT INTO session_rollup (
                  source, session_id, agent_id, label, model, updated_at,
                  input_tokens, output_tokens, total_tokens
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(source, session_id) DO UPDATE SET
                  agent_id = excluded.agent_id,
                  label = excluded.label,
                  model = excluded.model,
                  updated_at = excluded.updated_at,
                  input_tokens = excluded.input_tokens,
                  output_tokens = excluded.output_tokens,
                  total_tokens = excluded.total_tokens
                "#,
            )?;
            let mut fact = tx.prepare(
                r#"
                INSERT INTO session_fact (
                  source, session_id, agent_id, label, model, updated_at,
                  input_tokens, output_tokens, total_tokens, input_query,
                  source_path, ingested_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                ON CONFLICT(source, session_id) DO UPDATE SET
                  agent_id = excluded.agent_id,
                  label = COALESCE(NULLIF(excluded.label, ''), session_fact.label),
                  model = excluded.model,
                  updated_at = excluded.updated_at,
                  input_tokens = excluded.input_tokens,
                  output_tokens = excluded.output_tokens,
                  total_tokens = excluded.total_tokens,
                  input_query = COALESCE(NULLIF(excluded.input_query, ''), session_fact.input_query),
                  source_path = COALESCE(NULLIF(excluded.source_path, ''), session_fact.source_path),
                  ingested_at = excluded.ingested_at
                "#,
            )?;
            for record in records {
                if record.is_noise() {
                    tracing::debug!(
                        source = %record.source,
                        session_id = %record.session_id,
                        "skipping noise session"
                    );
                    continue;
                }
                rollup.execute(params![
                    record.source.as_str(),
                    record.session_id,
                    record.agent_id,
                    record.label,
                    record.model,
                    record.updated_at,
                    to_sql_i64(record.usage.input_tokens),
                    to_sql_i64(record.usage.output_tokens),
                    to_sql_i64(record.usage.total_tokens),
                ])?;
                fact.execute(params![
                    record.source.as_str(),
                    record.session_id,
                    record.agent_id,
                    record.label,
                    record.model,
                    record.updated_at,
                    to_sql_i64(record.usage.input_tokens),
                    to_sql_i64(record.usage.output_tokens),
                    to_sql_i64(record.usage.total_tokens),
                    record.input_query,
                    record.source_path,
                    ingested_at,
                ])?;
                written += 1;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    pub fn get_session(
        &self,
        source: SessionSource,
        session_id: &str,
    ) -> Result<Option<SessionRecord>> {
        let sql = format!(
            "SELECT {SESSION_FACT_COLUMNS} FROM session_fact WHERE source = ?1 AND session_id = ?2"
        );
        Ok(self
            .conn
            .query_row(
                &sql,
                params![source.as_str(), session_id],
                row_to_session_record,
            )
            .optional()?)
    }

    /// Every non-noise fact, oldest first.
    pub fn list_session_facts(&self) -> Result<Vec<SessionRecord>> {
        let sql = format!(
            r#"
            SELECT {SESSION_FACT_COLUMNS}
            FROM session_fact
            WHERE NOT (input_tokens = 0 AND output_tokens = 0 AND total_tokens = 0 AND model = 'Unknown')
            ORDER BY updated_at ASC, source ASC, session_id ASC
            "#
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_session_record)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn recent_session_facts(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        let sql = format!(
            r#"
            SELECT {SESSION_FACT_COLUMNS}
            FROM session_fact
            WHERE NOT (input_tokens = 0 AND output_tokens = 0 AND total_tokens = 0 AND model = 'Unknown')
            ORDER BY updated_at DESC, source ASC, session_id ASC
            LIMIT ?1
            "#
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![to_sql_i64(limit as u64)], row_to_session_record)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn count_session_facts(&self) -> Result<u64> {
        self.count_rows("session_fact")
    }

    pub fn count_session_rollups(&self) -> Result<u64> {
        self.count_rows("session_rollup")
    }

    pub(crate) fn count_rows(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {table}");
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
