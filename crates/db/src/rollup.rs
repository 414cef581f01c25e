use rusqlite::params;
use tracker_core::{Coverage, DailyTokenBucket, TokenCounts};

use crate::Db;
use crate::error::Result;
use crate::helpers::{non_negative_u64, parse_source};

impl Db {
    /// Regenerates daily buckets from the rollup table.
    ///
    /// Buckets on or before `keep_through_day` are kept as they are; their
    /// sessions may already be pruned. Every later day is truncated and
    /// rebuilt. With `None` the whole table is rebuilt.
    pub fn rebuild_daily_buckets(&mut self, keep_through_day: Option<&str>) -> Result<usize> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM daily_token_bucket WHERE ?1 IS NULL OR day > ?1",
            params![keep_through_day],
        )?;
        let inserted = tx.execute(
            r#"
            INSERT INTO daily_token_bucket (
              day, source, model, input_tokens, output_tokens, total_tokens, session_count
            )
            SELECT substr(updated_at, 1, 10) AS bucket_day, source, model,
                   SUM(input_tokens), SUM(output_tokens), SUM(total_tokens), COUNT(*)
            FROM session_rollup
            WHERE total_tokens > 0
              AND (?1 IS NULL OR substr(updated_at, 1, 10) > ?1)
            GROUP BY bucket_day, source, model
            "#,
            params![keep_through_day],
        )?;
        tx.commit()?;
        tracing::debug!(buckets = inserted, "rebuilt daily token buckets");
        Ok(inserted)
    }

    pub fn daily_buckets(&self) -> Result<Vec<DailyTokenBucket>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT day, source, model, input_tokens, output_tokens, total_tokens, session_count
            FROM daily_token_bucket
            ORDER BY day ASC, source ASC, model ASC
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DailyTokenBucket {
                day: row.get(0)?,
                source: parse_source(1, row.get(1)?)?,
                model: row.get(2)?,
                usage: TokenCounts {
                    input_tokens: non_negative_u64(row, 3)?,
                    output_tokens: non_negative_u64(row, 4)?,
                    total_tokens: non_negative_u64(row, 5)?,
                },
                session_count: non_negative_u64(row, 6)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn coverage(&self) -> Result<Coverage> {
        Ok(self.conn.query_row(
            "SELECT MIN(day), MAX(day), COUNT(*) FROM daily_token_bucket",
            [],
            |row| {
                Ok(Coverage {
                    oldest_day: row.get(0)?,
                    newest_day: row.get(1)?,
                    bucket_count: non_negative_u64(row, 2)?,
                })
            },
        )?)
    }
}
