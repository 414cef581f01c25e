use chrono::{DateTime, Duration, Utc};
use rusqlite::params;

use crate::Db;
use crate::error::Result;
use crate::helpers::format_ts;

const SESSION_TABLES: [&str; 2] = ["session_fact", "session_rollup"];

/// Fact-table rows removed by one prune.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    pub inactive_rows: usize,
    pub expired_rows: usize,
}

impl PruneStats {
    pub fn total(&self) -> usize {
        self.inactive_rows + self.expired_rows
    }
}

/// Boundary of the retention window.
///
/// Sessions are pruned by `at`; daily buckets are frozen through `day`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionCutoff {
    pub at: String,
    pub day: String,
}

/// `now - retention_days`; `None` when retention is disabled.
pub fn retention_cutoff(now: DateTime<Utc>, retention_days: u32) -> Option<RetentionCutoff> {
    if retention_days == 0 {
        return None;
    }
    let cutoff = now - Duration::days(i64::from(retention_days));
    Some(RetentionCutoff {
        at: format_ts(cutoff),
        day: cutoff.format("%Y-%m-%d").to_string(),
    })
}

impl Db {
    /// Drops sessions with no token activity, then sessions last updated
    /// before `cutoff_at`. Daily buckets are left alone.
    pub fn prune_sessions(&mut self, cutoff_at: Option<&str>) -> Result<PruneStats> {
        let tx = self.conn.transaction()?;
        let mut stats = PruneStats::default();
        for table in SESSION_TABLES {
            let removed = tx.execute(
                &format!(
                    "DELETE FROM {table} WHERE input_tokens <= 0 AND output_tokens <= 0 AND total_tokens <= 0"
                ),
                [],
            )?;
            if table == "session_fact" {
                stats.inactive_rows = removed;
            }
        }
        if let Some(cutoff_at) = cutoff_at {
            for table in SESSION_TABLES {
                let removed = tx.execute(
                    &format!("DELETE FROM {table} WHERE updated_at < ?1"),
                    params![cutoff_at],
                )?;
                if table == "session_fact" {
                    stats.expired_rows = removed;
                }
            }
        }
        tx.commit()?;
        if stats.total() > 0 {
            tracing::info!(
                inactive = stats.inactive_rows,
                expired = stats.expired_rows,
                cutoff = cutoff_at.unwrap_or("-"),
                "pruned session rows"
            );
        }
        Ok(stats)
    }
}
