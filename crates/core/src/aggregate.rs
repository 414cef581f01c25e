use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Coverage, Dashboard, ModelShare, SessionPoint, SessionRecord, TrendPoint, UsageTotals,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardLimits {
    pub trend_days: usize,
    pub top_models: usize,
    pub recent_sessions: usize,
}

impl Default for DashboardLimits {
    fn default() -> Self {
        Self {
            trend_days: 14,
            top_models: 8,
            recent_sessions: 20,
        }
    }
}

/// Builds every dashboard view from stored facts. Coverage comes from the
/// daily-bucket table and is left for the caller to fill in.
pub fn build_dashboard(
    facts: &[SessionRecord],
    limits: &DashboardLimits,
    now: DateTime<Utc>,
) -> Dashboard {
    let mut facts: Vec<&SessionRecord> = facts.iter().filter(|fact| !fact.is_noise()).collect();
    facts.sort_by(|a, b| {
        a.updated_at
            .cmp(&b.updated_at)
            .then_with(|| a.source.cmp(&b.source))
            .then_with(|| a.session_id.cmp(&b.session_id))
    });

    Dashboard {
        totals: totals(&facts),
        trend: trend(&facts, limits.trend_days, now),
        models: model_distribution(&facts, limits.top_models),
        recent_sessions: facts
            .iter()
            .rev()
            .take(limits.recent_sessions)
            .map(|fact| (*fact).clone())
            .collect(),
        points: facts.iter().map(|fact| session_point(fact)).collect(),
        coverage: Coverage::default(),
    }
}

fn totals(facts: &[&SessionRecord]) -> UsageTotals {
    let mut totals = UsageTotals::default();
    for fact in facts {
        totals.input_tokens = totals.input_tokens.saturating_add(fact.usage.input_tokens);
        totals.output_tokens = totals
            .output_tokens
            .saturating_add(fact.usage.output_tokens);
        totals.total_tokens = totals.total_tokens.saturating_add(fact.usage.total_tokens);
        totals.session_count += 1;
    }
    totals
}

fn trend(facts: &[&SessionRecord], days: usize, now: DateTime<Utc>) -> Vec<TrendPoint> {
    let today = now.date_naive();
    let mut by_day: BTreeMap<String, TrendPoint> = BTreeMap::new();
    for offset in (0..days).rev() {
        let day = (today - Duration::days(offset as i64))
            .format("%Y-%m-%d")
            .to_string();
        by_day.insert(
            day.clone(),
            TrendPoint {
                day,
                input_tokens: 0,
                output_tokens: 0,
                total_tokens: 0,
                session_count: 0,
            },
        );
    }
    for fact in facts {
        if let Some(point) = by_day.get_mut(fact.day()) {
            point.input_tokens = point.input_tokens.saturating_add(fact.usage.input_tokens);
            point.output_tokens = point.output_tokens.saturating_add(fact.usage.output_tokens);
            point.total_tokens = point.total_tokens.saturating_add(fact.usage.total_tokens);
            point.session_count += 1;
        }
    }
    by_day.into_values().collect()
}

fn model_distribution(facts: &[&SessionRecord], top: usize) -> Vec<ModelShare> {
    let mut by_model: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    let mut grand_total = 0u64;
    for fact in facts {
        let entry = by_model.entry(fact.model.as_str()).or_default();
        entry.0 = entry.0.saturating_add(fact.usage.total_tokens);
        entry.1 += 1;
        grand_total = grand_total.saturating_add(fact.usage.total_tokens);
    }
    let mut models: Vec<ModelShare> = by_model
        .into_iter()
        .map(|(model, (total_tokens, session_count))| ModelShare {
            model: model.to_string(),
            total_tokens,
            session_count,
            share_pct: if grand_total == 0 {
                0.0
            } else {
                (total_tokens as f64 / grand_total as f64) * 100.0
            },
        })
        .collect();
    // Stable sort keeps model-name order among equal totals.
    models.sort_by(|a, b| b.total_tokens.cmp(&a.total_tokens));
    models.truncate(top);
    models
}

fn session_point(fact: &SessionRecord) -> SessionPoint {
    SessionPoint {
        ts: fact.updated_at.clone(),
        source: fact.source,
        session_id: fact.session_id.clone(),
        model: fact.model.clone(),
        input_tokens: fact.usage.input_tokens,
        output_tokens: fact.usage.output_tokens,
        total_tokens: fact.usage.total_tokens,
        input_query: fact.input_query.clone(),
    }
}
