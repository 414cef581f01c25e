use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A computed value stamped with when it was produced. Callers keep it and
/// ask [`CachedValue::is_stale`] before recomputing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedValue<T> {
    pub value: T,
    pub computed_at: DateTime<Utc>,
}

impl<T> CachedValue<T> {
    pub fn new(value: T, computed_at: DateTime<Utc>) -> Self {
        Self { value, computed_at }
    }

    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.signed_duration_since(self.computed_at) >= ttl
    }
}
