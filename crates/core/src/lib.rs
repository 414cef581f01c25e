use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub mod aggregate;
pub mod cache;
pub mod merge;
pub mod query_text;
pub mod redact;

pub use aggregate::{DashboardLimits, build_dashboard};
pub use cache::CachedValue;
pub use merge::{reconcile, record_from_registry};
pub use query_text::{DEFAULT_QUERY_MAX_CHARS, normalize_query_text};
pub use redact::{REDACTION_MARKER, redact_inline, redact_structured};

/// Model name stored when a log never reports one.
pub const UNKNOWN_MODEL: &str = "Unknown";

/// Agent runtime that produced a session log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionSource {
    OpenClaw,
    Codex,
}

impl SessionSource {
    pub const ALL: [SessionSource; 2] = [SessionSource::OpenClaw, SessionSource::Codex];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenClaw => "openclaw",
            Self::Codex => "codex",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openclaw" => Some(Self::OpenClaw),
            "codex" => Some(Self::Codex),
            _ => None,
        }
    }
}

impl fmt::Display for SessionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCounts {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl TokenCounts {
    /// Builds counts where the total is derived from input and output.
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.input_tokens == 0 && self.output_tokens == 0 && self.total_tokens == 0
    }

    pub fn add(&mut self, other: TokenCounts) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// Canonical unit of ingestion, one per `(source, session_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub source: SessionSource,
    pub session_id: String,
    pub agent_id: Option<String>,
    pub label: Option<String>,
    pub model: String,
    /// UTC RFC3339 with millisecond precision, so string order is time order.
    pub updated_at: String,
    pub usage: TokenCounts,
    pub input_query: Option<String>,
    pub source_path: Option<String>,
}

impl SessionRecord {
    /// Zero token activity on an unknown model; never persisted or counted.
    pub fn is_noise(&self) -> bool {
        is_noise(&self.model, self.usage)
    }

    pub fn day(&self) -> &str {
        day_of(&self.updated_at)
    }
}

pub fn is_noise(model: &str, usage: TokenCounts) -> bool {
    usage.is_zero() && model == UNKNOWN_MODEL
}

/// Trims a reported model name, mapping blanks to [`UNKNOWN_MODEL`].
pub fn normalize_model(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => UNKNOWN_MODEL.to_string(),
    }
}

/// `YYYY-MM-DD` prefix of a canonical timestamp.
pub fn day_of(ts: &str) -> &str {
    ts.get(..10).unwrap_or(ts)
}

/// Session metadata kept by the agent runtime's own index (`sessions.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryRecord {
    pub session_key: String,
    pub agent_id: String,
    pub session_id: String,
    pub model: Option<String>,
    pub label: Option<String>,
    pub updated_at: Option<String>,
    pub usage: TokenCounts,
    pub skills_snapshot: Option<serde_json::Value>,
    pub source_path: Option<String>,
}

/// Last observed stat of a log file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestFileState {
    pub source: SessionSource,
    pub file_path: String,
    pub mtime_ms: i64,
    pub size_bytes: u64,
    pub last_ingested_at: String,
}

/// Derived aggregate keyed by `(day, source, model)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTokenBucket {
    pub day: String,
    pub source: SessionSource,
    pub model: String,
    pub usage: TokenCounts,
    pub session_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub oldest_day: Option<String>,
    pub newest_day: Option<String>,
    pub bucket_count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub session_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub day: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub session_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelShare {
    pub model: String,
    pub total_tokens: u64,
    pub session_count: u64,
    pub share_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPoint {
    pub ts: String,
    pub source: SessionSource,
    pub session_id: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub input_query: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub totals: UsageTotals,
    pub trend: Vec<TrendPoint>,
    pub models: Vec<ModelShare>,
    pub recent_sessions: Vec<SessionRecord>,
    pub points: Vec<SessionPoint>,
    pub coverage: Coverage,
}

/// Session id for a log file name, e.g. the UUID tail of a rollout file.
pub fn session_id_from_file_name(path: &str) -> Option<String> {
    let stem = Path::new(path).file_stem().and_then(|value| value.to_str())?;
    if let Some(rest) = stem.strip_prefix("rollout-")
        && let Some(tail) = rest.get(rest.len().saturating_sub(36)..)
        && looks_like_uuid(tail)
    {
        return Some(tail.to_string());
    }
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

fn looks_like_uuid(value: &str) -> bool {
    value.len() == 36
        && value.char_indices().all(|(index, ch)| match index {
            8 | 13 | 18 | 23 => ch == '-',
            _ => ch.is_ascii_hexdigit(),
        })
}
