use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tracker_core::{
    SessionRecord, SessionSource, TokenCounts, normalize_model, normalize_query_text,
};

/// Per-file inputs that do not come from the log lines themselves.
#[derive(Debug, Clone)]
pub struct DecodeContext {
    pub source_path: String,
    pub agent_id: Option<String>,
    /// Used when no line carries a timestamp, usually the file's mtime.
    pub fallback_updated_at: String,
    pub query_max_chars: usize,
}

/// Turns one session log into at most one [`SessionRecord`].
///
/// Implementations only interpret individual lines; reading, line skipping
/// and record construction are shared.
pub trait LogDecoder {
    fn source(&self) -> SessionSource;

    fn apply_line(&self, value: &Value, acc: &mut SessionAccumulator);

    /// Session id to use when the log never announced one.
    fn fallback_session_id(&self, _source_path: &str) -> Option<String> {
        None
    }

    fn decode_reader(
        &self,
        reader: &mut dyn BufRead,
        ctx: &DecodeContext,
    ) -> io::Result<Option<SessionRecord>> {
        let mut acc = SessionAccumulator::new(ctx.query_max_chars);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let Ok(line) = std::str::from_utf8(&buf) else {
                continue;
            };
            let Some(value) = parse_json_line(line) else {
                continue;
            };
            if let Some(ts) = extract_timestamp(&value) {
                acc.observe_timestamp(ts);
            }
            self.apply_line(&value, &mut acc);
        }
        let fallback_id = self.fallback_session_id(&ctx.source_path);
        Ok(acc.finish(self.source(), ctx, fallback_id))
    }

    fn decode_file(&self, path: &Path, ctx: &DecodeContext) -> io::Result<Option<SessionRecord>> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        self.decode_reader(&mut reader, ctx)
    }
}

/// Running state while a log is decoded.
#[derive(Debug, Clone, Default)]
pub struct SessionAccumulator {
    session_id: Option<String>,
    model: Option<String>,
    updated_at: Option<String>,
    usage: TokenCounts,
    last_cumulative: Option<TokenCounts>,
    query: Option<String>,
    preamble_query: Option<String>,
    query_max_chars: usize,
}

impl SessionAccumulator {
    pub fn new(query_max_chars: usize) -> Self {
        Self {
            query_max_chars,
            ..Self::default()
        }
    }

    pub fn set_session_id(&mut self, session_id: &str) {
        let session_id = session_id.trim();
        if !session_id.is_empty() {
            self.session_id = Some(session_id.to_string());
        }
    }

    pub fn set_model(&mut self, model: &str) {
        let model = model.trim();
        if !model.is_empty() {
            self.model = Some(model.to_string());
        }
    }

    /// Keeps the latest timestamp seen; never moves backwards.
    pub fn observe_timestamp(&mut self, ts: String) {
        match &self.updated_at {
            Some(current) if current.as_str() >= ts.as_str() => {}
            _ => self.updated_at = Some(ts),
        }
    }

    pub fn add_usage(&mut self, usage: TokenCounts) {
        self.usage.add(usage);
    }

    /// Adds the growth of a cumulative counter since its previous report.
    /// A counter that went backwards is treated as restarted.
    pub fn add_cumulative_usage(&mut self, cumulative: TokenCounts) {
        let delta = match self.last_cumulative {
            Some(prev) if cumulative.total_tokens >= prev.total_tokens => TokenCounts {
                input_tokens: cumulative.input_tokens.saturating_sub(prev.input_tokens),
                output_tokens: cumulative.output_tokens.saturating_sub(prev.output_tokens),
                total_tokens: cumulative.total_tokens.saturating_sub(prev.total_tokens),
            },
            _ => cumulative,
        };
        self.last_cumulative = Some(cumulative);
        self.usage.add(delta);
    }

    /// Offers user text; the last candidate that survives cleanup wins.
    pub fn offer_query(&mut self, raw: &str) {
        if let Some(text) = normalize_query_text(raw, self.query_max_chars) {
            self.query = Some(text);
        }
    }

    /// Offers auto-injected preamble text, used only if no real query shows up.
    pub fn offer_preamble(&mut self, raw: &str) {
        if let Some(text) = normalize_query_text(raw, self.query_max_chars) {
            self.preamble_query = Some(text);
        }
    }

    fn finish(
        self,
        source: SessionSource,
        ctx: &DecodeContext,
        fallback_id: Option<String>,
    ) -> Option<SessionRecord> {
        let session_id = self.session_id.or(fallback_id)?;
        Some(SessionRecord {
            source,
            session_id,
            agent_id: ctx.agent_id.clone(),
            label: None,
            model: normalize_model(self.model.as_deref()),
            updated_at: self
                .updated_at
                .unwrap_or_else(|| ctx.fallback_updated_at.clone()),
            usage: self.usage,
            input_query: self.query.or(self.preamble_query),
            source_path: Some(ctx.source_path.clone()),
        })
    }
}

pub(crate) fn parse_json_line(line: &str) -> Option<Value> {
    let line = line.trim();
    if !line.starts_with('{') {
        return None;
    }
    serde_json::from_str::<Value>(line)
        .ok()
        .filter(Value::is_object)
}

pub(crate) fn find_string<'a>(value: &'a Value, paths: &[&[&str]]) -> Option<&'a str> {
    find_value(value, paths).and_then(Value::as_str)
}

pub(crate) fn find_value<'a>(value: &'a Value, paths: &[&[&str]]) -> Option<&'a Value> {
    for path in paths {
        let mut current = value;
        let mut ok = true;
        for key in *path {
            if let Some(next) = current.get(*key) {
                current = next;
            } else {
                ok = false;
                break;
            }
        }
        if ok && !current.is_null() {
            return Some(current);
        }
    }
    None
}

pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn normalize_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(format_ts(parsed.with_timezone(&Utc)));
    }
    if let Ok(parsed) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(format_ts(DateTime::<Utc>::from_naive_utc_and_offset(
            parsed, Utc,
        )));
    }
    if let Ok(parsed) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(format_ts(DateTime::<Utc>::from_naive_utc_and_offset(
            parsed, Utc,
        )));
    }
    if !raw.is_empty()
        && raw.chars().all(|ch| ch.is_ascii_digit())
        && let Ok(value) = raw.parse::<i64>()
    {
        return timestamp_from_epoch(value, raw.len() > 10);
    }
    None
}

fn timestamp_from_epoch(value: i64, millis: bool) -> Option<String> {
    let (secs, nanos) = if millis {
        (
            value.div_euclid(1000),
            value.rem_euclid(1000) as u32 * 1_000_000,
        )
    } else {
        (value, 0)
    };
    DateTime::<Utc>::from_timestamp(secs, nanos).map(format_ts)
}

/// Accepts timestamp strings and epoch seconds or milliseconds as numbers.
pub(crate) fn timestamp_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(raw) => normalize_timestamp(raw),
        Value::Number(number) => {
            let value = number
                .as_i64()
                .or_else(|| number.as_f64().map(|value| value as i64))?;
            timestamp_from_epoch(value, value.abs() >= 100_000_000_000)
        }
        _ => None,
    }
}

pub(crate) fn extract_timestamp(value: &Value) -> Option<String> {
    find_value(
        value,
        &[
            &["timestamp"],
            &["ts"],
            &["time"],
            &["message", "timestamp"],
        ],
    )
    .and_then(timestamp_from_value)
}

/// Lenient non-negative integer read; numeric strings are accepted.
pub(crate) fn value_u64(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(number)) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|v| *v > 0.0).map(|v| v as u64))
            .unwrap_or(0),
        Some(Value::String(raw)) => raw.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    }
}

/// Text of a message `content` field: a string, or an array of text parts.
pub(crate) fn text_from_content(content: &Value) -> Option<String> {
    match content {
        Value::String(text) => Some(text.clone()),
        Value::Array(parts) => {
            let texts: Vec<&str> = parts
                .iter()
                .filter(|part| {
                    matches!(
                        part.get("type").and_then(Value::as_str),
                        None | Some("text") | Some("input_text")
                    )
                })
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect();
            if texts.is_empty() {
                None
            } else {
                Some(texts.join("\n"))
            }
        }
        _ => None,
    }
}

pub(crate) fn line_type(value: &Value) -> Option<&str> {
    value.get("type").and_then(Value::as_str)
}
