//! Masking of credentials in structured values and free text.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Case-insensitive substrings that mark an object key as sensitive.
/// Keys are lowercased and `_` is read as `-` before matching.
pub const SENSITIVE_KEY_PATTERNS: &[&str] = &[
    "key",
    "token",
    "secret",
    "password",
    "authorization",
    "auth",
    "cookie",
    "client-id",
    "client-secret",
];

const MASK: &str = "********";
const MASK_KEEP: usize = 3;

/// Inline credential patterns, applied in order. Every entry runs even when an
/// earlier one already matched.
const INLINE_PATTERNS: &[(&str, &str)] = &[
    (r"(?i)\b(bearer)\s+[A-Za-z0-9._~+/=-]{8,}", "$1 [REDACTED]"),
    (
        r"\beyJ[A-Za-z0-9_-]{5,}\.[A-Za-z0-9_-]{5,}\.[A-Za-z0-9_-]{5,}",
        REDACTION_MARKER,
    ),
    (r"\bsk-(?:ant-|proj-)?[A-Za-z0-9_-]{16,}", REDACTION_MARKER),
    (r"\bgh[pousr]_[A-Za-z0-9]{20,}", REDACTION_MARKER),
    (r"\bxox[abprs]-[A-Za-z0-9-]{10,}", REDACTION_MARKER),
    (r"\bAKIA[0-9A-Z]{16}\b", REDACTION_MARKER),
    (r"\bAIza[0-9A-Za-z_-]{35}", REDACTION_MARKER),
    (
        r#"(?i)\b(api[_-]?key|secret|password|passwd|access[_-]?token)(\s*[:=]\s*)[^\s"',;\[\]]{6,}"#,
        "$1$2[REDACTED]",
    ),
];

fn inline_rules() -> &'static [(Regex, &'static str)] {
    static RULES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    RULES.get_or_init(|| {
        INLINE_PATTERNS
            .iter()
            .filter_map(|(pattern, replacement)| {
                Regex::new(pattern).ok().map(|regex| (regex, *replacement))
            })
            .collect()
    })
}

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.to_ascii_lowercase().replace('_', "-");
    SENSITIVE_KEY_PATTERNS
        .iter()
        .any(|pattern| normalized.contains(pattern))
}

/// Masks a scalar, keeping a short prefix and suffix of long strings.
pub fn mask_scalar(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= MASK.len() {
        return MASK.to_string();
    }
    let prefix: String = chars[..MASK_KEEP].iter().collect();
    let suffix: String = chars[chars.len() - MASK_KEEP..].iter().collect();
    format!("{prefix}****{suffix}")
}

pub fn redact_structured(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, child) in map {
                let redacted = if is_sensitive_key(key) {
                    mask_all(child)
                } else {
                    redact_structured(child)
                };
                out.insert(key.clone(), redacted);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_structured).collect()),
        Value::String(text) => Value::String(redact_inline(text)),
        other => other.clone(),
    }
}

fn mask_all(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(text) => Value::String(mask_scalar(text)),
        Value::Bool(_) | Value::Number(_) => Value::String(MASK.to_string()),
        Value::Array(items) => Value::Array(items.iter().map(mask_all).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, child)| (key.clone(), mask_all(child)))
                .collect(),
        ),
    }
}

pub fn redact_inline(text: &str) -> String {
    let mut out = text.to_string();
    for (regex, replacement) in inline_rules() {
        if regex.is_match(&out) {
            out = regex.replace_all(&out, *replacement).into_owned();
        }
    }
    out
}
