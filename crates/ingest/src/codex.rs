use serde_json::Value;
use tracker_core::{SessionSource, TokenCounts, session_id_from_file_name};

use crate::parser::{
    LogDecoder, SessionAccumulator, find_string, find_value, line_type, text_from_content,
    value_u64,
};

/// Prefixes of text the Codex client injects as a user turn on its own.
const CODEX_PREAMBLE_PREFIXES: &[&str] = &[
    "<environment_context>",
    "<user_instructions>",
    "# agents.md instructions",
    "<permissions instructions>",
];

/// Decoder for Codex rollout logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodexDecoder;

impl LogDecoder for CodexDecoder {
    fn source(&self) -> SessionSource {
        SessionSource::Codex
    }

    fn apply_line(&self, value: &Value, acc: &mut SessionAccumulator) {
        let payload = value.get("payload");
        match line_type(value) {
            Some("session_meta") => {
                if let Some(id) = payload.and_then(|p| find_string(p, &[&["id"]])) {
                    acc.set_session_id(id);
                }
            }
            Some("turn_context") => {
                if let Some(model) = payload
                    .and_then(|p| find_string(p, &[&["model"], &["info", "model"]]))
                    .or_else(|| find_string(value, &[&["model"]]))
                {
                    acc.set_model(model);
                }
            }
            Some("response_item") => {
                if let Some(payload) = payload
                    && payload.get("type").and_then(Value::as_str) == Some("message")
                    && payload.get("role").and_then(Value::as_str) == Some("user")
                    && let Some(text) = payload.get("content").and_then(text_from_content)
                {
                    offer_user_text(&text, acc);
                }
            }
            Some("event_msg") => {
                if let Some(payload) = payload {
                    apply_event(payload, acc);
                }
            }
            _ => {}
        }
    }

    fn fallback_session_id(&self, source_path: &str) -> Option<String> {
        session_id_from_file_name(source_path)
    }
}

fn apply_event(payload: &Value, acc: &mut SessionAccumulator) {
    match payload.get("type").and_then(Value::as_str) {
        Some("user_message") => {
            if let Some(text) = payload.get("message").and_then(text_from_content) {
                offer_user_text(&text, acc);
            }
        }
        Some("token_count") => {
            if let Some(usage) = find_value(
                payload,
                &[&["info", "total_token_usage"], &["total_token_usage"]],
            ) {
                acc.add_cumulative_usage(usage_from_value(usage));
            }
        }
        _ => {}
    }
}

fn offer_user_text(text: &str, acc: &mut SessionAccumulator) {
    if is_preamble(text) {
        acc.offer_preamble(text);
    } else {
        acc.offer_query(text);
    }
}

fn is_preamble(text: &str) -> bool {
    let head: String = text.trim_start().chars().take(48).collect();
    let head = head.to_lowercase();
    CODEX_PREAMBLE_PREFIXES
        .iter()
        .any(|prefix| head.starts_with(prefix))
}

/// `cached_input_tokens` is a subset of `input_tokens`.
fn usage_from_value(usage: &Value) -> TokenCounts {
    let input = value_u64(usage.get("input_tokens"));
    let output = value_u64(usage.get("output_tokens"));
    let mut counts = TokenCounts::new(input, output);
    let reported_total = value_u64(usage.get("total_tokens"));
    if reported_total > 0 {
        counts.total_tokens = reported_total;
    }
    counts
}
