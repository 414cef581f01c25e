use serde_json::Value;
use tracker_core::{SessionSource, TokenCounts};

use crate::parser::{
    LogDecoder, SessionAccumulator, find_string, line_type, text_from_content, value_u64,
};

/// Decoder for per-agent OpenClaw session logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenClawDecoder;

impl LogDecoder for OpenClawDecoder {
    fn source(&self) -> SessionSource {
        SessionSource::OpenClaw
    }

    fn apply_line(&self, value: &Value, acc: &mut SessionAccumulator) {
        match line_type(value) {
            Some("session") => {
                if let Some(id) = find_string(value, &[&["id"], &["sessionId"]]) {
                    acc.set_session_id(id);
                }
            }
            Some("model_change") => {
                if let Some(model) = find_string(value, &[&["modelId"], &["model"]]) {
                    acc.set_model(model);
                }
            }
            Some("custom") => {
                if value.get("customType").and_then(Value::as_str) == Some("model-snapshot")
                    && let Some(model) =
                        find_string(value, &[&["data", "modelId"], &["data", "model"]])
                {
                    acc.set_model(model);
                }
            }
            Some("message") => {
                if let Some(message) = value.get("message") {
                    apply_message(message, acc);
                }
            }
            _ => {}
        }
    }
}

fn apply_message(message: &Value, acc: &mut SessionAccumulator) {
    match message.get("role").and_then(Value::as_str) {
        Some("user") => {
            if let Some(text) = message.get("content").and_then(text_from_content) {
                acc.offer_query(&text);
            }
        }
        Some("assistant") => {
            if let Some(model) = message.get("model").and_then(Value::as_str) {
                acc.set_model(model);
            }
            if let Some(usage) = message.get("usage") {
                acc.add_usage(usage_from_value(usage));
            }
        }
        _ => {}
    }
}

/// Cache reads and writes count as input.
fn usage_from_value(usage: &Value) -> TokenCounts {
    let input = value_u64(usage.get("input"))
        .saturating_add(value_u64(usage.get("cacheRead")))
        .saturating_add(value_u64(usage.get("cacheWrite")));
    let output = value_u64(usage.get("output"));
    let mut counts = TokenCounts::new(input, output);
    let reported_total = value_u64(usage.get("totalTokens"));
    if reported_total > 0 {
        counts.total_tokens = reported_total;
    }
    counts
}
