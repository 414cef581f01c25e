use crate::{RegistryRecord, SessionRecord, SessionSource, TokenCounts, UNKNOWN_MODEL};

/// Folds the registry's view of a session into a parsed record.
///
/// Registry metadata wins when it is set. Token counters win only when they
/// are positive, so an unset registry counter never erases parsed usage.
pub fn reconcile(parsed: SessionRecord, registry: Option<&RegistryRecord>) -> SessionRecord {
    let Some(registry) = registry else {
        return parsed;
    };
    let model = match registry.model.as_deref().map(str::trim) {
        Some(model) if !model.is_empty() && model != UNKNOWN_MODEL => model.to_string(),
        _ => parsed.model,
    };
    let label = non_empty(registry.label.as_deref()).or(parsed.label);
    let usage = TokenCounts {
        input_tokens: prefer_positive(registry.usage.input_tokens, parsed.usage.input_tokens),
        output_tokens: prefer_positive(registry.usage.output_tokens, parsed.usage.output_tokens),
        total_tokens: prefer_positive(registry.usage.total_tokens, parsed.usage.total_tokens),
    };
    let updated_at = match registry.updated_at.as_deref() {
        Some(ts) if ts > parsed.updated_at.as_str() => ts.to_string(),
        _ => parsed.updated_at,
    };
    let source_path = parsed
        .source_path
        .filter(|path| !path.is_empty())
        .or_else(|| non_empty(registry.source_path.as_deref()));
    let agent_id = parsed
        .agent_id
        .or_else(|| non_empty(Some(registry.agent_id.as_str())));
    SessionRecord {
        source: parsed.source,
        session_id: parsed.session_id,
        agent_id,
        label,
        model,
        updated_at,
        usage,
        input_query: parsed.input_query,
        source_path,
    }
}

/// Record carrying only what the registry knows about a session. `None`
/// when the entry has no `updated_at` to date it by.
pub fn record_from_registry(registry: &RegistryRecord) -> Option<SessionRecord> {
    let updated_at = registry.updated_at.clone()?;
    Some(SessionRecord {
        source: SessionSource::OpenClaw,
        session_id: registry.session_id.clone(),
        agent_id: non_empty(Some(registry.agent_id.as_str())),
        label: non_empty(registry.label.as_deref()),
        model: crate::normalize_model(registry.model.as_deref()),
        updated_at,
        usage: registry.usage,
        input_query: None,
        source_path: non_empty(registry.source_path.as_deref()),
    })
}

fn prefer_positive(registry: u64, parsed: u64) -> u64 {
    if registry > 0 { registry } else { parsed }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
