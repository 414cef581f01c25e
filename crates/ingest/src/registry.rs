use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracker_core::{RegistryRecord, TokenCounts, redact_inline, redact_structured};

use crate::parser::{find_string, find_value, timestamp_from_value, value_u64};
use crate::types::IngestIssue;

const REGISTRY_FILE: &str = "sessions.json";

/// OpenClaw's own session index, keyed by `(agent_id, session_id)`.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: HashMap<(String, String), RegistryRecord>,
}

impl Registry {
    /// Adds an entry; when the key already exists the newer `updated_at` wins.
    pub fn insert(&mut self, record: RegistryRecord) {
        let key = (record.agent_id.clone(), record.session_id.clone());
        match self.entries.get(&key) {
            Some(existing) if existing.updated_at >= record.updated_at => {}
            _ => {
                self.entries.insert(key, record);
            }
        }
    }

    pub fn get(&self, agent_id: &str, session_id: &str) -> Option<&RegistryRecord> {
        self.entries
            .get(&(agent_id.to_string(), session_id.to_string()))
    }

    /// Entries in a stable `(agent_id, session_id)` order.
    pub fn entries(&self) -> Vec<&RegistryRecord> {
        let mut entries: Vec<&RegistryRecord> = self.entries.values().collect();
        entries.sort_by(|a, b| {
            a.agent_id
                .cmp(&b.agent_id)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct RegistryLoad {
    pub registry: Registry,
    pub issues: Vec<IngestIssue>,
}

/// Reads every `agents/<agent>/sessions/sessions.json` under `openclaw_root`.
/// Unreadable or malformed files become issues.
pub fn load_registry(openclaw_root: &Path) -> RegistryLoad {
    let mut load = RegistryLoad::default();
    for (agent_id, path) in registry_files(openclaw_root) {
        let path_str = path.to_string_lossy().to_string();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) => {
                load.issues.push(IngestIssue::new(path_str, err));
                continue;
            }
        };
        match parse_registry(&agent_id, &path_str, &raw) {
            Ok(records) => {
                tracing::debug!(path = %path_str, entries = records.len(), "loaded session registry");
                for record in records {
                    load.registry.insert(record);
                }
            }
            Err(message) => load.issues.push(IngestIssue::new(path_str, message)),
        }
    }
    load
}

fn registry_files(openclaw_root: &Path) -> Vec<(String, PathBuf)> {
    let Ok(agents) = fs::read_dir(openclaw_root.join("agents")) else {
        return Vec::new();
    };
    let mut files: Vec<(String, PathBuf)> = agents
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let agent_id = entry.file_name().to_str()?.to_string();
            let path = entry.path().join("sessions").join(REGISTRY_FILE);
            path.is_file().then_some((agent_id, path))
        })
        .collect();
    files.sort();
    files
}

pub(crate) fn parse_registry(
    agent_id: &str,
    path: &str,
    raw: &str,
) -> std::result::Result<Vec<RegistryRecord>, String> {
    let value: Value =
        serde_json::from_str(raw).map_err(|err| format!("invalid registry json: {err}"))?;
    let Value::Object(map) = value else {
        return Err("registry root is not an object".to_string());
    };
    Ok(map
        .iter()
        .filter_map(|(key, entry)| registry_record(agent_id, path, key, entry))
        .collect())
}

fn registry_record(
    agent_id: &str,
    path: &str,
    session_key: &str,
    entry: &Value,
) -> Option<RegistryRecord> {
    let session_id = find_string(entry, &[&["sessionId"], &["session_id"]])?.trim();
    if session_id.is_empty() {
        return None;
    }
    let input = value_u64(entry.get("inputTokens"));
    let output = value_u64(entry.get("outputTokens"));
    let mut usage = TokenCounts::new(input, output);
    let reported_total = value_u64(entry.get("totalTokens"));
    if reported_total > 0 {
        usage.total_tokens = reported_total;
    }
    Some(RegistryRecord {
        session_key: session_key.to_string(),
        agent_id: agent_id.to_string(),
        session_id: session_id.to_string(),
        model: find_string(entry, &[&["model"], &["modelOverride"], &["modelId"]])
            .map(str::to_string),
        label: find_string(
            entry,
            &[&["label"], &["displayName"], &["origin", "label"]],
        )
        .map(redact_inline)
        .filter(|label| !label.trim().is_empty()),
        updated_at: find_value(entry, &[&["updatedAt"], &["updated_at"]])
            .and_then(timestamp_from_value),
        usage,
        skills_snapshot: entry.get("skillsSnapshot").map(redact_structured),
        source_path: find_string(entry, &[&["sessionFile"]])
            .map(str::to_string)
            .or_else(|| Some(path.to_string())),
    })
}
