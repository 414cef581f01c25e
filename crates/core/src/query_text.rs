//! Cleanup of user-turn text before it is stored as a session's query.
//!
//! Agent runtimes interleave channel, scheduling and scaffolding metadata with
//! what the user actually asked. The rules run in a fixed order: media
//! placeholders, metadata code fences, leading bracket tags, boilerplate,
//! leading `label: value` noise, and finally a cut to the first CJK character
//! when everything before it looks like metadata.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::redact::redact_inline;

pub const DEFAULT_QUERY_MAX_CHARS: usize = 1200;
pub const ELLIPSIS: char = '…';

const MEDIA_PLACEHOLDER: &str = r"(?i)\[(?:image|photo|file|attachment|media)(?:\s*#?\d+)?\]|<media:[a-z]+>|!\[[^\]]*\]\([^)]*\)|<image[^>]*>";
const CODE_FENCE: &str = r"(?s)```[A-Za-z0-9_-]*[ \t]*\n?(.*?)```";
const METADATA_SIGNATURE: &str = r#"(?i)"?\b(?:channel|session(?:_?id|_?key)?|message_?id|sender|chat_?id|timestamp|label|conversation_?(?:id|label))\b"?\s*[:=]"#;
const LEADING_BRACKET_TAGS: &str = r"^\s*(?:\[[^\]\n]{0,80}\]\s*)+";
const LEADING_NOISE_PREFIX: &str = r"(?i)^\s*(?:(?:定时任务|计划任务|系统消息|cron(?:\s+job)?|scheduled\s+task|reminder|heartbeat|system)\s*[-–—:：|]\s*|(?:channel|session(?:[_ ]?(?:id|key))?|message[_ ]?id|sender|from|chat[_ ]?id|timestamp|label|source|user[_ ]?id)\s*[:=：]\s*\S+\s+)";
const METADATA_MARKERS: &str = r"(?i)[:#@=]|\b(?:id|chat|channel|session|group|user|msg|sender)\b";
const CJK_CHAR: &str = r"[\p{Han}\p{Hiragana}\p{Katakana}\p{Hangul}]";

/// Trailers and scaffolding blocks removed wherever they appear.
const BOILERPLATE: &[&str] = &[
    r"(?is)<environment_context>.*?</environment_context>",
    r"(?is)<user_instructions>.*?</user_instructions>",
    r"(?is)<system-reminder>.*?</system-reminder>",
    r"(?is)<permissions instructions>.*?</permissions instructions>",
    r"(?is)\s*return your (?:summary|answer|result|response) as\b.*$",
    r"(?is)\s*when (?:you are )?(?:done|finished),? reply with\b.*$",
    r"(?im)^\s*\[system message\].*$",
];

struct Rules {
    media: Regex,
    fence: Regex,
    metadata_signature: Regex,
    bracket_tags: Regex,
    noise_prefix: Regex,
    metadata_markers: Regex,
    cjk: Regex,
    boilerplate: Vec<Regex>,
}

fn rules() -> Option<&'static Rules> {
    static RULES: OnceLock<Option<Rules>> = OnceLock::new();
    RULES
        .get_or_init(|| {
            Some(Rules {
                media: Regex::new(MEDIA_PLACEHOLDER).ok()?,
                fence: Regex::new(CODE_FENCE).ok()?,
                metadata_signature: Regex::new(METADATA_SIGNATURE).ok()?,
                bracket_tags: Regex::new(LEADING_BRACKET_TAGS).ok()?,
                noise_prefix: Regex::new(LEADING_NOISE_PREFIX).ok()?,
                metadata_markers: Regex::new(METADATA_MARKERS).ok()?,
                cjk: Regex::new(CJK_CHAR).ok()?,
                boilerplate: BOILERPLATE
                    .iter()
                    .map(|pattern| Regex::new(pattern))
                    .collect::<Result<Vec<_>, _>>()
                    .ok()?,
            })
        })
        .as_ref()
}

/// Returns the cleaned, redacted and length-capped query, or `None` when
/// nothing meaningful remains.
pub fn normalize_query_text(raw: &str, max_chars: usize) -> Option<String> {
    let rules = rules()?;
    let mut text = rules.media.replace_all(raw, " ").into_owned();
    text = rules
        .fence
        .replace_all(&text, |caps: &Captures<'_>| {
            let body = caps.get(1).map_or("", |body| body.as_str());
            if rules.metadata_signature.is_match(body) {
                String::new()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned();
    text = rules.bracket_tags.replace(&text, "").into_owned();
    for pattern in &rules.boilerplate {
        text = pattern.replace_all(&text, "").into_owned();
    }
    loop {
        let stripped = rules.noise_prefix.replace(&text, "");
        if stripped.len() == text.len() {
            break;
        }
        text = stripped.into_owned();
    }
    if let Some(found) = rules.cjk.find(&text) {
        let prefix = &text[..found.start()];
        if !prefix.trim().is_empty()
            && prefix.is_ascii()
            && prefix.chars().count() <= 80
            && rules.metadata_markers.is_match(prefix)
        {
            text = text[found.start()..].to_string();
        }
    }

    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    let redacted = redact_inline(&collapsed);
    Some(cap_chars(&redacted, max_chars))
}

fn cap_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out = out.trim_end().to_string();
    out.push(ELLIPSIS);
    out
}
