use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

use super::ResolutionOutcome;

/// Longest display name kept from the resolver, marker included.
pub const NAME_LIMIT: usize = 100;
pub const FALLBACK_NAME: &str = "File Ready";

const TRUNCATION_MARKER: char = '…';
const LIST_KEY: &str = "list";
const WRAPPER_KEYS: &[&str] = &[LIST_KEY, "data"];
const MAX_WRAPPER_DEPTH: usize = 3;

/// One place a logical value may live inside a resolver record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    Key(&'static str),
    Nested(&'static str, &'static str),
}

impl FieldRule {
    fn lookup<'a>(&self, record: &'a Map<String, Value>) -> Option<&'a Value> {
        match self {
            FieldRule::Key(key) => record.get(*key),
            FieldRule::Nested(outer, inner) => record.get(*outer)?.as_object()?.get(*inner),
        }
    }
}

pub const NAME_RULES: &[FieldRule] = &[
    FieldRule::Key("name"),
    FieldRule::Key("file_name"),
    FieldRule::Key("filename"),
    FieldRule::Key("server_filename"),
    FieldRule::Key("title"),
];

pub const SIZE_RULES: &[FieldRule] = &[
    FieldRule::Key("size"),
    FieldRule::Key("file_size"),
    FieldRule::Key("size_bytes"),
    FieldRule::Key("filesize"),
];

pub const DOWNLOAD_RULES: &[FieldRule] = &[
    FieldRule::Key("download_link"),
    FieldRule::Key("download_url"),
    FieldRule::Key("dlink"),
    FieldRule::Key("direct_link"),
    FieldRule::Nested("download", "url"),
    FieldRule::Nested("download", "link"),
];

pub const QUALITY_MAP_RULES: &[FieldRule] = &[
    FieldRule::Key("fast_stream_url"),
    FieldRule::Key("stream_urls"),
];

pub const GENERIC_STREAM_RULES: &[FieldRule] = &[
    FieldRule::Key("stream_url"),
    FieldRule::Key("streaming_url"),
    FieldRule::Key("stream_link"),
];

/// Canonical view of one resolved file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaRecord {
    pub name: String,
    pub size_bytes: Option<u64>,
    pub stream_candidates: BTreeMap<String, String>,
    pub generic_stream_url: Option<String>,
    pub download_url: Option<String>,
}

impl MediaRecord {
    /// Builds a record from a raw resolver document, `None` when nothing usable is found.
    pub fn from_document(document: &Value) -> Option<Self> {
        let block = locate_block(document, 0)?;
        Self::from_block(block)
    }

    fn from_block(block: &Map<String, Value>) -> Option<Self> {
        let name = first_match(block, NAME_RULES, text)
            .map(|name| truncate_with_marker(name, NAME_LIMIT))
            .unwrap_or_else(|| FALLBACK_NAME.to_string());
        let record = Self {
            name,
            size_bytes: first_match(block, SIZE_RULES, byte_count),
            stream_candidates: first_match(block, QUALITY_MAP_RULES, quality_map)
                .unwrap_or_default(),
            generic_stream_url: first_match(block, GENERIC_STREAM_RULES, http_url),
            download_url: first_match(block, DOWNLOAD_RULES, http_url),
        };
        record.has_link().then_some(record)
    }

    pub fn has_link(&self) -> bool {
        !self.stream_candidates.is_empty()
            || self.generic_stream_url.is_some()
            || self.download_url.is_some()
    }
}

/// Maps any resolver document onto an outcome. Shapes that carry no link are `NotFound`.
pub fn normalize(document: &Value) -> ResolutionOutcome {
    match MediaRecord::from_document(document) {
        Some(record) => ResolutionOutcome::Success(record),
        None => ResolutionOutcome::NotFound,
    }
}

/// Cuts `input` to at most `limit` characters, ending with `…` when shortened.
pub fn truncate_with_marker(input: &str, limit: usize) -> String {
    if input.chars().count() <= limit {
        return input.to_string();
    }
    let mut output: String = input.chars().take(limit.saturating_sub(1)).collect();
    output.push(TRUNCATION_MARKER);
    output
}

fn locate_block(value: &Value, depth: usize) -> Option<&Map<String, Value>> {
    match value {
        Value::Array(items) if depth < MAX_WRAPPER_DEPTH => {
            locate_block(items.first()?, depth + 1)
        }
        Value::Object(map) => {
            if depth < MAX_WRAPPER_DEPTH {
                for key in WRAPPER_KEYS {
                    match map.get(*key) {
                        // an empty result list means the resolver found nothing
                        Some(Value::Array(items)) if items.is_empty() && *key == LIST_KEY => {
                            return None
                        }
                        // an empty `data` array leaves the top-level fields in charge
                        Some(Value::Array(items)) if items.is_empty() => {}
                        Some(inner @ (Value::Array(_) | Value::Object(_))) => {
                            return locate_block(inner, depth + 1);
                        }
                        _ => {}
                    }
                }
            }
            Some(map)
        }
        _ => None,
    }
}

fn first_match<'a, T, F>(record: &'a Map<String, Value>, rules: &[FieldRule], extract: F) -> Option<T>
where
    F: Fn(&'a Value) -> Option<T>,
{
    rules
        .iter()
        .filter_map(|rule| rule.lookup(record))
        .find_map(extract)
}

fn text(value: &Value) -> Option<&str> {
    value
        .as_str()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn http_url(value: &Value) -> Option<String> {
    let raw = text(value)?;
    let parsed = Url::parse(raw).ok()?;
    matches!(parsed.scheme(), "http" | "https").then(|| raw.to_string())
}

fn byte_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64)),
        Value::String(raw) => raw.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn quality_map(value: &Value) -> Option<BTreeMap<String, String>> {
    let map = value.as_object()?;
    let candidates: BTreeMap<String, String> = map
        .iter()
        .filter_map(|(label, url)| {
            let label = label.trim();
            if label.is_empty() {
                return None;
            }
            http_url(url).map(|url| (label.to_string(), url))
        })
        .collect();
    (!candidates.is_empty()).then_some(candidates)
}
