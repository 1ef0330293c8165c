//! JSON-LD (`application/ld+json`) extraction shared by the metadata-reading layers.

use dropwatch_core_types::EventMetadata;
use scraper::Html;
use serde_json::Value;

use crate::errors::Result;
use crate::html::{raw_text_of, select_all};

const SCRIPT_SELECTOR: &str = "script[type=\"application/ld+json\"]";

/// Every JSON-LD entry on the page, flattened out of arrays and `@graph`s.
#[derive(Debug, Default)]
pub struct JsonLdScan {
    pub entries: Vec<Value>,
    /// Non-empty script blocks seen.
    pub blocks: usize,
    /// Parse failures, one per broken block.
    pub errors: Vec<String>,
}

impl JsonLdScan {
    pub fn events<'a>(&'a self, types: &'a [String]) -> impl Iterator<Item = &'a Value> + 'a {
        self.entries.iter().filter(move |entry| is_event(entry, types))
    }

    /// Every block was present but none could be read.
    pub fn all_blocks_broken(&self) -> bool {
        self.blocks > 0 && self.errors.len() == self.blocks
    }
}

pub fn scan(document: &Html) -> Result<JsonLdScan> {
    let mut result = JsonLdScan::default();
    for script in select_all(document, SCRIPT_SELECTOR)? {
        let body = raw_text_of(&script);
        let body = body.trim();
        if body.is_empty() {
            continue;
        }
        result.blocks += 1;
        match serde_json::from_str::<Value>(body) {
            Ok(value) => flatten(value, &mut result.entries),
            Err(err) => result.errors.push(err.to_string()),
        }
    }
    Ok(result)
}

fn flatten(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => items.into_iter().for_each(|item| flatten(item, out)),
        Value::Object(mut map) => {
            if let Some(Value::Array(graph)) = map.remove("@graph") {
                graph.into_iter().for_each(|item| flatten(item, out));
            }
            if !map.is_empty() {
                out.push(Value::Object(map));
            }
        }
        _ => {}
    }
}

/// `@type` may be a string or a list of strings.
pub fn is_event(entry: &Value, types: &[String]) -> bool {
    match entry.get("@type") {
        Some(Value::String(kind)) => types.iter().any(|t| t == kind),
        Some(Value::Array(kinds)) => kinds
            .iter()
            .filter_map(Value::as_str)
            .any(|kind| types.iter().any(|t| t == kind)),
        _ => false,
    }
}

pub fn event_metadata(entry: &Value) -> EventMetadata {
    let location = entry.get("location");
    let address = location.and_then(|loc| loc.get("address"));
    EventMetadata {
        name: entry.get("name").and_then(scalar),
        start_date: entry.get("startDate").and_then(scalar),
        venue: location.and_then(|loc| loc.get("name")).and_then(scalar),
        street_address: address
            .and_then(|addr| addr.get("streetAddress"))
            .and_then(scalar),
        locality: address
            .and_then(|addr| addr.get("addressLocality"))
            .and_then(scalar),
    }
}

/// `offers` may be a single object or a list; non-objects are skipped.
pub fn offers(entry: &Value) -> Vec<&Value> {
    match entry.get("offers") {
        Some(Value::Array(items)) => items.iter().filter(|item| item.is_object()).collect(),
        Some(item @ Value::Object(_)) => vec![item],
        _ => Vec::new(),
    }
}

/// Strings are taken as-is, numbers rendered; everything else is absent.
pub fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
