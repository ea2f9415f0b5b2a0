//! Output Extraction - raw response → stored value
//!
//! Extraction never fails: every mode degrades to the raw response text, so
//! a misconfigured extraction cannot stall a run.

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::ast::{Extraction, ExtractionMode};
use crate::util::{jsonpath, strip_code_fence};

/// Apply a node's extraction settings
pub fn extract_with(text: &str, extraction: &Extraction) -> Value {
    extract(text, extraction.mode, extraction.pattern.as_deref())
}

/// Extract a value from a raw response
///
/// - `full`: text unchanged
/// - `json`: strip code fence, parse
/// - `jsonpath`: parse as `json`, then walk `pattern`
/// - `regex`: first capture group, else whole match
/// - `first_line`: text up to the first line break, trimmed
pub fn extract(text: &str, mode: ExtractionMode, pattern: Option<&str>) -> Value {
    let raw = || Value::String(text.to_string());

    match mode {
        ExtractionMode::Full => raw(),
        ExtractionMode::Json => parse_json(text).unwrap_or_else(raw),
        ExtractionMode::JsonPath => {
            let Some(path) = pattern else {
                return parse_json(text).unwrap_or_else(raw);
            };
            parse_json(text)
                .and_then(|parsed| jsonpath::resolve(&parsed, path).cloned())
                .unwrap_or_else(raw)
        }
        ExtractionMode::Regex => {
            let Some(pattern) = pattern else {
                return raw();
            };
            match Regex::new(pattern) {
                Ok(re) => re
                    .captures(text)
                    .and_then(|caps| caps.get(1).or_else(|| caps.get(0)))
                    .map(|m| Value::String(m.as_str().to_string()))
                    .unwrap_or_else(raw),
                Err(e) => {
                    debug!(pattern, error = %e, "invalid extraction regex, keeping raw response");
                    raw()
                }
            }
        }
        ExtractionMode::FirstLine => {
            let line = text.lines().next().unwrap_or("");
            Value::String(line.trim().to_string())
        }
    }
}

fn parse_json(text: &str) -> Option<Value> {
    serde_json::from_str(strip_code_fence(text)).ok()
}
