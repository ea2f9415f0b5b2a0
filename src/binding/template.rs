//! Template Resolution - `{{name}}` substitution
//!
//! Single-pass resolution with Cow<str> for zero-alloc when no templates.
//! Substituted values are never re-scanned, so an output containing `{{x}}`
//! lands in the prompt verbatim.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::ast::VariableBinding;
use crate::store::{resolve_qualified, OutputStore, ProducedEntry};

/// Reserved variable bound to the run input
pub const INPUT_VAR: &str = "input";

/// Pre-compiled regex for {{name}} or {{node.key}} pattern
static VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*(\w[\w\-]*(?:\.[\w\-\[\]]+)*)\s*\}\}").unwrap());

/// Resolve every `{{name}}` in a template
///
/// Returns Cow::Borrowed when the template has no placeholders.
/// Outputs are snapshotted once so all placeholders see the same state.
pub fn substitute<'a>(
    template: &'a str,
    bindings: &BTreeMap<String, VariableBinding>,
    input: &str,
    outputs: &OutputStore,
) -> Cow<'a, str> {
    if !template.contains("{{") {
        return Cow::Borrowed(template);
    }

    let produced = outputs.snapshot();
    let mut result = String::with_capacity(template.len() + 64);
    let mut last_end = 0;
    let mut replaced = false;

    for cap in VAR_RE.captures_iter(template) {
        let Some(m) = cap.get(0) else { continue };
        result.push_str(&template[last_end..m.start()]);
        result.push_str(&resolve_variable(&cap[1], bindings, input, &produced));
        last_end = m.end();
        replaced = true;
    }

    if !replaced {
        return Cow::Borrowed(template);
    }

    result.push_str(&template[last_end..]);
    Cow::Owned(result)
}

/// Resolve a single variable name
///
/// `produced` is in production order; lookups scan it most recent first.
pub fn resolve_variable(
    name: &str,
    bindings: &BTreeMap<String, VariableBinding>,
    input: &str,
    produced: &[ProducedEntry],
) -> String {
    if name == INPUT_VAR {
        return input.to_string();
    }

    match bindings.get(name) {
        Some(VariableBinding::Static { value }) => return value.clone(),
        Some(VariableBinding::Input) => return input.to_string(),
        Some(VariableBinding::Upstream) | None => {}
    }

    // Exact output key
    if let Some(value) = produced.iter().rev().find_map(|e| e.outputs.get(name)) {
        return value_to_string(value);
    }

    if let Some(value) = resolve_qualified(produced, name) {
        return value_to_string(value);
    }

    // Most recent producer with anything to offer
    if let Some(value) = produced.iter().rev().find_map(ProducedEntry::first_value) {
        return value_to_string(value);
    }

    input.to_string()
}

/// Strings verbatim, everything else as compact JSON
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Variable names referenced by a template, in order of appearance, deduplicated
pub fn extract_refs(template: &str) -> Vec<String> {
    let mut refs: Vec<String> = Vec::new();
    for cap in VAR_RE.captures_iter(template) {
        let name = &cap[1];
        if !refs.iter().any(|r| r == name) {
            refs.push(name.to_string());
        }
    }
    refs
}
