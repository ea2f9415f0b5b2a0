//! Output Validation - type contracts and corrective retry prompts
//!
//! `validate` never errors: every problem becomes an entry in
//! [`ValidationResult::errors`], usually paired with a suggestion the
//! provider can act on. `build_retry_prompt` turns a failed result into the
//! next attempt's prompt.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::ast::{OutputSchema, OutputType};
use crate::util::{first_fenced_block, strip_code_fence};

/// Unfenced code at least this long is accepted without a code block
pub const LONG_CODE_THRESHOLD: usize = 500;

/// Characters of the previous output echoed into a retry prompt
pub const DEFAULT_RETRY_OUTPUT_LIMIT: usize = 2000;

pub const EMPTY_OUTPUT_ERROR: &str = "Output is empty";

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s+\S").unwrap());

static INDENTED_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(?: {4}|\t)\S").unwrap());

static TEST_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\btest|\bspec\b|\bdescribe\s*\(|\bit\s*\(|\bassert|\bexpect\s*\()").unwrap()
});

const COMMENT_MARKERS: &[&str] = &["//", "/*", "#", "--", "\"\"\"", "<!--"];

/// Outcome of validating one output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub suggestions: Vec<String>,
}

impl ValidationResult {
    fn passed() -> Self {
        Self {
            valid: true,
            ..Self::default()
        }
    }

    fn fail(&mut self, error: impl Into<String>, suggestion: impl Into<String>) {
        self.valid = false;
        self.errors.push(error.into());
        self.suggestions.push(suggestion.into());
    }
}

/// Check an output against its declared type and optional schema
pub fn validate(output: &str, output_type: OutputType, schema: Option<&OutputSchema>) -> ValidationResult {
    if output.trim().is_empty() {
        return ValidationResult {
            valid: false,
            errors: vec![EMPTY_OUTPUT_ERROR.to_string()],
            suggestions: vec!["Provide a non-empty response".to_string()],
        };
    }

    let mut result = ValidationResult::passed();
    let default_schema = OutputSchema::default();
    let schema = schema.unwrap_or(&default_schema);

    match output_type {
        OutputType::Json => validate_json(output, schema, &mut result),
        OutputType::Code => validate_code(output, schema, &mut result),
        OutputType::Markdown => validate_markdown(output, schema, &mut result),
        OutputType::Text => validate_text(output, schema, &mut result),
    }

    result
}

// ═══════════════════════════════════════════════════════════════════════════
// Per-type rules
// ═══════════════════════════════════════════════════════════════════════════

fn validate_json(output: &str, schema: &OutputSchema, result: &mut ValidationResult) {
    let parsed: Value = match serde_json::from_str(strip_code_fence(output)) {
        Ok(v) => v,
        Err(e) => {
            result.fail(
                format!("Invalid JSON: {e}"),
                "Return only a valid JSON document, without surrounding prose",
            );
            return;
        }
    };

    if !schema.required.is_empty() {
        match parsed.as_object() {
            Some(obj) => {
                for key in &schema.required {
                    if !obj.contains_key(key) {
                        result.fail(
                            format!("Missing required key: \"{key}\""),
                            format!("Add the \"{key}\" field to the JSON object"),
                        );
                    }
                }
            }
            None => result.fail(
                "Expected a JSON object",
                format!(
                    "Return an object with the keys: {}",
                    schema.required.join(", ")
                ),
            ),
        }
    }

    if let Some(json_schema) = &schema.json_schema {
        match jsonschema::validator_for(json_schema) {
            Ok(validator) => {
                let violations: Vec<String> = validator
                    .iter_errors(&parsed)
                    .map(|e| format!("Schema violation: {e}"))
                    .collect();
                if !violations.is_empty() {
                    result.valid = false;
                    result.errors.extend(violations);
                    result
                        .suggestions
                        .push("Make the JSON conform to the expected schema".to_string());
                }
            }
            Err(e) => warn!(error = %e, "invalid JSON Schema in output schema, skipping"),
        }
    }
}

fn validate_code(output: &str, schema: &OutputSchema, result: &mut ValidationResult) {
    let block = first_fenced_block(output);
    let has_indented = INDENTED_CODE_RE.is_match(output);

    if block.is_none() && !has_indented && output.len() < LONG_CODE_THRESHOLD {
        let fence = schema.language.as_deref().unwrap_or("");
        result.fail(
            "No code block found",
            format!("Wrap the code in a fenced block, e.g. ```{fence}"),
        );
    }

    if let (Some(expected), Some(block)) = (schema.language.as_deref(), block) {
        let matches = block
            .language
            .is_some_and(|found| found.eq_ignore_ascii_case(expected));
        if !matches {
            result.fail(
                format!(
                    "Expected {expected} code, found {}",
                    block.language.unwrap_or("an untagged block")
                ),
                format!("Tag the code block as ```{expected}"),
            );
        }
    }

    let code = block.map_or(output, |b| b.body);

    if schema.require_tests && !TEST_MARKER_RE.is_match(output) {
        result.fail("No tests found", "Include unit tests for the code");
    }

    if schema.require_comments && !COMMENT_MARKERS.iter().any(|m| code.contains(m)) {
        result.fail("No comments found", "Add comments explaining the code");
    }

    if let Some(max) = schema.max_lines {
        let lines = code.lines().count();
        if lines > max {
            result.fail(
                format!("Code has {lines} lines, maximum is {max}"),
                format!("Shorten the code to at most {max} lines"),
            );
        }
    }
}

fn validate_markdown(output: &str, schema: &OutputSchema, result: &mut ValidationResult) {
    if schema.require_headers && !HEADING_RE.is_match(output) {
        result.fail("No markdown headers found", "Structure the response with # headings");
    }
    if schema.require_code_blocks && first_fenced_block(output).is_none() {
        result.fail("No code blocks found", "Include at least one fenced ``` code block");
    }
}

fn validate_text(output: &str, schema: &OutputSchema, result: &mut ValidationResult) {
    let len = output.chars().count();

    if let Some(min) = schema.min_length {
        if len < min {
            result.fail(
                format!("Output too short: {len} characters, minimum is {min}"),
                format!("Expand the response to at least {min} characters"),
            );
        }
    }

    if let Some(max) = schema.max_length {
        if len > max {
            result.fail(
                format!("Output too long: {len} characters, maximum is {max}"),
                format!("Shorten the response to at most {max} characters"),
            );
        }
    }

    if let Some(pattern) = &schema.pattern {
        match Regex::new(pattern) {
            Ok(re) if !re.is_match(output) => result.fail(
                format!("Output does not match pattern: {pattern}"),
                format!("Format the response to match /{pattern}/"),
            ),
            Ok(_) => {}
            Err(e) => warn!(pattern = %pattern, error = %e, "invalid text pattern, skipping"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Retry prompt
// ═══════════════════════════════════════════════════════════════════════════

/// Build the corrective prompt for the next attempt
///
/// Deterministic: same inputs, same prompt. `output_limit` caps how many
/// characters of the previous output are echoed back.
pub fn build_retry_prompt(
    original_prompt: &str,
    previous_output: &str,
    output_type: OutputType,
    schema: Option<&OutputSchema>,
    result: &ValidationResult,
    output_limit: usize,
) -> String {
    let mut prompt = String::with_capacity(original_prompt.len() + output_limit.min(previous_output.len()) + 512);

    let _ = writeln!(
        prompt,
        "Your previous response did not meet the required {output_type} format.\n"
    );

    prompt.push_str("Errors:\n");
    for error in &result.errors {
        let _ = writeln!(prompt, "- {error}");
    }

    if !result.suggestions.is_empty() {
        prompt.push_str("\nSuggestions:\n");
        for suggestion in &result.suggestions {
            let _ = writeln!(prompt, "- {suggestion}");
        }
    }

    if let Some(schema) = schema.filter(|s| **s != OutputSchema::default()) {
        if let Ok(echo) = serde_json::to_string_pretty(schema) {
            let _ = writeln!(prompt, "\nExpected schema:\n{echo}");
        }
    }

    let _ = writeln!(
        prompt,
        "\nPrevious response:\n{}",
        truncate_chars(previous_output, output_limit)
    );
    let _ = writeln!(prompt, "\nOriginal request:\n{original_prompt}");
    let _ = write!(
        prompt,
        "\nPlease resubmit your complete response in the correct {output_type} format, fixing every error listed above."
    );

    prompt
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}\n[... truncated]", &text[..cut]),
        None => text.to_string(),
    }
}
