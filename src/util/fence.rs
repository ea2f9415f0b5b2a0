//! Markdown code-fence helpers shared by extraction and validation

use std::sync::LazyLock;

use regex::Regex;

/// First ```lang ... ``` block; the info string is optional
static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[ \t]*([A-Za-z0-9_+#.\-]*)[^\n]*\n(.*?)```").unwrap()
});

/// A fenced code block found in a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FencedBlock<'a> {
    /// Info-string language, `None` for a bare fence
    pub language: Option<&'a str>,
    pub body: &'a str,
}

pub fn first_fenced_block(text: &str) -> Option<FencedBlock<'_>> {
    let caps = FENCE_RE.captures(text)?;
    let language = caps
        .get(1)
        .map(|m| m.as_str())
        .filter(|lang| !lang.is_empty());
    let body = caps.get(2).map_or("", |m| m.as_str()).trim_end();
    Some(FencedBlock { language, body })
}

/// Body of the first fenced block, or the trimmed text when there is none
pub fn strip_code_fence(text: &str) -> &str {
    match first_fenced_block(text) {
        Some(block) => block.body,
        None => text.trim(),
    }
}
