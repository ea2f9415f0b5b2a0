//! Task node types
//!
//! Nodes are a tagged variant on `kind`. Only `work` nodes carry a template,
//! bindings and an output contract; `start` and `terminal` nodes are markers.
//!
//! ```yaml
//! - kind: work
//!   id: review
//!   provider: reviewer-1
//!   template: "Review this: {{code}}"
//!   outputType: json
//!   outputSchema:
//!     required: [verdict]
//!   extraction:
//!     mode: jsonpath
//!     pattern: $.verdict
//!     outputName: verdict
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Output key used when a node does not name its output
pub const DEFAULT_OUTPUT_NAME: &str = "output";

fn default_output_name() -> String {
    DEFAULT_OUTPUT_NAME.to_string()
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Node kind discriminant (without payload)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Start,
    Work,
    Terminal,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Work => write!(f, "work"),
            Self::Terminal => write!(f, "terminal"),
        }
    }
}

/// One unit of the execution graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskNode {
    Start(MarkerNode),
    Work(WorkNode),
    Terminal(MarkerNode),
}

impl TaskNode {
    pub fn id(&self) -> &str {
        match self {
            Self::Start(n) | Self::Terminal(n) => &n.id,
            Self::Work(n) => &n.id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Start(_) => NodeKind::Start,
            Self::Work(_) => NodeKind::Work,
            Self::Terminal(_) => NodeKind::Terminal,
        }
    }

    /// Human label, falling back to the node id
    pub fn display_label(&self) -> &str {
        let label = match self {
            Self::Start(n) | Self::Terminal(n) => n.label.as_deref(),
            Self::Work(n) => n.label.as_deref(),
        };
        label.unwrap_or_else(|| self.id())
    }

    pub fn as_work(&self) -> Option<&WorkNode> {
        match self {
            Self::Work(n) => Some(n),
            _ => None,
        }
    }
}

/// Payload of `start` and `terminal` nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl MarkerNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
        }
    }
}

/// Payload of a `work` node: a templated request for one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Capability provider identity (opaque)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default)]
    pub template: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub static_bindings: BTreeMap<String, VariableBinding>,
    #[serde(default)]
    pub output_type: OutputType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<OutputSchema>,
    #[serde(default)]
    pub extraction: Extraction,
    /// Overrides the runner's retry budget for this node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Overrides the invoker timeout for this node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl WorkNode {
    pub fn new(id: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            provider: None,
            template: template.into(),
            static_bindings: BTreeMap::new(),
            output_type: OutputType::default(),
            output_schema: None,
            extraction: Extraction::default(),
            max_retries: None,
            timeout_ms: None,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_binding(mut self, name: impl Into<String>, binding: VariableBinding) -> Self {
        self.static_bindings.insert(name.into(), binding);
        self
    }

    pub fn with_output_type(mut self, output_type: OutputType) -> Self {
        self.output_type = output_type;
        self
    }

    pub fn with_schema(mut self, schema: OutputSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_extraction(mut self, extraction: Extraction) -> Self {
        self.extraction = extraction;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// A template with nothing but whitespace cannot be dispatched
    pub fn has_template(&self) -> bool {
        !self.template.trim().is_empty()
    }
}

/// Where a named template variable takes its value from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum VariableBinding {
    /// Fixed value
    Static { value: String },
    /// The run's original input
    Input,
    /// Defer to upstream outputs
    Upstream,
}

impl VariableBinding {
    pub fn fixed(value: impl Into<String>) -> Self {
        Self::Static {
            value: value.into(),
        }
    }
}

/// Declared output type contract
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputType {
    #[default]
    Text,
    Code,
    Json,
    Markdown,
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Code => write!(f, "code"),
            Self::Json => write!(f, "json"),
            Self::Markdown => write!(f, "markdown"),
        }
    }
}

/// Structural constraints interpreted by the validator.
///
/// Which fields apply depends on the node's [`OutputType`]; the rest are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSchema {
    /// json: required top-level keys
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// json: full JSON Schema document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<Value>,
    /// code: expected fence language
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub require_tests: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub require_comments: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_lines: Option<usize>,
    /// markdown
    #[serde(default, skip_serializing_if = "is_false")]
    pub require_headers: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub require_code_blocks: bool,
    /// text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl OutputSchema {
    pub fn required_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required: keys.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// Strategy for turning a raw response into a stored value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    #[default]
    Full,
    Json,
    #[serde(rename = "jsonpath")]
    JsonPath,
    Regex,
    FirstLine,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    #[serde(default)]
    pub mode: ExtractionMode,
    /// JSON path for `jsonpath`, regular expression for `regex`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default = "default_output_name")]
    pub output_name: String,
}

impl Default for Extraction {
    fn default() -> Self {
        Self {
            mode: ExtractionMode::Full,
            pattern: None,
            output_name: default_output_name(),
        }
    }
}

impl Extraction {
    pub fn new(mode: ExtractionMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = name.into();
        self
    }
}
