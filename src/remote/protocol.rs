//! Wire messages
//!
//! One JSON object per message, discriminated by `type`:
//!
//! ```json
//! {"type":"request","correlationId":"…","providerId":"writer","payload":"…"}
//! {"type":"response","correlationId":"…","providerId":"writer","content":"…"}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    Request(ProviderRequest),
    Response(ProviderResponse),
}

impl WireMessage {
    pub fn from_line(line: &str) -> Result<Self> {
        serde_json::from_str(line).map_err(|e| RelayError::Protocol {
            details: format!("{e}: {}", truncate(line, 120)),
        })
    }

    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self).map_err(|e| RelayError::Protocol {
            details: e.to_string(),
        })?;
        line.push('\n');
        Ok(line)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRequest {
    pub correlation_id: String,
    pub provider_id: String,
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResponse {
    /// Absent for legacy providers that do not echo ids
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub provider_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProviderResponse {
    pub fn content(
        correlation_id: impl Into<String>,
        provider_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: Some(correlation_id.into()),
            provider_id: provider_id.into(),
            content: Some(content.into()),
            error: None,
        }
    }

    pub fn error(
        correlation_id: impl Into<String>,
        provider_id: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: Some(correlation_id.into()),
            provider_id: provider_id.into(),
            content: None,
            error: Some(error.into()),
        }
    }

    /// A provider-reported `error` wins over `content`; no content is empty text
    pub fn into_result(self) -> Result<String> {
        match self.error {
            Some(message) => Err(RelayError::ProviderError {
                provider_id: self.provider_id,
                message,
            }),
            None => Ok(self.content.unwrap_or_default()),
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((cut, _)) => &s[..cut],
        None => s,
    }
}
