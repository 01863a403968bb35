//! Data types exchanged with the document-analysis provider.
//!
//! The provider answers status queries with loosely shaped JSON. This module
//! parses it into [`OperationStatus`], a closed set of variants plus an
//! explicit fallback for status strings we do not recognise.

use std::fmt;

use bytes::Bytes;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected attempts to build a [`DocumentPayload`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("document payload is empty")]
    Empty,
}

/// An immutable document plus the content type reported by the caller.
///
/// The content type is passed to the provider unchanged; the provider is
/// authoritative on whether it can read the document.
#[derive(Debug, Clone)]
pub struct DocumentPayload {
    bytes: Bytes,
    content_type: String,
}

impl DocumentPayload {
    pub fn new(bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Result<Self, PayloadError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(PayloadError::Empty);
        }
        Ok(Self {
            bytes,
            content_type: content_type.into(),
        })
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Opaque handle to a job the provider accepted.
///
/// Only meaningful to the poller that received it; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationReference(Url);

impl OperationReference {
    /// Parses an absolute URL.
    pub fn parse(raw: &str) -> Option<Self> {
        Url::parse(raw.trim()).ok().map(Self)
    }

    /// Resolves the provider's reference against `base`. Absolute values are
    /// taken as-is; relative ones (e.g. `op-123`) are joined to `base`. Blank
    /// or unresolvable values yield `None`.
    pub fn resolve(base: &Url, raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        base.join(raw).ok().map(Self)
    }

    pub fn url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for OperationReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Text recognised by a successful analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzedDocument {
    pub text: String,
    pub page_count: usize,
}

/// The provider's failure detail, kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureDetail(serde_json::Value);

impl FailureDetail {
    pub fn new(raw: serde_json::Value) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn code(&self) -> Option<&str> {
        self.0.get("code").and_then(|v| v.as_str())
    }

    pub fn message(&self) -> Option<&str> {
        self.0.get("message").and_then(|v| v.as_str())
    }
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code(), self.message()) {
            (Some(code), Some(message)) => write!(f, "{code}: {message}"),
            (None, Some(message)) => f.write_str(message),
            (Some(code), None) => f.write_str(code),
            (None, None) if self.0.is_null() => f.write_str("no detail provided"),
            (None, None) => write!(f, "{}", self.0),
        }
    }
}

/// One observation of the remote job.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationStatus {
    Running,
    Succeeded(AnalyzedDocument),
    Failed(FailureDetail),
    /// A status string we do not know. Polling treats it as `Running`.
    Other(String),
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_))
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Running => "running",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
            Self::Other(raw) => raw,
        }
    }
}

/// Body of a status query response.
#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(rename = "analyzeResult")]
    pub analyze_result: Option<AnalyzeResult>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeResult {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
pub struct Page {
    #[serde(rename = "pageNumber")]
    pub page_number: u32,
    #[serde(default)]
    pub lines: Vec<Line>,
}

#[derive(Debug, Deserialize)]
pub struct Line {
    pub content: String,
}

impl AnalyzeResult {
    /// Renders one `Page N: ...` line per page. Falls back to the flat
    /// `content` field when the provider sent no page breakdown.
    pub fn into_document(self) -> AnalyzedDocument {
        if self.pages.is_empty() {
            return AnalyzedDocument {
                text: self.content.unwrap_or_default(),
                page_count: 0,
            };
        }

        let page_count = self.pages.len();
        let text = self
            .pages
            .iter()
            .map(|page| {
                let lines: Vec<&str> = page.lines.iter().map(|l| l.content.as_str()).collect();
                format!("Page {}: {}", page.page_number, lines.join(" "))
            })
            .collect::<Vec<_>>()
            .join("\n");

        AnalyzedDocument { text, page_count }
    }
}

impl From<StatusResponse> for OperationStatus {
    fn from(resp: StatusResponse) -> Self {
        let status = resp.status.trim();
        if status.eq_ignore_ascii_case("succeeded") {
            let document = resp.analyze_result.unwrap_or_default().into_document();
            OperationStatus::Succeeded(document)
        } else if status.eq_ignore_ascii_case("failed") {
            OperationStatus::Failed(FailureDetail::new(resp.error.unwrap_or(serde_json::Value::Null)))
        } else if status.eq_ignore_ascii_case("running") {
            OperationStatus::Running
        } else {
            OperationStatus::Other(status.to_string())
        }
    }
}
