use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};

use super::error::LlmError;
use super::types::{Message, MessagesRequest, MessagesResponse};
use crate::config::LlmConfig;

const API_VERSION: &str = "2023-06-01";

const REPORT_INSTRUCTIONS: &str = "You are a careful analyst. Read the document text below, which was \
extracted page by page, and write a concise report in Markdown with these sections: \
Summary, Key Points, Figures and Dates, Open Questions. Only use information present in the text. \
If the text is unreadable or too short to summarise, say so plainly.\n\nDocument text:\n";

/// Turns extracted document text into a written report.
pub trait ReportWriter {
    fn write_report(&self, text: &str) -> impl Future<Output = Result<String, LlmError>> + Send;
}

/// Builds the fixed-instruction prompt, truncating the document text on a
/// char boundary to at most `max_input_chars` characters.
pub fn build_prompt(text: &str, max_input_chars: usize) -> String {
    let clipped = match text.char_indices().nth(max_input_chars) {
        Some((cut, _)) => &text[..cut],
        None => text,
    };
    format!("{REPORT_INSTRUCTIONS}{clipped}")
}

pub struct LlmClient {
    api_key: String,
    client: Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
    max_input_chars: usize,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            api_key: config.api_key.clone(),
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_input_chars: config.max_input_chars,
        })
    }

    pub async fn send_message(&self, req: &MessagesRequest) -> Result<MessagesResponse, LlmError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(req)
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs.saturating_mul(1000))
                .unwrap_or(1000);
            return Err(LlmError::RateLimited {
                retry_after_ms: retry_after,
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<MessagesResponse>().await?)
    }
}

impl ReportWriter for LlmClient {
    #[tracing::instrument(skip(self, text), fields(model = %self.model, chars = text.len()))]
    async fn write_report(&self, text: &str) -> Result<String, LlmError> {
        let req = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user".into(),
                content: build_prompt(text, self.max_input_chars),
            }],
        };

        let report = self.send_message(&req).await?.text();
        if report.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        tracing::debug!(report_chars = report.len(), "report written");
        Ok(report)
    }
}
