use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode, Url, header};

use super::error::{ClientBuildError, QueryError, SubmissionError};
use super::types::{DocumentPayload, OperationReference, OperationStatus, StatusResponse};
use crate::config::AnalyzerConfig;

const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OPERATION_HEADER: &str = "Operation-Location";

/// Sends a document to the provider and returns the handle of the job it started.
pub trait Submitter {
    fn submit(
        &self,
        payload: &DocumentPayload,
    ) -> impl Future<Output = Result<OperationReference, SubmissionError>> + Send;
}

/// Fetches the current status of a job, one query per call.
pub trait StatusSource {
    fn fetch_status(
        &self,
        reference: &OperationReference,
    ) -> impl Future<Output = Result<OperationStatus, QueryError>> + Send;
}

/// HTTP client for a Document-Intelligence style analysis API.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct ProviderClient {
    client: Client,
    analyze_url: Url,
    api_key: String,
}

impl ProviderClient {
    pub fn new(config: &AnalyzerConfig) -> Result<Self, ClientBuildError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(ClientBuildError::Http)?;

        let raw = format!(
            "{}/documentintelligence/documentModels/{}:analyze?api-version={}",
            config.endpoint.trim_end_matches('/'),
            config.model_id,
            config.api_version
        );
        let analyze_url =
            Url::parse(&raw).map_err(|e| ClientBuildError::InvalidEndpoint(format!("{raw}: {e}")))?;

        Ok(Self {
            client,
            analyze_url,
            api_key: config.api_key.clone(),
        })
    }

    pub fn analyze_url(&self) -> &Url {
        &self.analyze_url
    }
}

/// Error bodies are informational only; a failed read keeps the status.
fn body_or_placeholder(read: reqwest::Result<String>) -> String {
    read.unwrap_or_else(|err| {
        tracing::warn!(error = %err, "failed to read provider error body");
        "unknown error".to_string()
    })
}

impl Submitter for ProviderClient {
    #[tracing::instrument(
        skip(self, payload),
        fields(bytes = payload.len(), content_type = %payload.content_type())
    )]
    async fn submit(&self, payload: &DocumentPayload) -> Result<OperationReference, SubmissionError> {
        let response = self
            .client
            .post(self.analyze_url.clone())
            .header(KEY_HEADER, &self.api_key)
            .header(header::CONTENT_TYPE, payload.content_type())
            .body(payload.bytes().clone())
            .send()
            .await
            .map_err(SubmissionError::Transport)?;

        let status = response.status();
        if status != StatusCode::ACCEPTED {
            let body = body_or_placeholder(response.text().await);
            tracing::warn!(status = status.as_u16(), "provider rejected submission");
            return Err(SubmissionError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let raw = response
            .headers()
            .get(OPERATION_HEADER)
            .ok_or_else(|| {
                SubmissionError::MalformedResponse(format!("missing {OPERATION_HEADER} header"))
            })?
            .to_str()
            .map_err(|_| {
                SubmissionError::MalformedResponse(format!("{OPERATION_HEADER} is not valid text"))
            })?;

        let reference = OperationReference::resolve(&self.analyze_url, raw).ok_or_else(|| {
            SubmissionError::MalformedResponse(format!("{OPERATION_HEADER} is not a usable reference: {raw:?}"))
        })?;

        tracing::debug!(operation = %reference, "submission accepted");
        Ok(reference)
    }
}

impl StatusSource for ProviderClient {
    async fn fetch_status(&self, reference: &OperationReference) -> Result<OperationStatus, QueryError> {
        let response = self
            .client
            .get(reference.url().clone())
            .header(KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(QueryError::Transport)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            return Err(QueryError::Throttled { retry_after_secs });
        }

        if !status.is_success() {
            let body = body_or_placeholder(response.text().await);
            return Err(QueryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await.map_err(QueryError::Transport)?;
        let parsed: StatusResponse =
            serde_json::from_slice(&body).map_err(|e| QueryError::Malformed(e.to_string()))?;

        Ok(parsed.into())
    }
}
