//! The `run_analysis` boundary: submit a document, poll the operation to a
//! terminal state, then optionally ask the LLM for a report.
//!
//! Every way this can end maps to exactly one [`AnalysisError`] variant, so
//! callers can tell "could not submit", "provider failed", and "did not finish
//! in time" apart. [`AnalysisError::http_status`] gives the status code the
//! HTTP wrapper responds with.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::llm::{LlmClient, LlmError, ReportWriter};
use crate::operation::{
    NoopObserver, OperationResult, PollError, PollObserver, PollPolicy, Poller, Sleeper, TokioSleeper, millis,
};
use crate::provider::{DocumentPayload, FailureDetail, ProviderClient, StatusSource, SubmissionError, Submitter};

/// A finished analysis.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub id: Uuid,
    pub text: String,
    pub page_count: usize,
    pub report: Option<String>,
    pub analyzed_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("document could not be submitted: {0}")]
    Submission(#[from] SubmissionError),

    #[error("provider could not process the document: {0}")]
    ProviderFailure(FailureDetail),

    #[error("analysis did not finish after {attempts} status queries")]
    TimedOut { attempts: u32, waited: Duration },

    #[error("analysis cancelled after {attempts} status queries")]
    Cancelled { attempts: u32 },

    #[error("lost track of the analysis: {0}")]
    Poll(PollError),

    #[error("report generation failed: {0}")]
    Report(#[from] LlmError),
}

impl From<PollError> for AnalysisError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::Cancelled { attempts } => AnalysisError::Cancelled { attempts },
            other => AnalysisError::Poll(other),
        }
    }
}

/// JSON error shape returned to HTTP callers.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub status: u16,
    pub details: serde_json::Value,
}

impl AnalysisError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Submission(_) => "submission_failed",
            Self::ProviderFailure(_) => "provider_failed",
            Self::TimedOut { .. } => "timed_out",
            Self::Cancelled { .. } => "cancelled",
            Self::Poll(_) => "poll_failed",
            Self::Report(_) => "report_failed",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Submission(_) | Self::Poll(_) | Self::Report(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ProviderFailure(_) => StatusCode::BAD_GATEWAY,
            Self::TimedOut { .. } | Self::Cancelled { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        let details = match self {
            Self::Submission(SubmissionError::Rejected { status, body }) => serde_json::json!({
                "kind": self.kind(),
                "reason": "rejected",
                "provider_status": status,
                "provider_body": body,
            }),
            Self::Submission(err) => serde_json::json!({
                "kind": self.kind(),
                "reason": err.kind(),
                "message": err.to_string(),
            }),
            Self::ProviderFailure(detail) => serde_json::json!({
                "kind": self.kind(),
                "provider_error": detail.raw(),
            }),
            Self::TimedOut { attempts, waited } => serde_json::json!({
                "kind": self.kind(),
                "attempts": attempts,
                "waited_ms": millis(*waited),
            }),
            Self::Cancelled { attempts } => serde_json::json!({
                "kind": self.kind(),
                "attempts": attempts,
            }),
            Self::Poll(_) | Self::Report(_) => serde_json::json!({
                "kind": self.kind(),
                "message": self.to_string(),
            }),
        };

        ErrorBody {
            error: self.to_string(),
            status: self.http_status().as_u16(),
            details,
        }
    }
}

/// Runs analyses against one provider. Safe to share across concurrent
/// requests; the only shared state is the HTTP connection pool inside the
/// provider client and the permit counter capping in-flight operations.
pub struct AnalysisService<P, R, Z> {
    provider: P,
    reporter: Option<R>,
    sleeper: Z,
    policy: PollPolicy,
    permits: Arc<Semaphore>,
}

impl<P, R, Z> AnalysisService<P, R, Z>
where
    P: Submitter + StatusSource + Sync,
    R: ReportWriter + Sync,
    Z: Sleeper,
{
    pub fn new(provider: P, reporter: Option<R>, sleeper: Z, policy: PollPolicy, max_concurrent: usize) -> Self {
        Self {
            provider,
            reporter,
            sleeper,
            policy,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn run_analysis(
        &self,
        payload: &DocumentPayload,
        cancel: &CancellationToken,
    ) -> Result<Analysis, AnalysisError> {
        self.run_analysis_with(payload, cancel, &NoopObserver).await
    }

    /// Like [`run_analysis`](Self::run_analysis), reporting poll progress to `observer`.
    pub async fn run_analysis_with(
        &self,
        payload: &DocumentPayload,
        cancel: &CancellationToken,
        observer: &dyn PollObserver,
    ) -> Result<Analysis, AnalysisError> {
        let id = Uuid::new_v4();
        let span = tracing::info_span!(
            "run_analysis",
            analysis_id = %id,
            bytes = payload.len(),
            content_type = %payload.content_type()
        );

        async move {
            let result = self.analyze(id, payload, cancel, observer).await;
            match &result {
                Ok(analysis) => tracing::info!(
                    pages = analysis.page_count,
                    chars = analysis.text.len(),
                    report = analysis.report.is_some(),
                    "analysis complete"
                ),
                Err(err) => tracing::warn!(kind = err.kind(), error = %err, "analysis failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn analyze(
        &self,
        id: Uuid,
        payload: &DocumentPayload,
        cancel: &CancellationToken,
        observer: &dyn PollObserver,
    ) -> Result<Analysis, AnalysisError> {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AnalysisError::Cancelled { attempts: 0 }),
            permit = self.permits.acquire() => {
                permit.map_err(|_| AnalysisError::Cancelled { attempts: 0 })?
            }
        };

        let reference = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AnalysisError::Cancelled { attempts: 0 }),
            submitted = self.provider.submit(payload) => submitted?,
        };

        let outcome = Poller::new(&self.provider, &self.sleeper, self.policy)
            .with_observer(observer)
            .poll(reference, cancel)
            .await?;
        drop(permit);

        let document = match outcome {
            OperationResult::Succeeded(document) => document,
            OperationResult::Failed(detail) => return Err(AnalysisError::ProviderFailure(detail)),
            OperationResult::TimedOut { attempts, waited } => {
                return Err(AnalysisError::TimedOut { attempts, waited });
            }
        };

        let report = match &self.reporter {
            Some(reporter) if !document.text.trim().is_empty() => tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AnalysisError::Cancelled { attempts: 0 }),
                report = reporter.write_report(&document.text) => Some(report?),
            },
            Some(_) => {
                tracing::info!("no text recognised, skipping report");
                None
            }
            None => None,
        };

        Ok(Analysis {
            id,
            text: document.text,
            page_count: document.page_count,
            report,
            analyzed_at: Utc::now(),
        })
    }
}

/// The service as wired in production.
pub type LiveService = AnalysisService<ProviderClient, LlmClient, TokioSleeper>;

impl AnalysisService<ProviderClient, LlmClient, TokioSleeper> {
    /// Builds the production service. The report step is enabled only when
    /// `with_report` is set and an LLM key is configured.
    pub fn from_config(config: &Config, with_report: bool) -> Result<Self, AppError> {
        let provider = ProviderClient::new(&config.analyzer)?;
        let reporter = if with_report && config.llm.is_enabled() {
            Some(LlmClient::new(&config.llm)?)
        } else {
            tracing::debug!("report generation disabled");
            None
        };

        Ok(Self::new(
            provider,
            reporter,
            TokioSleeper,
            PollPolicy::from(&config.analyzer),
            config.analyzer.max_concurrent_operations,
        ))
    }
}
