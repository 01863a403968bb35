use thiserror::Error;

use crate::analysis::AnalysisError;
use crate::config::ConfigError;
use crate::llm::LlmError;
use crate::provider::{ClientBuildError, PayloadError};

/// Top-level error for the `docbrief` binary.
#[derive(Debug, Error)]
pub enum AppError {
    /// The config file could not be read or parsed, or failed validation.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// The provider client could not be built (bad endpoint, TLS setup).
    #[error("Provider client error: {0}")]
    Provider(#[from] ClientBuildError),

    /// The LLM client could not be built.
    #[error("LLM client error: {0}")]
    Llm(#[from] LlmError),

    /// The input file cannot be submitted (e.g. it is empty).
    #[error("Invalid document: {0}")]
    Payload(#[from] PayloadError),

    /// The analysis itself ended without a result.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Reading the input file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing JSON output failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Process exit code for the CLI. Each analysis outcome gets its own code
    /// so scripts can tell them apart.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) => 2,
            AppError::Payload(_) => 64,
            AppError::Analysis(err) => match err {
                AnalysisError::Submission(_) => 3,
                AnalysisError::ProviderFailure(_) => 4,
                AnalysisError::TimedOut { .. } => 5,
                AnalysisError::Cancelled { .. } => 130,
                AnalysisError::Poll(_) | AnalysisError::Report(_) => 1,
            },
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::provider::FailureDetail;

    #[test]
    fn analysis_outcomes_have_distinct_exit_codes() {
        let submission = AppError::from(AnalysisError::Submission(
            crate::provider::SubmissionError::MalformedResponse("x".into()),
        ));
        let failed = AppError::from(AnalysisError::ProviderFailure(FailureDetail::new(serde_json::Value::Null)));
        let timed_out = AppError::from(AnalysisError::TimedOut {
            attempts: 120,
            waited: Duration::from_secs(180),
        });

        let codes = [submission.exit_code(), failed.exit_code(), timed_out.exit_code()];
        assert_eq!(codes, [3, 4, 5]);
    }

    #[test]
    fn config_and_payload_errors() {
        assert_eq!(AppError::from(ConfigError::Invalid("x".into())).exit_code(), 2);
        assert_eq!(AppError::from(PayloadError::Empty).exit_code(), 64);
        assert_eq!(
            AppError::from(PayloadError::Empty).to_string(),
            "Invalid document: document payload is empty"
        );
    }
}
