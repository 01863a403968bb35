//! In-process fakes shared by unit tests.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::llm::{LlmError, ReportWriter};
use crate::operation::Sleeper;
use crate::provider::{
    AnalyzedDocument, DocumentPayload, OperationReference, OperationStatus, QueryError, StatusSource,
    SubmissionError, Submitter,
};

pub fn running() -> OperationStatus {
    OperationStatus::Running
}

pub fn succeeded(text: &str) -> OperationStatus {
    OperationStatus::Succeeded(AnalyzedDocument {
        text: text.to_string(),
        page_count: 1,
    })
}

pub fn unavailable() -> QueryError {
    QueryError::Status {
        status: 503,
        body: "Service Unavailable".into(),
    }
}

pub fn pdf() -> DocumentPayload {
    DocumentPayload::new(b"%PDF-1.7 test".to_vec(), "application/pdf").unwrap()
}

/// Answers status queries from a script, then from a fallback status.
pub struct ScriptedProvider {
    submission: Mutex<Option<Result<OperationReference, SubmissionError>>>,
    script: Mutex<VecDeque<Result<OperationStatus, QueryError>>>,
    fallback: Option<OperationStatus>,
    submits: AtomicU32,
    calls: AtomicU32,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<OperationStatus, QueryError>>) -> Self {
        Self {
            submission: Mutex::new(None),
            script: Mutex::new(script.into()),
            fallback: None,
            submits: AtomicU32::new(0),
            calls: AtomicU32::new(0),
        }
    }

    pub fn always(status: OperationStatus) -> Self {
        Self {
            fallback: Some(status),
            ..Self::new(Vec::new())
        }
    }

    pub fn rejecting(error: SubmissionError) -> Self {
        let provider = Self::new(Vec::new());
        *provider.submission.lock().unwrap() = Some(Err(error));
        provider
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn submits(&self) -> u32 {
        self.submits.load(Ordering::SeqCst)
    }
}

impl Submitter for ScriptedProvider {
    async fn submit(&self, _payload: &DocumentPayload) -> Result<OperationReference, SubmissionError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        match self.submission.lock().unwrap().take() {
            Some(result) => result,
            None => Ok(OperationReference::parse("https://provider.test/operations/op-123").unwrap()),
        }
    }
}

impl StatusSource for ScriptedProvider {
    async fn fetch_status(&self, _reference: &OperationReference) -> Result<OperationStatus, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => Ok(self.fallback.clone().expect("status script exhausted")),
        }
    }
}

/// A status source whose queries never complete.
#[derive(Default)]
pub struct HangingSource;

impl StatusSource for HangingSource {
    fn fetch_status(
        &self,
        _reference: &OperationReference,
    ) -> impl Future<Output = Result<OperationStatus, QueryError>> + Send {
        std::future::pending()
    }
}

/// Records requested waits and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn durations(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.waits.lock().unwrap().len()
    }

    pub fn total(&self) -> Duration {
        self.waits.lock().unwrap().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.waits.lock().unwrap().push(duration);
        std::future::ready(())
    }
}

/// Report writer that echoes a canned answer and remembers its input.
pub struct CannedReporter {
    answer: Result<String, u16>,
    inputs: Mutex<Vec<String>>,
}

impl CannedReporter {
    pub fn ok(answer: &str) -> Self {
        Self {
            answer: Ok(answer.to_string()),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            answer: Err(status),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

impl ReportWriter for CannedReporter {
    async fn write_report(&self, text: &str) -> Result<String, LlmError> {
        self.inputs.lock().unwrap().push(text.to_string());
        match &self.answer {
            Ok(answer) => Ok(answer.clone()),
            Err(status) => Err(LlmError::ApiError {
                status: *status,
                message: "mock error".into(),
            }),
        }
    }
}
