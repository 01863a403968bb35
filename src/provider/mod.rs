pub mod client;
pub mod error;
pub mod types;

pub use client::{ProviderClient, StatusSource, Submitter};
pub use error::{ClientBuildError, QueryError, SubmissionError};
pub use types::{
    AnalyzedDocument, DocumentPayload, FailureDetail, OperationReference, OperationStatus, PayloadError,
};
