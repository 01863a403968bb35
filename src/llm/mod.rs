pub mod client;
pub mod error;
pub mod types;

pub use client::{LlmClient, ReportWriter, build_prompt};
pub use error::LlmError;
pub use types::{Message, MessagesRequest, MessagesResponse};
