//! docbrief: submit a document to an asynchronous analysis provider, poll the
//! long-running operation to completion, and optionally write an LLM report
//! about the extracted text.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod logging;
pub mod operation;
pub mod provider;
pub mod server;
pub mod ui;

#[cfg(test)]
mod test_support;
