//! Command-line interface built on clap.
//!
//! [`Cli`] carries the global flags (`--config`, `--verbose`) and one of the
//! [`Command`] subcommands: analyze, serve, config.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

/// docbrief: extract text from documents and write a report about them.
#[derive(Debug, Parser)]
#[command(name = "docbrief", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the TOML config file (defaults to ./docbrief.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enables verbose (debug) logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Analyzes a single document file and prints the result.
    Analyze {
        /// Document to analyze (PDF or image).
        file: PathBuf,

        /// MIME type to send; inferred from the file extension when omitted.
        #[arg(long)]
        content_type: Option<String>,

        /// Skips the LLM report even when a key is configured.
        #[arg(long)]
        no_report: bool,

        /// Prints the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Runs the HTTP server.
    Serve {
        /// Address to bind, overriding `server.bind`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Prints the effective configuration with credentials redacted.
    Config,
}

/// Guesses a MIME type from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "tif" | "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        "heif" | "heic" => "image/heif",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "html" | "htm" => "text/html",
        _ => "application/octet-stream",
    }
}
