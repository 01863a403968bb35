//! Terminal output for `docbrief analyze`: a spinner while the provider works
//! and coloured results afterwards.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::analysis::{Analysis, AnalysisError};
use crate::operation::{PollAttempt, PollObserver};
use crate::provider::{OperationStatus, QueryError};

/// Spinner that follows one analysis. Doubles as the poll observer.
pub struct AnalysisProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl AnalysisProgress {
    pub fn start(name: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} {elapsed:.dim}")
                .expect("invalid template"),
        );
        pb.set_message(format!("Submitting {name}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    pub fn finish(&self, result: &Result<Analysis, AnalysisError>) {
        self.pb.finish_and_clear();
        match result {
            Ok(analysis) => eprintln!(
                "  {} Analyzed {} page(s)",
                self.green.apply_to("✓"),
                analysis.page_count
            ),
            Err(err) => eprintln!("  {} {err}", self.red.apply_to("✗")),
        }
    }

    /// Prints the result to stdout, as JSON or as plain text sections.
    pub fn print_analysis(&self, analysis: &Analysis, json: bool) -> serde_json::Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(analysis)?);
            return Ok(());
        }

        println!("{}", self.green.apply_to("─── Extracted Text ───"));
        println!("{}", analysis.text);
        if let Some(report) = &analysis.report {
            println!();
            println!("{}", self.green.apply_to("─── Report ───"));
            println!("{report}");
        }
        Ok(())
    }

    pub fn print_error(&self, err: &AnalysisError, json: bool) -> serde_json::Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(&err.to_body())?);
        } else if let AnalysisError::ProviderFailure(detail) = err {
            eprintln!("{}", self.dim.apply_to(detail.raw()));
        }
        Ok(())
    }
}

impl PollObserver for AnalysisProgress {
    fn on_attempt(&self, attempt: &PollAttempt, max_attempts: u32) {
        self.pb.set_message(format!(
            "Waiting for provider · query {}/{max_attempts}",
            attempt.index
        ));
    }

    fn on_status(&self, attempt: &PollAttempt, status: &OperationStatus) {
        if let OperationStatus::Other(raw) = status {
            self.pb.set_message(format!("Provider status '{raw}' · query {}", attempt.index));
        }
    }

    fn on_query_error(&self, attempt: &PollAttempt, error: &QueryError) {
        self.pb.println(format!(
            "  {} Query {} failed: {error}",
            self.yellow.apply_to("↻"),
            attempt.index
        ));
    }
}
