use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use console::Style;
use tokio_util::sync::CancellationToken;

use docbrief::analysis::LiveService;
use docbrief::cli::{self, Cli, Command};
use docbrief::config::Config;
use docbrief::error::AppError;
use docbrief::provider::DocumentPayload;
use docbrief::ui::AnalysisProgress;
use docbrief::{logging, server};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", Style::new().red().bold().apply_to("error:"));
            let code = err.downcast_ref::<AppError>().map_or(1, AppError::exit_code);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = Config::load(cli.config.as_deref()).map_err(AppError::from)?;

    // Keep the spinner readable unless debug output was asked for.
    let filter_override = match (&cli.command, cli.verbose) {
        (_, true) => Some("debug"),
        (Command::Analyze { .. }, false) => Some("warn"),
        _ => None,
    };
    logging::init_tracing(&config.logging, filter_override);

    match cli.command {
        Command::Analyze {
            file,
            content_type,
            no_report,
            json,
        } => {
            config.validate().map_err(AppError::from)?;
            analyze_file(&config, &file, content_type, !no_report, json).await
        }
        Command::Serve { bind } => {
            config.validate().map_err(AppError::from)?;
            server::serve(&config, bind).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Config => {
            println!("{}", toml::to_string_pretty(&config.redacted())?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn analyze_file(
    config: &Config,
    file: &Path,
    content_type: Option<String>,
    with_report: bool,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let bytes = tokio::fs::read(file).await.map_err(AppError::from)?;
    let content_type = content_type.unwrap_or_else(|| cli::content_type_for(file).to_string());
    let payload = DocumentPayload::new(bytes, content_type).map_err(AppError::from)?;
    let service = LiveService::from_config(config, with_report)?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let progress = AnalysisProgress::start(&file.display().to_string());
    let result = service.run_analysis_with(&payload, &cancel, &progress).await;
    progress.finish(&result);

    match result {
        Ok(analysis) => {
            progress.print_analysis(&analysis, json).map_err(AppError::from)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            progress.print_error(&err, json).map_err(AppError::from)?;
            Ok(ExitCode::from(AppError::from(err).exit_code()))
        }
    }
}
