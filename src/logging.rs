use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// Installs the global tracing subscriber. Logs go to stderr so stdout stays
/// clean for command output.
///
/// `RUST_LOG` wins over everything; otherwise `filter_override` (from CLI
/// flags) wins over the configured filter.
pub fn init_tracing(config: &LoggingConfig, filter_override: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_override.unwrap_or(&config.filter)));

    if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .init();
    }

    tracing::debug!(json = config.json, "tracing initialized");
}
