//! Configuration loaded once at startup from `docbrief.toml`.
//!
//! Every field has a default, so a partial file (or no file) works. Endpoint
//! and credential environment variables take precedence over the file. The
//! resulting [`Config`] is immutable and handed to constructors by reference.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "docbrief.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration, one section per concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Document-analysis provider and polling.
    pub analyzer: AnalyzerConfig,
    /// Optional LLM report step.
    pub llm: LlmConfig,
    /// HTTP server used by `docbrief serve`.
    pub server: ServerConfig,
    /// Tracing output.
    pub logging: LoggingConfig,
}

/// Document-analysis provider and polling parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Base URL of the provider resource, without a trailing path.
    pub endpoint: String,
    /// Subscription key sent as `Ocp-Apim-Subscription-Key`.
    pub api_key: String,
    /// Analysis model, e.g. `prebuilt-read`.
    pub model_id: String,
    /// Value of the `api-version` query parameter.
    pub api_version: String,
    /// Fixed wait before every status query.
    pub poll_interval_ms: u64,
    /// Hard cap on status queries per operation.
    pub max_poll_attempts: u32,
    /// Consecutive transient status-query failures tolerated.
    pub max_transport_retries: u32,
    /// Longest wait a `Retry-After` header can impose between queries.
    pub max_throttle_delay_ms: u64,
    /// Timeout for each individual HTTP request to the provider.
    pub request_timeout_secs: u64,
    /// Upper bound on operations in flight against the provider.
    pub max_concurrent_operations: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            model_id: "prebuilt-read".to_string(),
            api_version: "2024-11-30".to_string(),
            poll_interval_ms: 1500,
            max_poll_attempts: 120,
            max_transport_retries: 3,
            max_throttle_delay_ms: 30_000,
            request_timeout_secs: 30,
            max_concurrent_operations: 8,
        }
    }
}

/// The one-shot report call. Disabled while `api_key` is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Messages API URL.
    pub endpoint: String,
    /// Sent as `x-api-key`.
    pub api_key: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Upper bound on report length, in tokens.
    pub max_tokens: u32,
    /// Extracted text beyond this many characters is cut before prompting.
    pub max_input_chars: usize,
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            api_key: String::new(),
            model: "claude-sonnet-4-5-20250929".to_string(),
            max_tokens: 2048,
            max_input_chars: 100_000,
            request_timeout_secs: 120,
        }
    }
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind: String,
    /// Request bodies above this size are answered with 413.
    pub max_upload_bytes: usize,
    /// Per-request deadline; when it passes the analysis is cancelled.
    pub request_deadline_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            max_upload_bytes: 20 * 1024 * 1024,
            request_deadline_secs: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of plain text.
    pub json: bool,
    /// `EnvFilter` directives, used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            filter: "info,docbrief=debug".to_string(),
        }
    }
}

impl Config {
    /// Loads `path`, or `docbrief.toml` in the working directory when no path
    /// is given. A missing default file yields defaults; a missing explicit
    /// file is an error. Environment overrides are applied afterwards.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Overrides endpoints and credentials from the environment. Empty values
    /// are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = var("DOCBRIEF_ANALYZER_ENDPOINT") {
            self.analyzer.endpoint = v;
        }
        if let Some(v) = var("DOCBRIEF_ANALYZER_KEY") {
            self.analyzer.api_key = v;
        }
        if let Some(v) = var("DOCBRIEF_LLM_ENDPOINT") {
            self.llm.endpoint = v;
        }
        if let Some(v) = var("ANTHROPIC_API_KEY") {
            self.llm.api_key = v;
        }
        if let Some(v) = var("LOG_FORMAT") {
            self.logging.json = v.eq_ignore_ascii_case("json");
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let analyzer = &self.analyzer;
        if analyzer.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "analyzer.endpoint is not set (or DOCBRIEF_ANALYZER_ENDPOINT)".into(),
            ));
        }
        if analyzer.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "analyzer.api_key is not set (or DOCBRIEF_ANALYZER_KEY)".into(),
            ));
        }
        if analyzer.max_poll_attempts == 0 {
            return Err(ConfigError::Invalid("analyzer.max_poll_attempts must be at least 1".into()));
        }
        if analyzer.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("analyzer.poll_interval_ms must be positive".into()));
        }
        if analyzer.max_concurrent_operations == 0 {
            return Err(ConfigError::Invalid(
                "analyzer.max_concurrent_operations must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// A copy safe to print: credentials replaced by a marker.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for key in [&mut copy.analyzer.api_key, &mut copy.llm.api_key] {
            if !key.is_empty() {
                *key = "<redacted>".to_string();
            }
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn valid() -> Config {
        let mut config = Config::default();
        config.analyzer.endpoint = "https://example.cognitiveservices.azure.com".into();
        config.analyzer.api_key = "key".into();
        config
    }

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.analyzer.poll_interval_ms, 1500);
        assert_eq!(config.analyzer.max_poll_attempts, 120);
        assert_eq!(config.analyzer.max_transport_retries, 3);
        assert_eq!(config.analyzer.max_throttle_delay_ms, 30_000);
        assert_eq!(config.analyzer.model_id, "prebuilt-read");
        assert_eq!(config.server.max_upload_bytes, 20 * 1024 * 1024);
        assert!(!config.llm.is_enabled());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            [analyzer]
            endpoint = "https://di.example.com"
            max_poll_attempts = 10

            [server]
            bind = "0.0.0.0:8080"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.analyzer.endpoint, "https://di.example.com");
        assert_eq!(config.analyzer.max_poll_attempts, 10);
        assert_eq!(config.analyzer.poll_interval_ms, 1500);
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.server.request_deadline_secs, 200);
        assert_eq!(config.llm.max_tokens, 2048);
    }

    #[test]
    fn load_reads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[analyzer]\napi_key = \"from-file\"\npoll_interval_ms = 10").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.analyzer.api_key, "from-file");
        assert_eq!(config.analyzer.poll_interval_ms, 10);
    }

    #[test]
    fn load_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn env_overrides_file_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("DOCBRIEF_ANALYZER_ENDPOINT", "https://env.example.com"),
            ("DOCBRIEF_ANALYZER_KEY", "env-key"),
            ("ANTHROPIC_API_KEY", ""),
            ("LOG_FORMAT", "JSON"),
        ]);
        let mut config = valid();
        config.llm.api_key = "file-llm-key".into();

        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.analyzer.endpoint, "https://env.example.com");
        assert_eq!(config.analyzer.api_key, "env-key");
        assert_eq!(config.llm.api_key, "file-llm-key");
        assert!(config.logging.json);
    }

    #[test]
    fn validate_rejects_missing_credentials_and_zero_budgets() {
        assert!(valid().validate().is_ok());
        assert!(Config::default().validate().is_err());

        let mut config = valid();
        config.analyzer.api_key.clear();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.analyzer.max_poll_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.analyzer.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.analyzer.max_concurrent_operations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn redacted_hides_keys() {
        let mut config = valid();
        config.llm.api_key = "sk-test".into();
        let shown = toml::to_string(&config.redacted()).unwrap();
        assert!(!shown.contains("sk-test"));
        assert!(!shown.contains("\"key\""));
        assert!(shown.contains("<redacted>"));
    }
}
