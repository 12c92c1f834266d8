//! Logging setup
//!
//! Installs a global `tracing` subscriber: an `EnvFilter` (from `RUST_LOG`,
//! falling back to the configured filter), a text or JSON layer on stderr and
//! an optional daily-rotated log file.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::{AgentError, AgentResult};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "agents_manager=info";

/// Logging options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directives used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines on stderr instead of text
    pub json: bool,
    /// Directory for a daily-rotated log file
    pub file_dir: Option<PathBuf>,
    pub file_prefix: String,
}

impl LogConfig {
    pub fn new() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            json: false,
            file_dir: None,
            file_prefix: "agents-manager.log".to_string(),
        }
    }

    /// Read `AGENTS_LOG_JSON` and `AGENTS_LOG_DIR`
    pub fn from_env() -> Self {
        let mut config = Self::new();
        config.json = std::env::var("AGENTS_LOG_JSON")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        config.file_dir = std::env::var("AGENTS_LOG_DIR").ok().map(PathBuf::from);
        config
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn with_file(mut self, dir: impl Into<PathBuf>) -> Self {
        self.file_dir = Some(dir.into());
        self
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Install the global subscriber
///
/// Keep the returned guard alive for as long as the file layer should flush.
pub fn init_logging(config: LogConfig) -> AgentResult<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let json_layer = config
        .json
        .then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!config.json).then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));

    let (file_layer, guard) = match &config.file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| AgentError::configuration(format!("failed to install logger: {}", e)))?;

    tracing::debug!("Logging initialized");
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.filter, "agents_manager=info");
        assert!(!config.json);
        assert!(config.file_dir.is_none());
    }

    #[test]
    fn test_second_init_is_rejected() {
        let first = init_logging(LogConfig::new().with_filter("warn"));
        assert!(first.is_ok());
        let err = init_logging(LogConfig::new()).unwrap_err();
        assert!(err.is_configuration());
    }
}
