//! Tracing subscriber setup
//!
//! The library only emits `tracing` events; applications that want them on
//! stderr call [`init_logging`] once at start-up. `RUST_LOG` takes
//! precedence over the configured level.

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, EnvFilter};

use crate::constants::logging::DEFAULT_LOG_LEVEL;
use crate::errors::{ConfigError, ConfigResult};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level for this crate when `RUST_LOG` is unset
    pub level: String,
    /// Print event targets alongside messages
    pub show_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            show_target: false,
        }
    }
}

impl LoggingConfig {
    fn filter(&self) -> ConfigResult<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        let directive = format!("opendap_fetcher={}", self.level)
            .parse::<Directive>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                value: self.level.clone(),
                reason: format!("{e}"),
            })?;
        Ok(EnvFilter::new("warn").add_directive(directive))
    }
}

/// Install a formatted subscriber for `config`
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` for an unparsable level and
/// `ConfigError::Logging` if a global subscriber is already installed
pub fn init_logging(config: &LoggingConfig) -> ConfigResult<()> {
    let filter = config.filter()?;
    fmt()
        .with_env_filter(filter)
        .with_target(config.show_target)
        .try_init()
        .map_err(|e| ConfigError::Logging {
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(!config.show_target);
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = LoggingConfig {
            level: "verbose".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.filter(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_second_init_reports_error() {
        let config = LoggingConfig::default();
        let _ = init_logging(&config);
        assert!(matches!(
            init_logging(&config),
            Err(ConfigError::Logging { .. })
        ));
    }
}
