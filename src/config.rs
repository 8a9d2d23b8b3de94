//! Configuration management for OPeNDAP Fetcher
//!
//! One TOML document carries every configuration object the library takes
//! at construction time. Missing tables and keys fall back to defaults, so
//! an empty file is a valid configuration.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::cache::CacheBackend;
use crate::app::client::{ClientConfig, SessionConfig};
use crate::auth::AuthConfig;
use crate::constants::config::{APP_DIR, FILE_NAME};
use crate::errors::{ConfigError, ConfigResult};
use crate::logging::LoggingConfig;

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP client settings
    pub client: ClientConfig,
    /// Response cache settings
    pub session: SessionConfig,
    /// Credentials and login endpoint
    pub auth: AuthConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration, preferring `config_file_override` over the
    /// default location
    ///
    /// Without an override and without a file at the default location the
    /// defaults are returned.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` when an explicit file does not exist,
    /// and read, parse or validation errors for an existing file
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let path = match config_file_override {
            Some(path) if !path.exists() => return Err(ConfigError::NotFound { path }),
            Some(path) => path,
            None => match Self::default_path() {
                Ok(path) if path.exists() => path,
                _ => {
                    debug!("No configuration file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        Self::load_from_file(&path).await
    }

    /// `<config dir>/opendap-fetcher/config.toml`
    pub fn default_path() -> ConfigResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::InvalidValue {
            field: "config_dir".to_string(),
            value: String::new(),
            reason: "Could not determine user config directory".to_string(),
        })?;
        Ok(config_dir.join(APP_DIR).join(FILE_NAME))
    }

    /// Load and validate a TOML file
    pub async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Reject values that would only fail later, at session creation
    pub fn validate(&self) -> ConfigResult<()> {
        if self.client.rate_limit_rps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "client.rate_limit_rps".to_string(),
                value: "0".to_string(),
                reason: "Rate limit must be at least one request per second".to_string(),
            });
        }

        if CacheBackend::from_str(&self.session.backend).is_err() {
            return Err(ConfigError::InvalidValue {
                field: "session.backend".to_string(),
                value: self.session.backend.clone(),
                reason: "Supported backends are sqlite and memory".to_string(),
            });
        }

        if self.auth.use_certificates
            && self.auth.certificate.is_none()
            && self.client.client_certificate.is_none()
        {
            return Err(ConfigError::InvalidValue {
                field: "auth.certificate".to_string(),
                value: String::new(),
                reason: "use_certificates needs a certificate path".to_string(),
            });
        }

        Ok(())
    }

    /// Commented default configuration, suitable for a first-run file
    pub fn default_content() -> String {
        let default_cache = dirs::cache_dir()
            .map(|dir| dir.join(APP_DIR).join("responses"))
            .unwrap_or_else(|| PathBuf::from("./responses"));

        format!(
            r#"# OPeNDAP Fetcher Configuration

[client]
request_timeout = "2m"
connect_timeout = "30s"
rate_limit_rps = 10
max_redirects = 10
# client_certificate = "/path/to/credentials.pem"

[session]
# Responses are cached in <cache>.sqlite when set
# cache = "{}"
backend = "sqlite"
# expire_after = "1h"

[auth]
# identity = "https://esgf-node.example.org/esgf-idp/openid/user"
# authentication_url = "ESGF"
# expected_cookie = "esg.openid.saml.cookie"
use_certificates = false
username_field = "username"
password_field = "password"

[logging]
level = "info"
show_target = false
"#,
            default_cache.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthEndpoint;
    use crate::constants::limits;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_creation() {
        let config = AppConfig::default();

        assert_eq!(config.client.rate_limit_rps, limits::DEFAULT_RATE_LIMIT_RPS);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.session.backend, "sqlite");
        assert!(config.session.cache.is_none());
        assert!(config.auth.identity.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_content_parses() {
        let content = AppConfig::default_content();
        let parsed: AppConfig = toml::from_str(&content).unwrap();

        assert_eq!(parsed.client.request_timeout, Duration::from_secs(120));
        assert!(parsed.validate().is_ok());
        assert!(content.contains("[session]"));
        assert!(content.contains("[auth]"));
    }

    #[tokio::test]
    async fn test_config_loading_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let result = AppConfig::load(Some(config_path)).await;
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_config_loading_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.toml");

        let test_config = r#"
[client]
request_timeout = "45s"

[session]
cache = "/tmp/opendap/responses"
backend = "memory"
expire_after = "1h"

[auth]
identity = "https://esgf-node.example.org/esgf-idp/openid/alice"
authentication_url = "esgf"

[logging]
level = "debug"
"#;
        tokio::fs::write(&config_path, test_config).await.unwrap();

        let config = AppConfig::load(Some(config_path)).await.unwrap();

        assert_eq!(config.client.request_timeout, Duration::from_secs(45));
        assert_eq!(
            config.session.cache,
            Some(PathBuf::from("/tmp/opendap/responses"))
        );
        assert_eq!(config.session.expire_after, Some(Duration::from_secs(3600)));
        assert_eq!(config.auth.authentication_url, Some(AuthEndpoint::Esgf));
        assert_eq!(config.logging.level, "debug");

        // Unspecified values keep their defaults
        assert_eq!(config.client.rate_limit_rps, limits::DEFAULT_RATE_LIMIT_RPS);
    }

    #[tokio::test]
    async fn test_invalid_backend_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("bad.toml");
        tokio::fs::write(&config_path, "[session]\nbackend = \"mongodb\"\n")
            .await
            .unwrap();

        let error = AppConfig::load(Some(config_path)).await.unwrap_err();
        assert!(matches!(
            error,
            ConfigError::InvalidValue { ref field, .. } if field == "session.backend"
        ));
    }

    #[tokio::test]
    async fn test_certificate_mode_without_certificate_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("certs.toml");
        tokio::fs::write(&config_path, "[auth]\nuse_certificates = true\n")
            .await
            .unwrap();

        let error = AppConfig::load(Some(config_path.clone())).await.unwrap_err();
        assert!(matches!(
            error,
            ConfigError::InvalidValue { ref field, .. } if field == "auth.certificate"
        ));

        // A client-level certificate is enough
        tokio::fs::write(
            &config_path,
            "[client]\nclient_certificate = \"/etc/opendap/credentials.pem\"\n\n[auth]\nuse_certificates = true\n",
        )
        .await
        .unwrap();
        assert!(AppConfig::load(Some(config_path)).await.is_ok());
    }

    #[tokio::test]
    async fn test_malformed_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        tokio::fs::write(&config_path, "[client\nrate_limit_rps = ")
            .await
            .unwrap();

        let error = AppConfig::load(Some(config_path)).await.unwrap_err();
        assert!(matches!(error, ConfigError::InvalidFormat(_)));
    }
}
