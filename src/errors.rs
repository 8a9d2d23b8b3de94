//! Error types for OPeNDAP Fetcher
//!
//! This module defines the error types for all components of the library.
//! Messages that callers match on (server status lines, empty-resource and
//! missing-variable reports) are rendered verbatim, without extra prefixes.

use std::path::PathBuf;

use thiserror::Error;

/// Authentication-related errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Login round-trip finished but the expected session cookie is absent
    #[error("Authentication failed: cookie '{cookie}' was not set for {url}")]
    AuthenticationFailure { cookie: String, url: String },

    /// A login form was found but no password was configured
    #[error("A password is required to log in at {url}")]
    MissingPassword { url: String },

    /// Certificate authentication requested without a certificate to present
    #[error("Certificate authentication for {url} needs a client certificate")]
    MissingCertificate { url: String },

    /// Destination or authentication URL could not be parsed
    #[error("Invalid URL: {url} - {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Non-transient HTTP error reported by the remote resource
///
/// Displays as the bare status line, e.g. `401 Unauthorized`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{status_line}")]
pub struct ServerError {
    pub status_line: String,
}

impl ServerError {
    /// Build from an HTTP status code
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        let status_line = match status.canonical_reason() {
            Some(reason) => format!("{} {}", status.as_u16(), reason),
            None => status.as_u16().to_string(),
        };
        Self { status_line }
    }
}

/// Session and response-cache errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// Requested cache backend is not implemented
    #[error("Cache backend '{backend}' is not supported")]
    UnsupportedBackend { backend: String },

    /// Cache store failed after it was opened
    #[error("Response cache error: {0}")]
    Cache(#[from] sqlx::Error),

    /// HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Client certificate could not be read
    #[error("Failed to read client certificate {path}: {source}")]
    Certificate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rate limit configuration invalid
    #[error("Rate limit must be non-zero")]
    InvalidRateLimit,
}

/// Bulk download errors
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Remote resource declared a zero content length
    #[error("{url} is empty. It will not be considered")]
    RemoteEmpty { url: String },

    /// Bulk downloads must not be stored in a response cache
    #[error("Caching a bulk download through a caching session is not supported: {url}")]
    CachingUnsupported { url: String },

    /// I/O error during file operations
    #[error("File I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Atomic file operation failed
    #[error("Atomic file operation failed: could not rename {temp_path} to {final_path}")]
    AtomicOperationFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
    },
}

/// DAP protocol, decoding and proxy errors
#[derive(Error, Debug)]
pub enum DapError {
    /// Requested variable absent from the structural tree
    #[error("{name} not found in {path}")]
    MissingVariable { name: String, path: String },

    /// Structure descriptor could not be parsed
    #[error("Invalid DDS at token {position}: {reason}")]
    Parse { position: usize, reason: String },

    /// Binary payload could not be decoded
    #[error("Invalid XDR payload: {reason}")]
    Decode { reason: String },

    /// Server answered with a DAP error document
    #[error("{message}")]
    Remote { message: String },

    /// Index outside what the variable can address
    #[error("Invalid slice: {reason}")]
    InvalidSlice { reason: String },

    /// Constraint expressions only combine with AND
    #[error("OR constraints not allowed in the Opendap specification.")]
    OrConstraint,

    /// Request URL could not be assembled
    #[error("Invalid request URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Comparison literal does not match the variable's type
    #[error("Cannot compare {dtype} data with {literal}")]
    IncomparableLiteral { dtype: String, literal: String },

    /// Located value is not of the kind the proxy serves
    #[error("Variable {id} is not {expected}")]
    UnexpectedKind { id: String, expected: &'static str },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Configuration file could not be read
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration format
    #[error("Invalid configuration format: {0}")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration value rejected
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// Logging subscriber could not be installed
    #[error("Failed to initialise logging: {reason}")]
    Logging { reason: String },
}

/// Top-level error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Authentication error
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Non-transient HTTP status from the remote resource
    #[error(transparent)]
    Server(#[from] ServerError),

    /// Network or secure-channel failure, surfaced unmodified
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// Session or cache error
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Download error
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Protocol or proxy error
    #[error(transparent)]
    Dap(#[from] DapError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AppError {
    /// Check if the error may clear on a fresh authenticate-then-request attempt
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AppError::Server(_))
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "authentication",
            AppError::Server(_) => "server",
            AppError::Transport(_) => "transport",
            AppError::Session(_) => "session",
            AppError::Download(_) => "download",
            AppError::Dap(_) => "dap",
            AppError::Config(_) => "config",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        AppError::Session(SessionError::Cache(error))
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Authentication result type alias
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Session result type alias
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// DAP result type alias
pub type DapResult<T> = std::result::Result<T, DapError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_is_bare_status_line() {
        let error = ServerError::from_status(reqwest::StatusCode::BAD_REQUEST);
        assert_eq!(error.to_string(), "400 Bad Request");

        let app_error = AppError::from(error);
        assert_eq!(app_error.to_string(), "400 Bad Request");
        assert!(app_error.is_recoverable());
        assert_eq!(app_error.category(), "server");
    }

    #[test]
    fn test_remote_empty_message() {
        let error = DownloadError::RemoteEmpty {
            url: "http://example.com/test.txt".to_string(),
        };
        assert!(error
            .to_string()
            .ends_with("test.txt is empty. It will not be considered"));
    }

    #[test]
    fn test_missing_variable_message() {
        let error = AppError::from(DapError::MissingVariable {
            name: "missing".to_string(),
            path: "/".to_string(),
        });
        assert_eq!(error.to_string(), "missing not found in /");
        assert!(!error.is_recoverable());
        assert_eq!(error.category(), "dap");
    }

    #[test]
    fn test_unsupported_backend_category() {
        let error = AppError::from(SessionError::UnsupportedBackend {
            backend: "mongodb".to_string(),
        });
        assert_eq!(error.category(), "session");
        assert!(error.to_string().contains("mongodb"));
    }
}
