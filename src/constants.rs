//! Application constants for OPeNDAP Fetcher
//!
//! This module centralizes all constants used throughout the library,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Environment variable names for caller-supplied credentials
pub mod env {
    /// Environment variable name for the identity claim (OpenID URL or user name)
    pub const IDENTITY: &str = "OPENDAP_IDENTITY";

    /// Environment variable name for the password
    pub const PASSWORD: &str = "OPENDAP_PASSWORD";
}

/// Authentication and identity-provider constants
pub mod auth {
    /// Keyword selecting the derived ESGF authentication URL
    pub const ESGF_KEYWORD: &str = "ESGF";

    /// Login path appended to the data node for ESGF OpenID relying parties
    pub const ESGF_LOGIN_PATH: &str = "/esg-orp/j_spring_openid_security_check.htm";

    /// Query parameter carrying the URL-encoded OpenID
    pub const OPENID_PARAMETER: &str = "openid_identifier";

    /// Provider node that only hands out its session cookie after a second redirect
    pub const TWO_STAGE_PROVIDER_NODE: &str = "https://ceda.ac.uk";

    /// Session cookie set by ESGF data nodes after a successful OpenID login
    pub const ESGF_SESSION_COOKIE: &str = "esg.openid.saml.cookie";

    /// Default name of the user-name input in provider login forms
    pub const USERNAME_FIELD: &str = "username";

    /// Default name of the password input in provider login forms
    pub const PASSWORD_FIELD: &str = "password";

    /// CSS selector for login forms
    pub const FORM_SELECTOR: &str = "form";

    /// CSS selector for form inputs
    pub const INPUT_SELECTOR: &str = "input";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = "OPeNDAP-Fetcher/0.1.0 (Climate Research Tool)";

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 4;

    /// Maximum number of redirects to follow (CAS flows bounce several times)
    pub const MAX_REDIRECTS: usize = 10;
}

/// Rate limiting configuration
pub mod limits {
    /// Default rate limit for remote requests (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 10;
}

/// DAP2 wire-format constants
pub mod dap {
    /// Suffix requesting the binary data response
    pub const DODS_SUFFIX: &str = ".dods";

    /// Suffix requesting the structure descriptor
    pub const DDS_SUFFIX: &str = ".dds";

    /// Separator between the descriptor and the XDR payload
    pub const DATA_SEPARATOR: &[u8] = b"\nData:\n";

    /// Marker preceding each sequence row
    pub const START_OF_INSTANCE: u32 = 0x5A00_0000;

    /// Marker terminating a sequence
    pub const END_OF_SEQUENCE: u32 = 0xA500_0000;

    /// Stop used in hyperslabs of dimensions whose length is unknown
    pub const UNBOUNDED_STOP: u64 = i64::MAX as u64;
}

/// Response cache constants
pub mod cache {
    /// Extension appended to the cache name for the SQLite backend
    pub const SQLITE_EXTENSION: &str = "sqlite";

    /// Backend used when none is configured
    pub const DEFAULT_BACKEND: &str = "sqlite";

    /// Table holding cached responses
    pub const TABLE_NAME: &str = "responses";
}

/// File operation constants
pub mod files {
    /// Temporary file suffix for atomic operations
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Prefix of the summary returned by bulk downloads
    pub const DOWNLOAD_SUMMARY_PREFIX: &str = "Downloading:";
}

/// Logging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "info";
}

/// Configuration file locations
pub mod config {
    /// Directory under the user config dir
    pub const APP_DIR: &str = "opendap-fetcher";

    /// Configuration file name
    pub const FILE_NAME: &str = "config.toml";
}

// Re-export commonly used constants for convenience
pub use auth::{ESGF_KEYWORD, ESGF_SESSION_COOKIE};
pub use env::{IDENTITY as ENV_IDENTITY, PASSWORD as ENV_PASSWORD};
pub use files::{DOWNLOAD_SUMMARY_PREFIX, TEMP_FILE_SUFFIX};
pub use http::{DEFAULT_TIMEOUT as HTTP_TIMEOUT, USER_AGENT};
pub use limits::DEFAULT_RATE_LIMIT_RPS;
