//! Authentication configuration supplied by the caller
//!
//! One configuration shape covers every provider: an identity claim (an
//! OpenID URL or a plain user name), a password, and where to log in.
//! `authentication_url = "ESGF"` derives the login URL from the destination
//! and the identity; any other value is used as the login URL verbatim.

use std::env;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{auth, env as env_constants};

/// Where the login handshake starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuthEndpoint {
    /// Derive the relying-party URL from the destination and the OpenID
    Esgf,
    /// Start at this URL
    Url(String),
}

impl From<String> for AuthEndpoint {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case(auth::ESGF_KEYWORD) {
            AuthEndpoint::Esgf
        } else {
            AuthEndpoint::Url(value)
        }
    }
}

impl From<AuthEndpoint> for String {
    fn from(endpoint: AuthEndpoint) -> Self {
        match endpoint {
            AuthEndpoint::Esgf => auth::ESGF_KEYWORD.to_string(),
            AuthEndpoint::Url(url) => url,
        }
    }
}

/// Credentials and provider details for one logical connection
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// OpenID URL or user name; empty means anonymous access
    pub identity: Option<String>,
    /// Password submitted to the provider's login form
    pub password: Option<String>,
    /// Login entry point; `None` disables the handshake
    pub authentication_url: Option<AuthEndpoint>,
    /// Cookie that must be present after login
    pub expected_cookie: Option<String>,
    /// Skip the handshake and rely on the client certificate
    pub use_certificates: bool,
    /// Client certificate and key (PEM) presented on every request
    pub certificate: Option<PathBuf>,
    /// Name of the user-name input in the provider's login form
    pub username_field: String,
    /// Name of the password input in the provider's login form
    pub password_field: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            identity: None,
            password: None,
            authentication_url: None,
            expected_cookie: None,
            use_certificates: false,
            certificate: None,
            username_field: auth::USERNAME_FIELD.to_string(),
            password_field: auth::PASSWORD_FIELD.to_string(),
        }
    }
}

// Keeps the password out of logs.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("identity", &self.identity)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("authentication_url", &self.authentication_url)
            .field("expected_cookie", &self.expected_cookie)
            .field("use_certificates", &self.use_certificates)
            .field("certificate", &self.certificate)
            .field("username_field", &self.username_field)
            .field("password_field", &self.password_field)
            .finish()
    }
}

impl AuthConfig {
    /// Anonymous access: no handshake at all
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// ESGF OpenID login with the derived relying-party URL
    pub fn esgf(openid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            identity: Some(openid.into()),
            password: Some(password.into()),
            authentication_url: Some(AuthEndpoint::Esgf),
            ..Self::default()
        }
    }

    /// Login at an explicit URL
    pub fn with_url(
        identity: impl Into<String>,
        password: impl Into<String>,
        authentication_url: impl Into<String>,
    ) -> Self {
        Self {
            identity: Some(identity.into()),
            password: Some(password.into()),
            authentication_url: Some(AuthEndpoint::Url(authentication_url.into())),
            ..Self::default()
        }
    }

    /// Present a client certificate instead of logging in
    pub fn with_certificate(certificate: impl Into<PathBuf>) -> Self {
        Self {
            use_certificates: true,
            certificate: Some(certificate.into()),
            ..Self::default()
        }
    }

    /// Require `cookie` after login
    pub fn expecting_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.expected_cookie = Some(cookie.into());
        self
    }

    /// Fill identity and password from the environment where unset
    pub fn with_env_credentials(mut self) -> Self {
        if self.identity.is_none() {
            self.identity = env::var(env_constants::IDENTITY).ok();
        }
        if self.password.is_none() {
            self.password = env::var(env_constants::PASSWORD).ok();
        }
        self
    }

    /// Identity, treating an empty string as absent
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref().filter(|identity| !identity.is_empty())
    }

    /// Cookie proving a successful login, if one is known
    pub fn session_cookie(&self) -> Option<&str> {
        match (&self.expected_cookie, &self.authentication_url) {
            (Some(cookie), _) => Some(cookie),
            (None, Some(AuthEndpoint::Esgf)) => Some(auth::ESGF_SESSION_COOKIE),
            (None, _) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keyword_parsing() {
        assert_eq!(AuthEndpoint::from("ESGF".to_string()), AuthEndpoint::Esgf);
        assert_eq!(AuthEndpoint::from("esgf".to_string()), AuthEndpoint::Esgf);
        assert_eq!(
            AuthEndpoint::from("https://urs.earthdata.nasa.gov/".to_string()),
            AuthEndpoint::Url("https://urs.earthdata.nasa.gov/".to_string())
        );
    }

    #[test]
    fn test_session_cookie_defaults() {
        let esgf = AuthConfig::esgf("https://ceda.ac.uk/openid/jdoe", "secret");
        assert_eq!(esgf.session_cookie(), Some(auth::ESGF_SESSION_COOKIE));

        let urs = AuthConfig::with_url("jdoe", "secret", "https://urs.earthdata.nasa.gov/")
            .expecting_cookie("nasa_gesdisc_data_archive");
        assert_eq!(urs.session_cookie(), Some("nasa_gesdisc_data_archive"));

        let plain = AuthConfig::with_url("jdoe", "secret", "https://idp.example.org/login");
        assert_eq!(plain.session_cookie(), None);
    }

    #[test]
    fn test_empty_identity_is_absent() {
        let config = AuthConfig {
            identity: Some(String::new()),
            ..AuthConfig::default()
        };
        assert_eq!(config.identity(), None);
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = AuthConfig::esgf("https://ceda.ac.uk/openid/jdoe", "hunter2");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_toml_round_trip() {
        let config: AuthConfig = toml::from_str(
            r#"
            identity = "https://ceda.ac.uk/openid/jdoe"
            authentication_url = "ESGF"
            "#,
        )
        .unwrap();
        assert_eq!(config.authentication_url, Some(AuthEndpoint::Esgf));
        assert_eq!(config.password_field, "password");
        assert!(!config.use_certificates);
    }
}
