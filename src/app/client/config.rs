//! HTTP client configuration and building logic
//!
//! One `reqwest::Client` serves a whole session. It shares the session's
//! cookie jar so that login cookies reach every later request, and presents
//! the configured client certificate when one is set.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::{redirect, Client, Identity};
use serde::{Deserialize, Serialize};

use crate::constants::{http, limits};
use crate::errors::{SessionError, SessionResult};

/// Configuration for the session's HTTP client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// TCP keep-alive interval
    #[serde(with = "humantime_serde")]
    pub tcp_keepalive: Option<Duration>,
    /// TCP nodelay (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
    /// Connection pool idle timeout
    #[serde(with = "humantime_serde")]
    pub pool_idle_timeout: Option<Duration>,
    /// Maximum number of idle connections per host
    pub pool_max_per_host: usize,
    /// Whole-request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Connection establishment timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
    /// Redirects followed before giving up; login flows bounce several times
    pub max_redirects: usize,
    pub user_agent: String,
    /// PEM file holding the client certificate and its private key
    pub client_certificate: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tcp_keepalive: Some(Duration::from_secs(30)),
            tcp_nodelay: true,
            pool_idle_timeout: Some(http::POOL_IDLE_TIMEOUT),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
            max_redirects: http::MAX_REDIRECTS,
            user_agent: http::USER_AGENT.to_string(),
            client_certificate: None,
        }
    }
}

impl ClientConfig {
    /// Builds the HTTP client around `jar`
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the certificate cannot be read or the
    /// client cannot be constructed
    pub fn build_http_client(&self, jar: Arc<Jar>) -> SessionResult<Client> {
        let mut client_builder = Client::builder()
            .cookie_provider(jar)
            .redirect(redirect::Policy::limited(self.max_redirects))
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent.as_str())
            .tcp_nodelay(self.tcp_nodelay)
            .pool_max_idle_per_host(self.pool_max_per_host);

        if let Some(keepalive) = self.tcp_keepalive {
            client_builder = client_builder.tcp_keepalive(keepalive);
        }

        if let Some(idle_timeout) = self.pool_idle_timeout {
            client_builder = client_builder.pool_idle_timeout(idle_timeout);
        }

        if let Some(path) = &self.client_certificate {
            let pem = std::fs::read(path).map_err(|source| SessionError::Certificate {
                path: path.clone(),
                source,
            })?;
            let identity = Identity::from_pem(&pem).map_err(SessionError::Client)?;
            client_builder = client_builder.use_rustls_tls().identity(identity);
            tracing::debug!("Presenting client certificate {}", path.display());
        }

        client_builder.build().map_err(SessionError::Client)
    }
}
