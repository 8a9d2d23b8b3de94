//! Authenticating HTTP client for OPeNDAP servers
//!
//! The module is organized into specialized components:
//! - `config`: HTTP client configuration and building
//! - `session`: cookie jar, rate limiting and the optional response cache
//! - `auth`: provider login handshake and cookie verification
//! - `http`: rate-limited request execution
//! - `download`: bulk file downloads with atomic writes
//! - `response`: fully read responses
//!
//! [`DapClient`] ties them together: it authenticates lazily, retries a
//! failed request exactly once after re-authenticating, and serves the
//! proxies through [`DapRequester`].

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use crate::app::proxy::DapRequester;
use crate::auth::{build_auth_url, AuthConfig, AuthEndpoint, AuthUrl};
use crate::errors::{AuthError, Result, ServerError};

pub mod auth;
pub mod config;
pub mod download;
pub mod http;
pub mod response;
pub mod session;

pub use auth::AuthHandler;
pub use config::ClientConfig;
pub use download::{DownloadHandler, DownloadOptions};
pub use response::{FetchedResponse, ResponseMetadata};
pub use session::{Session, SessionConfig};

/// Progress of a request through its single permitted retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryState {
    Attempting,
    RetriedOnce,
}

/// Authenticated access to one remote resource
#[derive(Debug)]
pub struct DapClient {
    session: Session,
    auth: AuthConfig,
    destination: Url,
    authenticated: AtomicBool,
}

impl DapClient {
    /// Create a client for `destination` without contacting the server
    ///
    /// Authentication happens on the first request.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidUrl` for an unparsable destination,
    /// `AuthError::MissingCertificate` when certificates are requested but
    /// none is configured, and `SessionError` if the session cannot be
    /// created
    pub async fn new(
        destination: &str,
        auth: AuthConfig,
        session_config: &SessionConfig,
        client_config: &ClientConfig,
    ) -> Result<Self> {
        let destination = Url::parse(destination).map_err(|e| AuthError::InvalidUrl {
            url: destination.to_string(),
            reason: e.to_string(),
        })?;

        let mut client_config = client_config.clone();
        if auth.use_certificates {
            if let Some(certificate) = &auth.certificate {
                client_config.client_certificate = Some(certificate.clone());
            }
            if client_config.client_certificate.is_none() {
                return Err(AuthError::MissingCertificate {
                    url: destination.to_string(),
                }
                .into());
            }
        }

        let session = Session::create(session_config, &client_config).await?;

        Ok(Self {
            session,
            auth,
            destination,
            authenticated: AtomicBool::new(false),
        })
    }

    /// Create a client and authenticate immediately
    pub async fn connect(
        destination: &str,
        auth: AuthConfig,
        session_config: &SessionConfig,
        client_config: &ClientConfig,
    ) -> Result<Self> {
        let client = Self::new(destination, auth, session_config, client_config).await?;
        client.authenticate().await?;
        Ok(client)
    }

    /// Log the session in, refreshing cookies if it already is
    ///
    /// Certificate sessions skip the handshake. Without an endpoint or an
    /// identity the session proceeds anonymously.
    pub async fn authenticate(&self) -> Result<()> {
        if self.auth.use_certificates {
            debug!("Relying on the client certificate for {}", self.destination);
            self.authenticated.store(true, Ordering::Release);
            return Ok(());
        }

        match self.auth_url() {
            Some(auth_url) => {
                AuthHandler::authenticate(&self.session, &self.destination, &auth_url, &self.auth)
                    .await?;
            }
            None => {
                warn!(
                    "No credentials for {}; access will be severely limited",
                    self.destination
                );
            }
        }

        self.authenticated.store(true, Ordering::Release);
        Ok(())
    }

    fn auth_url(&self) -> Option<AuthUrl> {
        let identity = self.auth.identity()?;
        match self.auth.authentication_url.as_ref()? {
            AuthEndpoint::Esgf => build_auth_url(self.destination.as_str(), identity),
            AuthEndpoint::Url(url) => Some(AuthUrl::Single(url.clone())),
        }
    }

    /// GET `url`, authenticating first when needed
    ///
    /// An error status triggers one fresh authenticate-then-request round;
    /// a second error status surfaces as a `ServerError` carrying its status
    /// line. Transport errors are never retried.
    pub async fn request(&self, url: &Url) -> Result<FetchedResponse> {
        let mut state = RetryState::Attempting;
        loop {
            if !self.is_authenticated() {
                self.authenticate().await?;
            }

            let response = self.session.get(url).await?;
            if response.is_success() {
                return Ok(response);
            }

            match state {
                RetryState::Attempting => {
                    warn!(
                        "{} answered {}; re-authenticating and retrying once",
                        url,
                        response.status()
                    );
                    self.authenticated.store(false, Ordering::Release);
                    state = RetryState::RetriedOnce;
                }
                RetryState::RetriedOnce => {
                    return Err(ServerError::from_status(response.status()).into());
                }
            }
        }
    }

    /// Stream `url` to `destination`; see [`DownloadHandler::download`]
    pub async fn download(
        &self,
        url: &Url,
        destination: &Path,
        options: DownloadOptions,
    ) -> Result<String> {
        if !self.is_authenticated() {
            self.authenticate().await?;
        }
        DownloadHandler::new(&self.session)
            .download(url, destination, options)
            .await
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn destination(&self) -> &Url {
        &self.destination
    }

    /// Release the session's cache connection
    pub async fn close(&self) {
        self.session.close().await;
    }
}

#[async_trait]
impl DapRequester for DapClient {
    async fn request(&self, url: &Url) -> Result<FetchedResponse> {
        DapClient::request(self, url).await
    }
}
