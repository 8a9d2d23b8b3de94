//! HTTP sessions with an attached cookie jar and optional response cache

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::app::cache::{CacheBackend, ResponseCache};
use crate::app::client::config::ClientConfig;
use crate::app::client::http::HttpHandler;
use crate::app::client::response::FetchedResponse;
use crate::constants::cache::DEFAULT_BACKEND;
use crate::errors::{Result, SessionResult};

/// Where and how responses are cached
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cache name; the SQLite backend stores it at `<cache>.sqlite`.
    /// `None` gives an uncached session.
    pub cache: Option<PathBuf>,
    /// Backend name, `sqlite` or `memory`
    pub backend: String,
    /// Age after which cached responses are refetched
    #[serde(with = "humantime_serde")]
    pub expire_after: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache: None,
            backend: DEFAULT_BACKEND.to_string(),
            expire_after: None,
        }
    }
}

impl SessionConfig {
    /// Cached session stored under `cache`
    pub fn cached(cache: impl Into<PathBuf>) -> Self {
        Self {
            cache: Some(cache.into()),
            ..Self::default()
        }
    }
}

/// An HTTP session: client, cookies and cache for one logical connection
#[derive(Debug)]
pub struct Session {
    http: HttpHandler,
    jar: Arc<Jar>,
    cache: Option<ResponseCache>,
}

impl Session {
    /// Create a session, opening (or rebuilding) the cache when configured
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnsupportedBackend` for an unknown backend
    /// name, even when no cache is requested
    pub async fn create(config: &SessionConfig, client_config: &ClientConfig) -> SessionResult<Self> {
        let backend = CacheBackend::from_str(&config.backend)?;

        let jar = Arc::new(Jar::default());
        let client = client_config.build_http_client(jar.clone())?;
        let http = HttpHandler::new(client, client_config.rate_limit_rps)?;

        let cache = match &config.cache {
            Some(name) => {
                let cache = ResponseCache::open(name, backend, config.expire_after).await?;
                info!("Using {:?} response cache {}", backend, name.display());
                Some(cache)
            }
            None => None,
        };

        Ok(Self { http, jar, cache })
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    pub fn cache(&self) -> Option<&ResponseCache> {
        self.cache.as_ref()
    }

    pub fn client(&self) -> &Client {
        self.http.client()
    }

    /// Names of the cookies the jar would send to `url`
    pub fn cookie_names(&self, url: &Url) -> Vec<String> {
        let Some(header) = self.jar.cookies(url) else {
            return Vec::new();
        };
        header
            .to_str()
            .unwrap_or_default()
            .split(';')
            .filter_map(|pair| pair.split_once('=').map(|(name, _)| name.trim().to_string()))
            .filter(|name| !name.is_empty())
            .collect()
    }

    /// Rate-limited, uncached request
    pub async fn send(&self, request: RequestBuilder) -> reqwest::Result<Response> {
        self.http.send(request).await
    }

    /// GET `url` through the cache; successful responses are stored
    pub async fn get(&self, url: &Url) -> Result<FetchedResponse> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(url.as_str()).await? {
                return Ok(cached);
            }
        }

        let response = self.send(self.client().get(url.clone())).await?;
        let fetched = FetchedResponse::read(response).await?;

        if let Some(cache) = &self.cache {
            if fetched.is_success() {
                cache.put(url.as_str(), &fetched).await?;
                debug!("Cached response for {}", url);
            }
        }
        Ok(fetched)
    }

    /// Release the cache connection
    pub async fn close(&self) {
        if let Some(cache) = &self.cache {
            cache.close().await;
        }
    }
}
