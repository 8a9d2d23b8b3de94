//! Rate-limited request execution
//!
//! Every request leaving a session passes through [`HttpHandler::send`],
//! which waits for the governor quota before handing the request to
//! `reqwest`. No retries happen here: transport failures surface to the
//! caller untouched.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{clock::DefaultClock, state::InMemoryState, Jitter, Quota, RateLimiter};
use reqwest::{Client, RequestBuilder, Response};

use crate::errors::{SessionError, SessionResult};

type DirectRateLimiter = RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>;

/// HTTP operations handler with rate limiting
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    rate_limiter: DirectRateLimiter,
}

impl HttpHandler {
    /// Creates a new HttpHandler with the given client and rate limiting
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidRateLimit` for a zero rate
    pub fn new(client: Client, rate_limit_rps: u32) -> SessionResult<Self> {
        let rate_limiter = Self::build_rate_limiter(rate_limit_rps)?;
        Ok(Self {
            client,
            rate_limiter,
        })
    }

    fn build_rate_limiter(rate_limit_rps: u32) -> SessionResult<DirectRateLimiter> {
        let rate = NonZeroU32::new(rate_limit_rps).ok_or(SessionError::InvalidRateLimit)?;
        Ok(RateLimiter::direct(Quota::per_second(rate)))
    }

    /// Sends `request` once the rate limiter allows it
    pub async fn send(&self, request: RequestBuilder) -> reqwest::Result<Response> {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(50)))
            .await;

        let response = request.send().await?;
        tracing::debug!("{} {}", response.status(), response.url());
        Ok(response)
    }

    /// Get a reference to the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }
}
