//! Fully consumed HTTP responses
//!
//! The proxies never see a live `reqwest::Response`: the body is read to the
//! end inside [`FetchedResponse::read`], which takes the response by value,
//! so the connection goes back to the pool exactly once on every path,
//! including the error paths.

use std::borrow::Cow;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Status line and headers of a completed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Final URL after redirects
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub content_length: Option<u64>,
    /// Served from the response cache instead of the network
    #[serde(default)]
    pub from_cache: bool,
}

impl ResponseMetadata {
    fn from_response(response: &reqwest::Response) -> Self {
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();

        Self {
            url: response.url().to_string(),
            status: response.status().as_u16(),
            headers,
            content_length: response.content_length(),
            from_cache: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// First header value named `name`, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Metadata plus the complete body
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub metadata: ResponseMetadata,
    pub body: Vec<u8>,
}

impl FetchedResponse {
    /// Read `response` to the end and release it
    pub async fn read(response: reqwest::Response) -> reqwest::Result<Self> {
        let metadata = ResponseMetadata::from_response(&response);
        let body = response.bytes().await?.to_vec();
        Ok(Self { metadata, body })
    }

    pub fn status(&self) -> StatusCode {
        self.metadata.status()
    }

    pub fn is_success(&self) -> bool {
        self.status().is_success()
    }

    /// Body decoded as UTF-8, lossily
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}
