//! Authentication URL construction
//!
//! Derives the login endpoint of an OpenID relying party from the resource
//! being accessed. Everything here is pure string manipulation so it can be
//! checked against literal URL pairs.

use url::form_urlencoded;

use crate::constants::auth;

/// Authentication endpoint resolved for a destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthUrl {
    /// Logging in at this URL yields the session cookie directly
    Single(String),
    /// The provider hands out the session cookie only after a second redirect,
    /// which the caller must capture by revisiting the destination
    TwoStage(String),
}

impl AuthUrl {
    /// The login URL itself
    pub fn url(&self) -> &str {
        match self {
            AuthUrl::Single(url) | AuthUrl::TwoStage(url) => url,
        }
    }

    /// Whether a second request to the destination is needed after login
    pub fn is_two_stage(&self) -> bool {
        matches!(self, AuthUrl::TwoStage(_))
    }
}

/// Build the ESGF authentication URL for `destination_url` and `identity`
///
/// Returns `None` for an empty identity: the caller proceeds anonymously.
pub fn build_auth_url(destination_url: &str, identity: &str) -> Option<AuthUrl> {
    if identity.is_empty() {
        return None;
    }

    let encoded: String = form_urlencoded::byte_serialize(identity.as_bytes()).collect();
    let url = format!(
        "{}{}?{}={}",
        node(destination_url),
        auth::ESGF_LOGIN_PATH,
        auth::OPENID_PARAMETER,
        encoded
    );

    if node(identity) == auth::TWO_STAGE_PROVIDER_NODE {
        Some(AuthUrl::TwoStage(url))
    } else {
        Some(AuthUrl::Single(url))
    }
}

/// Scheme, host and port of `url`, forced onto secure transport
pub fn node(url: &str) -> String {
    let base = url.split('/').take(3).collect::<Vec<_>>().join("/");
    match base.strip_prefix("http:") {
        Some(rest) => format!("https:{rest}"),
        None => base,
    }
}
