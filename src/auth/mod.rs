//! Authentication configuration and login URL derivation
//!
//! This module describes *how* a caller wants to authenticate; the handshake
//! itself runs in [`crate::app::client::auth`].
//!
//! # Examples
//!
//! ```rust
//! use opendap_fetcher::auth::{build_auth_url, AuthConfig, AuthUrl};
//!
//! let config = AuthConfig::esgf("https://esgf-node.llnl.gov/esgf-idp/openid/jdoe", "secret");
//! assert!(config.identity().is_some());
//!
//! let url = build_auth_url("http://aims3.llnl.gov/thredds/dodsC/x.nc", "https://esgf-node.llnl.gov/esgf-idp/openid/jdoe");
//! assert!(matches!(url, Some(AuthUrl::Single(_))));
//! ```

pub mod credentials;
pub mod url;

// Re-export main public API
pub use credentials::{AuthConfig, AuthEndpoint};
pub use self::url::{build_auth_url, node, AuthUrl};
