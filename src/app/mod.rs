//! Core application logic for OPeNDAP Fetcher
//!
//! This module contains the authenticating HTTP client, the response cache,
//! DAP2 decoding and the lazy variable proxies built on top of them.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use opendap_fetcher::app::{ClientConfig, DapClient, RemoteDataset, SessionConfig};
//! use opendap_fetcher::app::proxy::Index;
//! use opendap_fetcher::auth::AuthConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let url = "https://esgf.example.org/thredds/dodsC/tas.nc";
//! let auth = AuthConfig::esgf("https://idp.example.org/openid/alice", "secret");
//! let client = DapClient::connect(
//!     url,
//!     auth,
//!     &SessionConfig::default(),
//!     &ClientConfig::default(),
//! )
//! .await?;
//!
//! let dataset = RemoteDataset::open(url, Arc::new(client)).await?;
//! if let Some(tas) = dataset.variable("tas")?.as_array() {
//!     let first = tas.get_item(&[Index::At(0)]).await?;
//!     println!("{:?}", first.shape());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod dap;
pub mod dataset;
pub mod proxy;

// Re-export main public API
pub use cache::{CacheBackend, ResponseCache};
pub use client::{
    ClientConfig, DapClient, DownloadOptions, FetchedResponse, Session, SessionConfig,
};
pub use dap::{DapArray, DapType, DapValue, DdsNode};
pub use dataset::{RemoteDataset, Variable};
pub use proxy::{
    ArrayProxy, ConstraintExpression, DapRequester, Index, SequenceProxy, Sliceable,
};
