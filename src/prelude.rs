//! Prelude module for OPeNDAP Fetcher Library
//!
//! Re-exports the items most integrations need, so a single
//! `use opendap_fetcher::prelude::*;` covers opening a dataset and reading
//! its variables.
//!
//! # Usage
//!
//! ```rust,no_run
//! use opendap_fetcher::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let url = "https://esgf.example.org/thredds/dodsC/casts.nc";
//!     let client = DapClient::new(
//!         url,
//!         AuthConfig::anonymous(),
//!         &SessionConfig::default(),
//!         &ClientConfig::default(),
//!     )
//!     .await?;
//!     let dataset = RemoteDataset::open(url, Arc::new(client)).await?;
//!
//!     if let Variable::Sequence(casts) = dataset.variable("casts")? {
//!         let deep = casts.filter(&casts.column("depth").gt(100.0f64));
//!         println!("{} deep casts", deep.len().await?);
//!     }
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Client and session
pub use crate::app::client::{
    ClientConfig, DapClient, DownloadOptions, FetchedResponse, Session, SessionConfig,
};

// Datasets and proxies
pub use crate::app::dap::{DapArray, DapValue};
pub use crate::app::dataset::{RemoteDataset, Variable};
pub use crate::app::proxy::{
    ArrayProxy, ConstraintExpression, DapRequester, Index, SequenceProxy, Sliceable,
};

// Configuration
pub use crate::auth::{AuthConfig, AuthEndpoint};
pub use crate::config::AppConfig;
pub use crate::logging::{init_logging, LoggingConfig};

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;
