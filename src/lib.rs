//! OPeNDAP Fetcher Library
//!
//! Authenticated access to remote arrays and sequences served over DAP2.
//! Variables are exposed as lazy proxies: slicing and filtering only build
//! request URLs, and data moves when a proxy is read. Sessions log in to
//! ESGF-style identity providers, retry a failed request once after
//! re-authenticating, and can cache responses in SQLite.

pub mod app;
pub mod auth;
pub mod config;
pub mod constants;
pub mod errors;
pub mod logging;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
