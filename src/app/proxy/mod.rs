//! Lazy proxies over remote variables
//!
//! Two proxy kinds share the [`Sliceable`] capability but keep distinct
//! comparison semantics:
//! - [`ArrayProxy`] comparisons fetch the data and compare it locally,
//!   yielding boolean arrays
//! - [`SequenceProxy`] comparisons build [`ConstraintExpression`]s that the
//!   server evaluates
//!
//! Every derivation (slicing, filtering, projection) returns a new proxy that
//! owns its own `id`, `url`, selection and column list.

use async_trait::async_trait;
use url::Url;

use crate::app::client::response::FetchedResponse;
use crate::constants::dap::DODS_SUFFIX;
use crate::errors::{DapError, DapResult, Result};

pub mod array;
pub mod constraint;
pub mod sequence;
pub mod slice;

pub use array::ArrayProxy;
pub use constraint::{Atom, CompareOp, ConstraintExpression};
pub use sequence::{SequenceKey, SequenceProxy};
pub use slice::{Index, Slice};

/// Issues one request and returns the fully read response
///
/// Implemented by the authenticating client; tests substitute canned
/// responders.
#[async_trait]
pub trait DapRequester: Send + Sync {
    async fn request(&self, url: &Url) -> Result<FetchedResponse>;
}

/// Shared slicing behaviour of remote variables
pub trait Sliceable: Sized {
    /// Dotted variable path
    fn id(&self) -> &str;

    /// Resource URL, including any pending selection query
    fn url(&self) -> &str;

    /// Pending selection, one slice per dimension
    fn selection(&self) -> &[Slice];

    /// New proxy with `index` composed onto the pending selection
    fn slice(&self, index: &[Index]) -> DapResult<Self>;

    /// Hyperslab encoding of the pending selection
    fn hyperslab(&self) -> String {
        slice::hyperslab(self.selection())
    }
}

/// Resource URL split around its query
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UrlParts<'a> {
    pub base: &'a str,
    pub query: &'a str,
    pub fragment: Option<&'a str>,
}

pub(crate) fn split_url(url: &str) -> UrlParts<'_> {
    let (rest, fragment) = match url.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (url, None),
    };
    let (base, query) = rest.split_once('?').unwrap_or((rest, ""));
    UrlParts {
        base,
        query,
        fragment,
    }
}

fn join_url(base: &str, query: &str, fragment: Option<&str>) -> String {
    let mut url = base.to_string();
    if !query.is_empty() {
        url.push('?');
        url.push_str(query);
    }
    if let Some(fragment) = fragment {
        url.push('#');
        url.push_str(fragment);
    }
    url
}

/// `url` with its query replaced by `query`
pub(crate) fn with_query(url: &str, query: &str) -> String {
    let parts = split_url(url);
    join_url(parts.base, query, parts.fragment)
}

/// Data request for `projection`, keeping the resource's own query after it
pub(crate) fn data_url(url: &str, projection: &str) -> DapResult<Url> {
    let parts = split_url(url);
    let base = format!("{}{}", parts.base, DODS_SUFFIX);
    let query = format!("{projection}&{}", parts.query);
    let raw = join_url(&base, &query, parts.fragment);
    Url::parse(&raw).map_err(|e| DapError::InvalidUrl {
        url: raw,
        reason: e.to_string(),
    })
}
