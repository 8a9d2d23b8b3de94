//! Proxy for remote array variables

use std::fmt;
use std::sync::Arc;

use ndarray::ArrayD;
use tracing::debug;

use crate::app::dap::{self, DapArray, DdsNode};
use crate::app::proxy::constraint::{Atom, CompareOp};
use crate::app::proxy::slice::{self, Index, Slice};
use crate::app::proxy::{data_url, DapRequester, Sliceable};
use crate::errors::{DapError, DapResult, Result};

/// Lazy view over a remote base-type array
///
/// Slicing only records the selection; data moves when
/// [`get_item`](Self::get_item), [`values`](Self::values) or one of the
/// comparison methods is awaited.
#[derive(Clone)]
pub struct ArrayProxy {
    id: String,
    url: String,
    shape: Vec<usize>,
    selection: Vec<Slice>,
    requester: Arc<dyn DapRequester>,
}

impl fmt::Debug for ArrayProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayProxy")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("shape", &self.shape)
            .field("selection", &self.selection)
            .finish()
    }
}

impl ArrayProxy {
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        shape: Vec<usize>,
        requester: Arc<dyn DapRequester>,
    ) -> Self {
        let selection = vec![Slice::FULL; shape.len()];
        Self {
            id: id.into(),
            url: url.into(),
            shape,
            selection,
            requester,
        }
    }

    /// Declared shape of the variable, independent of any slicing
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Dimension lengths as seen through the pending selection
    fn visible_dims(&self) -> Vec<Option<u64>> {
        self.selection
            .iter()
            .zip(&self.shape)
            .map(|(slice, dim)| slice.len_within(Some(*dim as u64)))
            .collect()
    }

    /// Fetch the elements selected by `index`
    pub async fn get_item(&self, index: &[Index]) -> Result<DapArray> {
        self.slice(index)?.fetch().await
    }

    /// Fetch every element of the current view
    pub async fn values(&self) -> Result<DapArray> {
        self.get_item(&[]).await
    }

    async fn fetch(&self) -> Result<DapArray> {
        let dims: Vec<Option<u64>> = self.shape.iter().map(|dim| Some(*dim as u64)).collect();
        slice::ensure_non_empty(&self.selection, &dims)?;

        let url = data_url(&self.url, &format!("{}{}", self.id, self.hyperslab()))?;
        debug!("Requesting {} from {}", self.id, url);

        let response = self.requester.request(&url).await?;
        let decoded = dap::parse_response(&response.body)?;
        drop(response);

        let node = self.locate(&decoded.dds)?;
        decoded
            .extract(node)
            .and_then(|value| value.into_array())
            .ok_or_else(|| {
                DapError::UnexpectedKind {
                    id: self.id.clone(),
                    expected: "an array",
                }
                .into()
            })
    }

    /// Leaf for this variable; some servers answer a request for an array
    /// inside a grid with the bare array, so fall back to a suffix match.
    fn locate<'a>(&self, dds: &'a DdsNode) -> DapResult<&'a DdsNode> {
        let candidates: Vec<&DdsNode> = dds
            .walk()
            .into_iter()
            .filter(|node| !node.is_container())
            .collect();

        candidates
            .iter()
            .find(|node| node.id == self.id)
            .or_else(|| candidates.iter().find(|node| self.id.ends_with(&node.id)))
            .copied()
            .ok_or_else(|| DapError::MissingVariable {
                name: self.id.clone(),
                path: self.url.clone(),
            })
    }

    /// Fetch the current view and compare it elementwise with `rhs`
    pub async fn compare(&self, op: CompareOp, rhs: impl Into<Atom>) -> Result<ArrayD<bool>> {
        let rhs = rhs.into();
        let values = self.values().await?;
        compare_array(&values, op, &rhs).map_err(Into::into)
    }

    pub async fn eq(&self, rhs: impl Into<Atom>) -> Result<ArrayD<bool>> {
        self.compare(CompareOp::Eq, rhs).await
    }

    pub async fn ne(&self, rhs: impl Into<Atom>) -> Result<ArrayD<bool>> {
        self.compare(CompareOp::Ne, rhs).await
    }

    pub async fn lt(&self, rhs: impl Into<Atom>) -> Result<ArrayD<bool>> {
        self.compare(CompareOp::Lt, rhs).await
    }

    pub async fn le(&self, rhs: impl Into<Atom>) -> Result<ArrayD<bool>> {
        self.compare(CompareOp::Le, rhs).await
    }

    pub async fn gt(&self, rhs: impl Into<Atom>) -> Result<ArrayD<bool>> {
        self.compare(CompareOp::Gt, rhs).await
    }

    pub async fn ge(&self, rhs: impl Into<Atom>) -> Result<ArrayD<bool>> {
        self.compare(CompareOp::Ge, rhs).await
    }
}

impl Sliceable for ArrayProxy {
    fn id(&self) -> &str {
        &self.id
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn selection(&self) -> &[Slice] {
        &self.selection
    }

    fn slice(&self, index: &[Index]) -> DapResult<Self> {
        let normalized = slice::normalize(index, &self.visible_dims())?;
        Ok(Self {
            selection: slice::compose(&self.selection, &normalized),
            ..self.clone()
        })
    }
}

fn compare_array(values: &DapArray, op: CompareOp, rhs: &Atom) -> DapResult<ArrayD<bool>> {
    let incomparable = || DapError::IncomparableLiteral {
        dtype: values.dtype().to_string(),
        literal: rhs.to_string(),
    };

    if let Atom::Str(target) = rhs {
        let strings = values.as_strings().ok_or_else(incomparable)?;
        return Ok(strings.map(|value| op.holds(value.as_str(), target.as_str())));
    }

    let target = rhs.as_f64().ok_or_else(incomparable)?;
    let numbers = values.to_f64().ok_or_else(incomparable)?;
    Ok(numbers.mapv(|value| op.holds(&value, &target)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::client::response::{FetchedResponse, ResponseMetadata};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use url::Url;

    /// Serves a fixed body and records requested URLs
    struct Canned {
        body: Vec<u8>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DapRequester for Canned {
        async fn request(&self, url: &Url) -> Result<FetchedResponse> {
            self.seen.lock().unwrap().push(url.to_string());
            Ok(FetchedResponse {
                metadata: ResponseMetadata {
                    url: url.to_string(),
                    status: 200,
                    headers: Vec::new(),
                    content_length: Some(self.body.len() as u64),
                    from_cache: false,
                },
                body: self.body.clone(),
            })
        }
    }

    fn temperature_body(values: &[f64]) -> Vec<u8> {
        let mut body = format!(
            "Dataset {{\n    Float64 temperature[time = {}];\n}} test.nc;\nData:\n",
            values.len()
        )
        .into_bytes();
        let count = values.len() as u32;
        body.extend_from_slice(&count.to_be_bytes());
        body.extend_from_slice(&count.to_be_bytes());
        for value in values {
            body.extend_from_slice(&value.to_be_bytes());
        }
        body
    }

    fn temperature_proxy(body: Vec<u8>) -> (ArrayProxy, Arc<Canned>) {
        let canned = Arc::new(Canned {
            body,
            seen: Mutex::new(Vec::new()),
        });
        let proxy = ArrayProxy::new("temperature", "http://example.com/test.nc", vec![4], canned.clone());
        (proxy, canned)
    }

    #[tokio::test]
    async fn test_get_item_requests_hyperslab() {
        let (proxy, canned) = temperature_proxy(temperature_body(&[15.2, 13.1]));
        let values = proxy.get_item(&[Index::range(0, 2)]).await.unwrap();

        assert_eq!(values.to_f64().unwrap().as_slice().unwrap(), &[15.2, 13.1]);
        assert_eq!(
            canned.seen.lock().unwrap().as_slice(),
            &["http://example.com/test.nc.dods?temperature[0:1:1]&".to_string()]
        );
    }

    #[tokio::test]
    async fn test_reslicing_composes_selection() {
        let (proxy, canned) = temperature_proxy(temperature_body(&[13.3]));
        let tail = proxy.slice(&[Index::range(1, 4)]).unwrap();
        assert_eq!(tail.shape(), &[4]);

        let values = tail.get_item(&[Index::At(-2)]).await.unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(
            canned.seen.lock().unwrap().last().unwrap(),
            "http://example.com/test.nc.dods?temperature[2:1:2]&"
        );
        // The parent is untouched.
        assert_eq!(proxy.selection(), &[Slice::FULL]);
    }

    #[tokio::test]
    async fn test_comparisons_materialize_booleans() {
        let (proxy, _) = temperature_proxy(temperature_body(&[15.2, 13.1, 13.3, 12.1]));
        let mask = proxy.gt(13.2f64).await.unwrap();
        assert_eq!(mask.as_slice().unwrap(), &[true, false, true, false]);

        let equal = proxy.eq(12.1f64).await.unwrap();
        assert_eq!(equal.iter().filter(|hit| **hit).count(), 1);

        let error = proxy.lt("warm").await.unwrap_err();
        assert!(error.to_string().contains("Cannot compare"));
    }

    #[tokio::test]
    async fn test_empty_range_is_not_requested() {
        let (proxy, canned) = temperature_proxy(temperature_body(&[15.2]));

        let error = proxy.get_item(&[Index::range(0, 0)]).await.unwrap_err();
        assert!(matches!(
            error,
            crate::errors::AppError::Dap(DapError::InvalidSlice { .. })
        ));
        assert!(proxy.get_item(&[Index::range(2, 2)]).await.is_err());
        assert!(canned.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_suffix_fallback_for_bare_grid_array() {
        let body = temperature_body(&[1.0, 2.0, 3.0, 4.0]);
        let canned = Arc::new(Canned {
            body,
            seen: Mutex::new(Vec::new()),
        });
        let proxy = ArrayProxy::new(
            "grid.temperature",
            "http://example.com/test.nc",
            vec![4],
            canned,
        );
        let values = proxy.values().await.unwrap();
        assert_eq!(values.len(), 4);
    }

    #[tokio::test]
    async fn test_missing_leaf_reports_url() {
        let (_, canned) = temperature_proxy(temperature_body(&[1.0]));
        let proxy = ArrayProxy::new("salinity", "http://example.com/test.nc", vec![1], canned);
        let error = proxy.values().await.unwrap_err();
        assert_eq!(error.to_string(), "salinity not found in http://example.com/test.nc");
    }
}
