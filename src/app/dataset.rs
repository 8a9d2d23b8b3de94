//! Remote dataset structure
//!
//! Opening a dataset fetches its DDS once. Variables are then handed out as
//! lazy proxies sharing the dataset's requester.

use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::app::dap::{self, DdsNode, NodeKind};
use crate::app::proxy::{split_url, ArrayProxy, DapRequester, SequenceProxy};
use crate::constants::dap::DDS_SUFFIX;
use crate::errors::{DapError, Result, ServerError};

/// A variable of a remote dataset
#[derive(Debug, Clone)]
pub enum Variable {
    Array(ArrayProxy),
    Sequence(SequenceProxy),
}

impl Variable {
    pub fn as_array(&self) -> Option<&ArrayProxy> {
        match self {
            Variable::Array(proxy) => Some(proxy),
            Variable::Sequence(_) => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&SequenceProxy> {
        match self {
            Variable::Sequence(proxy) => Some(proxy),
            Variable::Array(_) => None,
        }
    }
}

/// Structure of a remote dataset and a way to reach its variables
pub struct RemoteDataset {
    url: String,
    dds: DdsNode,
    requester: Arc<dyn DapRequester>,
}

impl std::fmt::Debug for RemoteDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteDataset")
            .field("url", &self.url)
            .field("dds", &self.dds)
            .finish()
    }
}

impl RemoteDataset {
    /// Fetch and parse the DDS of the dataset at `url`
    ///
    /// # Errors
    ///
    /// - `ServerError` for an error status
    /// - `DapError::Remote` when the server answers with a DAP error document
    /// - `DapError::Parse` for a malformed descriptor
    pub async fn open(url: &str, requester: Arc<dyn DapRequester>) -> Result<Self> {
        let dds_url = dds_url(url)?;
        debug!("Fetching structure from {}", dds_url);

        let response = requester.request(&dds_url).await?;
        if !response.is_success() {
            return Err(ServerError::from_status(response.status()).into());
        }

        let text = response.text();
        if let Some(message) = dap::remote_error_message(&text) {
            return Err(DapError::Remote { message }.into());
        }
        let dds = dap::dds::parse(&text)?;

        Ok(Self {
            url: url.to_string(),
            dds,
            requester,
        })
    }

    /// Dataset name declared in the DDS
    pub fn name(&self) -> &str {
        &self.dds.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn dds(&self) -> &DdsNode {
        &self.dds
    }

    /// Names of the top-level variables, in declaration order
    pub fn variable_names(&self) -> Vec<&str> {
        self.dds.child_names()
    }

    /// Proxy for the variable with dotted id `name`
    ///
    /// Grids are served through their array member. Anything nested in a
    /// sequence is a column and gets a sequence proxy.
    pub fn variable(&self, name: &str) -> Result<Variable> {
        let node = self
            .dds
            .find(name)
            .ok_or_else(|| DapError::MissingVariable {
                name: name.to_string(),
                path: "/".to_string(),
            })?;

        if self.within_sequence(node) {
            return Ok(Variable::Sequence(self.sequence(node)));
        }

        match &node.kind {
            NodeKind::Base { shape, .. } => Ok(Variable::Array(self.array(node, shape))),
            NodeKind::Grid => {
                let array = node.children.first().ok_or_else(|| DapError::UnexpectedKind {
                    id: node.id.clone(),
                    expected: "a grid with an array member",
                })?;
                Ok(Variable::Array(self.array(array, array.shape())))
            }
            NodeKind::Sequence => Ok(Variable::Sequence(self.sequence(node))),
            NodeKind::Structure | NodeKind::Dataset => Err(DapError::UnexpectedKind {
                id: node.id.clone(),
                expected: "an array or a sequence",
            }
            .into()),
        }
    }

    fn within_sequence(&self, node: &DdsNode) -> bool {
        self.dds.trail(node).is_some_and(|trail| {
            trail
                .iter()
                .rev()
                .skip(1)
                .any(|(_, ancestor)| ancestor.kind == NodeKind::Sequence)
        })
    }

    fn sequence(&self, node: &DdsNode) -> SequenceProxy {
        SequenceProxy::new(node.id.clone(), self.url.clone(), self.requester.clone())
    }

    fn array(&self, node: &DdsNode, shape: &[usize]) -> ArrayProxy {
        ArrayProxy::new(
            node.id.clone(),
            self.url.clone(),
            shape.to_vec(),
            self.requester.clone(),
        )
    }
}

/// `<base>.dds` followed by the resource's own query
fn dds_url(url: &str) -> Result<Url> {
    let parts = split_url(url);
    let mut raw = format!("{}{}", parts.base, DDS_SUFFIX);
    if !parts.query.is_empty() {
        raw.push('?');
        raw.push_str(parts.query);
    }
    Url::parse(&raw).map_err(|e| {
        DapError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::client::{FetchedResponse, ResponseMetadata};
    use crate::app::proxy::Sliceable;
    use async_trait::async_trait;

    const DDS: &str = "Dataset {
    Float32 temperature[time = 4];
    Grid {
      ARRAY:
        Float32 sst[time = 2][lat = 3];
      MAPS:
        Float64 time[time = 2];
        Float64 lat[lat = 3];
    } sst;
    Sequence {
        String name;
        Float64 depth;
    } casts;
    Structure {
        Int32 flag;
    } meta;
} test.nc;";

    struct Fixed(u16, &'static str);

    #[async_trait]
    impl DapRequester for Fixed {
        async fn request(&self, url: &Url) -> Result<FetchedResponse> {
            Ok(FetchedResponse {
                metadata: ResponseMetadata {
                    url: url.to_string(),
                    status: self.0,
                    headers: Vec::new(),
                    content_length: Some(self.1.len() as u64),
                    from_cache: false,
                },
                body: self.1.as_bytes().to_vec(),
            })
        }
    }

    async fn dataset() -> RemoteDataset {
        RemoteDataset::open("http://example.com/test.nc", Arc::new(Fixed(200, DDS)))
            .await
            .unwrap()
    }

    #[test]
    fn test_dds_url_keeps_query() {
        assert_eq!(
            dds_url("http://example.com/test.nc").unwrap().as_str(),
            "http://example.com/test.nc.dds"
        );
        assert_eq!(
            dds_url("http://example.com/test.nc?casts.depth>10&")
                .unwrap()
                .as_str(),
            "http://example.com/test.nc.dds?casts.depth%3E10&"
        );
    }

    #[tokio::test]
    async fn test_variables_are_listed() {
        let dataset = dataset().await;
        assert_eq!(dataset.name(), "test.nc");
        assert_eq!(
            dataset.variable_names(),
            vec!["temperature", "sst", "casts", "meta"]
        );
    }

    #[tokio::test]
    async fn test_variable_kinds() {
        let dataset = dataset().await;

        let temperature = dataset.variable("temperature").unwrap();
        assert_eq!(temperature.as_array().unwrap().shape(), &[4]);

        let sst = dataset.variable("sst").unwrap();
        let sst = sst.as_array().unwrap();
        assert_eq!(sst.id(), "sst.sst");
        assert_eq!(sst.shape(), &[2, 3]);

        let casts = dataset.variable("casts").unwrap();
        assert_eq!(casts.as_sequence().unwrap().id(), "casts");

        let depth = dataset.variable("casts.depth").unwrap();
        assert!(depth.as_array().is_none());
        assert_eq!(depth.as_sequence().unwrap().id(), "casts.depth");

        assert!(matches!(
            dataset.variable("meta"),
            Err(crate::errors::AppError::Dap(DapError::UnexpectedKind { .. }))
        ));
    }

    #[tokio::test]
    async fn test_missing_variable() {
        let dataset = dataset().await;
        let error = dataset.variable("missing").unwrap_err();
        assert_eq!(error.to_string(), "missing not found in /");
    }

    #[tokio::test]
    async fn test_remote_error_document() {
        let body = "Error {\n    code = 404;\n    message = \"No such file\";\n};";
        let error = RemoteDataset::open("http://example.com/gone.nc", Arc::new(Fixed(200, body)))
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "No such file");
    }

    #[tokio::test]
    async fn test_error_status() {
        let error = RemoteDataset::open("http://example.com/test.nc", Arc::new(Fixed(403, "")))
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "403 Forbidden");
    }
}
