//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use opendap_fetcher::app::{ClientConfig, DapClient, SessionConfig};
use opendap_fetcher::auth::AuthConfig;

pub const START_OF_INSTANCE: u32 = 0x5A00_0000;
pub const END_OF_SEQUENCE: u32 = 0xA500_0000;

/// Client without credentials for `url`
pub async fn anonymous_client(url: &str) -> Arc<DapClient> {
    client(url, AuthConfig::anonymous(), &SessionConfig::default()).await
}

pub async fn client(url: &str, auth: AuthConfig, session: &SessionConfig) -> Arc<DapClient> {
    let client = DapClient::new(url, auth, session, &ClientConfig::default())
        .await
        .expect("client should be created");
    Arc::new(client)
}

/// Data response for a one-dimensional Float64 variable
pub fn float64_body(name: &str, values: &[f64]) -> Vec<u8> {
    let mut body = format!(
        "Dataset {{\n    Float64 {name}[time = {}];\n}} test.nc;\nData:\n",
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

/// Data response for sequence `casts` with `id` and `depth` columns
pub fn casts_body(rows: &[(i32, f64)]) -> Vec<u8> {
    let mut body = b"Dataset {\n    Sequence {\n        Int32 id;\n        Float64 depth;\n    } casts;\n} test.nc;\nData:\n".to_vec();
    for (id, depth) in rows {
        body.extend_from_slice(&START_OF_INSTANCE.to_be_bytes());
        body.extend_from_slice(&id.to_be_bytes());
        body.extend_from_slice(&depth.to_be_bytes());
    }
    body.extend_from_slice(&END_OF_SEQUENCE.to_be_bytes());
    body
}

pub const TEST_DDS: &str = "Dataset {
    Float64 temperature[time = 4];
    Sequence {
        Int32 id;
        Float64 depth;
    } casts;
} test.nc;";
