//! End-to-end proxy tests against a mock OPeNDAP server

mod common;

use std::sync::Arc;

use opendap_fetcher::app::dap::DapValue;
use opendap_fetcher::app::proxy::{ArrayProxy, Index, SequenceProxy, Sliceable};
use opendap_fetcher::app::RemoteDataset;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{anonymous_client, casts_body, float64_body, TEST_DDS};

async fn mount(server: &MockServer, route: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

async fn queries(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| request.url.query().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn test_array_slice_returns_selected_values() {
    let server = MockServer::start().await;
    mount(&server, "/test.nc.dods", float64_body("temperature", &[15.2, 13.1])).await;

    let url = format!("{}/test.nc", server.uri());
    let client = anonymous_client(&url).await;
    let proxy = ArrayProxy::new("temperature", url, vec![4], client);

    let values = proxy.get_item(&[Index::range(0, 2)]).await.unwrap();

    assert_eq!(values.to_f64().unwrap().as_slice().unwrap(), &[15.2, 13.1]);
    assert_eq!(queries(&server).await, vec!["temperature[0:1:1]&"]);
}

#[tokio::test]
async fn test_array_comparison_is_local() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/test.nc.dods",
        float64_body("temperature", &[15.2, 13.1, 13.3, 12.1]),
    )
    .await;

    let url = format!("{}/test.nc", server.uri());
    let proxy = ArrayProxy::new("temperature", url, vec![4], anonymous_client(&server.uri()).await);

    let mask = proxy.gt(13.2f64).await.unwrap();
    assert_eq!(mask.as_slice().unwrap(), &[true, false, true, false]);
    // The full extent is requested as an explicit hyperslab
    assert_eq!(queries(&server).await, vec!["temperature[0:1:3]&"]);
}

#[tokio::test]
async fn test_dataset_serves_proxies() {
    let server = MockServer::start().await;
    mount(&server, "/test.nc.dds", TEST_DDS.as_bytes().to_vec()).await;
    mount(&server, "/test.nc.dods", float64_body("temperature", &[13.3, 12.1])).await;

    let url = format!("{}/test.nc", server.uri());
    let dataset = RemoteDataset::open(&url, anonymous_client(&url).await)
        .await
        .unwrap();
    assert_eq!(dataset.variable_names(), vec!["temperature", "casts"]);

    let variable = dataset.variable("temperature").unwrap();
    let temperature = variable.as_array().unwrap();
    assert_eq!(temperature.shape(), &[4]);

    let tail = temperature.get_item(&[Index::from(2i64..)]).await.unwrap();
    assert_eq!(tail.to_f64().unwrap().as_slice().unwrap(), &[13.3, 12.1]);

    let error = dataset.variable("missing").unwrap_err();
    assert_eq!(error.to_string(), "missing not found in /");
}

#[tokio::test]
async fn test_sequence_filter_and_projection() {
    let server = MockServer::start().await;
    mount(&server, "/test.nc.dods", casts_body(&[(2, 20.5), (3, 30.5)])).await;

    let url = format!("{}/test.nc", server.uri());
    let casts = SequenceProxy::new("casts", url.clone(), anonymous_client(&url).await);

    let deep = casts
        .filter(&casts.column("depth").gt(10i64))
        .project(["depth", "id"]);
    assert_eq!(deep.url(), format!("{url}?casts.depth>10&"));

    let rows = deep.rows().await.unwrap();
    assert_eq!(rows.len(), 2);

    let first = rows[0].fields().unwrap();
    assert_eq!(first[0].as_f64(), Some(20.5));
    assert_eq!(first[1].as_f64(), Some(2.0));

    assert_eq!(
        queries(&server).await,
        vec!["casts.depth,casts.id&casts.depth%3E10&"]
    );
}

#[tokio::test]
async fn test_sequence_column_rows() {
    let server = MockServer::start().await;
    mount(&server, "/test.nc.dods", casts_body(&[(1, 5.0), (2, 20.5)])).await;

    let url = format!("{}/test.nc", server.uri());
    let casts = SequenceProxy::new("casts", url.clone(), anonymous_client(&url).await);

    let depth = casts.column("depth");
    let values: Vec<f64> = depth
        .rows()
        .await
        .unwrap()
        .iter()
        .filter_map(DapValue::as_f64)
        .collect();
    assert_eq!(values, vec![5.0, 20.5]);
    assert_eq!(depth.len().await.unwrap(), 2);
}

#[tokio::test]
async fn test_dataset_serves_sequence_columns() {
    let server = MockServer::start().await;
    mount(&server, "/test.nc.dds", TEST_DDS.as_bytes().to_vec()).await;
    mount(&server, "/test.nc.dods", casts_body(&[(1, 5.0), (2, 20.5)])).await;

    let url = format!("{}/test.nc", server.uri());
    let dataset = RemoteDataset::open(&url, anonymous_client(&url).await)
        .await
        .unwrap();

    let variable = dataset.variable("casts.depth").unwrap();
    assert!(variable.as_array().is_none());
    let depth = variable.as_sequence().unwrap();

    let values: Vec<f64> = depth
        .rows()
        .await
        .unwrap()
        .iter()
        .filter_map(DapValue::as_f64)
        .collect();
    assert_eq!(values, vec![5.0, 20.5]);
    assert_eq!(queries(&server).await.last().unwrap(), "casts.depth&");
}

#[tokio::test]
async fn test_server_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/test.nc.dods"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let url = format!("{}/test.nc", server.uri());
    let proxy = ArrayProxy::new("temperature", url.clone(), vec![4], anonymous_client(&url).await);

    let error = proxy.values().await.unwrap_err();
    assert_eq!(error.to_string(), "404 Not Found");
    // One retry after re-authenticating
    assert_eq!(queries(&server).await.len(), 2);
}

#[tokio::test]
async fn test_shared_client_across_proxies() {
    let server = MockServer::start().await;
    mount(&server, "/test.nc.dods", float64_body("temperature", &[1.0])).await;

    let url = format!("{}/test.nc", server.uri());
    let client = anonymous_client(&url).await;
    let first = ArrayProxy::new("temperature", url.clone(), vec![4], client.clone());
    let second = first.slice(&[Index::At(3)]).unwrap();

    first.get_item(&[Index::At(0)]).await.unwrap();
    second.values().await.unwrap();

    assert_eq!(Arc::strong_count(&client), 3);
    assert_eq!(
        queries(&server).await,
        vec!["temperature[0:1:0]&", "temperature[3:1:3]&"]
    );
}
