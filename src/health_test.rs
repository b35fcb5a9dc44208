use anyhow::Result;
use axum::http::StatusCode;
use axum::{routing::get, Router};

use crate::health::probe_endpoint;

/// Serve a health endpoint pair on an ephemeral port, returning the bound address.
fn spawn_test_member() -> Result<std::net::SocketAddr> {
    let app = Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .route("/broken", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
    let server = axum::Server::bind(&"127.0.0.1:0".parse()?).serve(app.into_make_service());
    let addr = server.local_addr();
    tokio::spawn(server);
    Ok(addr)
}

#[tokio::test]
async fn probe_classifies_success_and_failure_statuses() -> Result<()> {
    let addr = spawn_test_member()?;
    let http = reqwest::Client::new();

    assert!(probe_endpoint(&http, &format!("http://{}/health", addr)).await, "expected a 200 health endpoint to be healthy");
    assert!(!probe_endpoint(&http, &format!("http://{}/broken", addr)).await, "expected a 500 health endpoint to be unhealthy");
    Ok(())
}

#[tokio::test]
async fn probe_classifies_unreachable_members_as_unhealthy() {
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_millis(250))
        .build()
        .unwrap();
    // Nothing listens on this port.
    assert!(!probe_endpoint(&http, "http://127.0.0.1:39999/health").await, "expected an unreachable member to be unhealthy");
}
