//! End-to-end exercise of the forwarding path (scenario S2): ten sequential
//! requests against a freshly started balancer, all counters at zero, must
//! all land on the same (first-listed) backend.

use std::sync::Arc;

use axum::{body::Body, http::Request, routing::get, Router};
use lb::{config::Cli, origin::Registry, router, LbState};
use tokio::net::TcpListener;
use tower::ServiceExt;

async fn spawn_fake_backend(name: &'static str) -> String {
    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/some-data", get(move || async move { format!("served-by-{name}") }));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr.to_string()
}

fn test_state(addresses: &[&str], trace: bool) -> Arc<LbState> {
    let cli = Cli {
        port: 0,
        timeout_sec: 3,
        https: false,
        trace,
    };
    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(cli.timeout_sec))
        .build()
        .unwrap();
    Arc::new(LbState {
        registry: Arc::new(Registry::from_addresses(addresses)),
        http_client,
        cli,
    })
}

#[tokio::test]
async fn ten_sequential_requests_stick_to_first_backend() {
    cmd_util::init_test_logging();
    let a = spawn_fake_backend("A").await;
    let b = spawn_fake_backend("B").await;
    let c = spawn_fake_backend("C").await;

    let addresses = [a.as_str(), b.as_str(), c.as_str()];
    let state = test_state(&addresses, true);
    let app = router::build(Arc::clone(&state));

    for _ in 0..10 {
        let request = Request::builder()
            .uri("/api/v1/some-data")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), 200);
        let served_by = response
            .headers()
            .get("lb-from")
            .expect("trace enabled, lb-from header must be present")
            .to_str()
            .unwrap()
            .to_string();
        assert_eq!(served_by, a, "every request in this run must land on the first backend");
    }

    assert!(state.registry.origins()[0].traffic() > 0);
    assert_eq!(state.registry.origins()[1].traffic(), 0);
    assert_eq!(state.registry.origins()[2].traffic(), 0);
}

#[tokio::test]
async fn unreachable_backend_yields_503() {
    cmd_util::init_test_logging();
    // Nothing is listening on this address.
    let addresses = ["127.0.0.1:1"];
    let state = test_state(&addresses, false);
    let app = router::build(state);

    let request = Request::builder().uri("/anything").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), 503);
}
