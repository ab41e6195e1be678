//! Wires the balancer's single catch-all route: any method, any path, gets
//! selected against the registry and forwarded.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{forwarder, selector, LbState};
use std::sync::Arc;

pub fn build(state: Arc<LbState>) -> Router {
    Router::new()
        .fallback(forward_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn forward_handler(State(state): State<Arc<LbState>>, req: Request) -> Response {
    let index = selector::select(state.registry.origins());
    let origin = &state.registry.origins()[index];

    match forwarder::forward(&state.http_client, state.cli.scheme(), origin, state.cli.trace, req).await {
        Ok(response) => response,
        Err(error) => {
            tracing::warn!(origin = origin.address(), error = %error, "forward failed");
            (StatusCode::SERVICE_UNAVAILABLE, "upstream unavailable").into_response()
        }
    }
}
