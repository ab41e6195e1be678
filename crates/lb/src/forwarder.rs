//! The Forwarder: turns an inbound request into an outbound one against a
//! chosen origin, streams the response back downstream, and tallies every
//! response byte against that origin's traffic counter as it passes through.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::Request,
    http::{header::HOST, StatusCode},
    response::{IntoResponse, Response},
};
use futures::StreamExt;

use crate::origin::Origin;

const LB_FROM_HEADER: &str = "lb-from";

/// Clones the inbound request against `origin`, executes it, and returns a
/// streamed response. Bytes are counted as they are read off the upstream
/// response stream, mirroring the copy-and-count behavior of a direct
/// `io.Copy` to the client.
pub async fn forward(
    client: &reqwest::Client,
    scheme: &str,
    origin: &Arc<Origin>,
    trace: bool,
    req: Request,
) -> anyhow::Result<Response> {
    let method = req.method().clone();
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
        .to_string();
    let url = format!("{scheme}://{}{path_and_query}", origin.address());

    let mut headers = req.headers().clone();
    headers.remove(HOST);
    let body = axum::body::to_bytes(req.into_body(), usize::MAX).await?;

    let outbound = client.request(method, url).headers(headers).body(body).build()?;
    let upstream = client.execute(outbound).await?;

    let status = StatusCode::from_u16(upstream.status().as_u16())?;
    let response_headers = upstream.headers().clone();

    let counting_origin = Arc::clone(origin);
    let byte_stream = upstream.bytes_stream().map(move |chunk| {
        if let Ok(bytes) = &chunk {
            counting_origin.add_traffic(bytes.len() as u64);
        }
        chunk
    });

    let mut builder = Response::builder().status(status);
    if let Some(response_builder_headers) = builder.headers_mut() {
        *response_builder_headers = response_headers;
    }
    if trace {
        builder = builder.header(LB_FROM_HEADER, origin.address());
    }

    let response = builder.body(Body::from_stream(byte_stream))?;
    Ok(response.into_response())
}
