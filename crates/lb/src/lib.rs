//! Traffic-balanced HTTP forwarder: fronts a fixed pool of backend origins,
//! health-probes them on a fixed period, and routes each inbound request to
//! the alive origin with the smallest cumulative forwarded-byte count.

pub mod config;
pub mod forwarder;
pub mod origin;
pub mod prober;
pub mod router;
pub mod selector;

use std::{sync::Arc, time::Duration};

use axum::Router;
use config::Cli;
use origin::Registry;

/// Shared state handed to every request handler.
pub struct LbState {
    pub registry: Arc<Registry>,
    pub http_client: reqwest::Client,
    pub cli: Cli,
}

impl LbState {
    pub fn new(cli: Cli) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(cli.timeout_sec);
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(LbState {
            registry: Arc::new(Registry::default()),
            http_client,
            cli,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.cli.timeout_sec)
    }
}

/// Builds the axum app and spawns the per-origin health probers. Returns the
/// router; the caller is responsible for binding a listener and serving it.
pub fn make_app(state: Arc<LbState>) -> Router {
    prober::spawn_all(
        Arc::clone(&state.registry),
        state.http_client.clone(),
        state.cli.scheme(),
        state.timeout(),
    );
    router::build(state)
}
