//! The Health Prober: one independent task per origin, probing on a fixed
//! period and writing the verdict straight into the origin's liveness flag.
//! A probe failure on one origin never touches another's task, and probe
//! writes never block a concurrent forward (the flag is a plain atomic
//! store).

use std::{sync::Arc, time::Duration};

use tracing::debug;

use crate::origin::Registry;

const PROBE_PERIOD: Duration = Duration::from_secs(10);

/// Spawns one probe task per origin in `registry`. Each task runs until the
/// process exits; there is no cancellation handle because the balancer has
/// no notion of removing an origin at runtime.
pub fn spawn_all(registry: Arc<Registry>, client: reqwest::Client, scheme: &'static str, timeout: Duration) {
    for index in 0..registry.origins().len() {
        let registry = Arc::clone(&registry);
        let client = client.clone();
        tokio::spawn(async move {
            probe_loop(registry, index, client, scheme, timeout).await;
        });
    }
}

async fn probe_loop(registry: Arc<Registry>, index: usize, client: reqwest::Client, scheme: &'static str, timeout: Duration) {
    let mut interval = tokio::time::interval(PROBE_PERIOD);
    loop {
        interval.tick().await;
        let address = registry.origins()[index].address().to_string();
        let verdict = probe_once(&client, scheme, &address, timeout).await;
        registry.origins()[index].set_alive(verdict);
        debug!(origin = %address, alive = verdict, "health probe");
    }
}

async fn probe_once(client: &reqwest::Client, scheme: &str, address: &str, timeout: Duration) -> bool {
    let url = format!("{scheme}://{address}/health");
    match tokio::time::timeout(timeout, client.get(&url).send()).await {
        Ok(Ok(response)) => response.status() == reqwest::StatusCode::OK,
        _ => false,
    }
}
