//! A fixed list of upstream origins, each carrying its own liveness flag and
//! cumulative forwarded-byte counter. Both fields are read on the hot
//! forwarding path and written off it (by the prober and the forwarder
//! respectively), so they are plain atomics rather than a lock: a read only
//! needs to observe *some* prior write, never a torn one, and concurrent
//! additions to the traffic counter must not be lost.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

/// The static pool the balancer was built to front. Dynamic backend
/// discovery is out of scope; this list is fixed for the life of the
/// process.
pub const ADDRESSES: &[&str] = &["server1:8080", "server2:8080", "server3:8080"];

#[derive(Debug)]
pub struct Origin {
    address: String,
    traffic_counter: AtomicU64,
    alive: AtomicBool,
}

impl Origin {
    pub(crate) fn new(address: impl Into<String>) -> Self {
        Origin {
            address: address.into(),
            traffic_counter: AtomicU64::new(0),
            // Optimistically alive until the first probe cycle runs, so a
            // freshly started balancer can serve immediately rather than
            // waiting out a full probe period.
            alive: AtomicBool::new(true),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn traffic(&self) -> u64 {
        self.traffic_counter.load(Ordering::Relaxed)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Relaxed);
    }

    /// Adds `bytes` to the traffic counter. Never decrements.
    pub fn add_traffic(&self, bytes: u64) {
        self.traffic_counter.fetch_add(bytes, Ordering::Relaxed);
    }
}

/// The registry of origins the balancer was started with. Origins are
/// `Arc`-wrapped so the prober and forwarder tasks can each hold their own
/// handle without borrowing from the registry itself.
#[derive(Debug)]
pub struct Registry {
    origins: Vec<Arc<Origin>>,
}

impl Registry {
    pub fn from_addresses(addresses: &[&str]) -> Self {
        Registry {
            origins: addresses.iter().map(|a| Arc::new(Origin::new(*a))).collect(),
        }
    }

    pub fn origins(&self) -> &[Arc<Origin>] {
        &self.origins
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::from_addresses(ADDRESSES)
    }
}
