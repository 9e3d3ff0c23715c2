//! Repository holding the current account topology snapshot

use arc_swap::ArcSwap;
use region_api::{AccountTopology, Uri};
use std::sync::Arc;
use tracing::{debug, info};

/// EndpointRepository holds the topology every resolution reads from.
///
/// Readers take a cheap `Arc` snapshot and never block. A refresh replaces the
/// whole topology in one atomic swap, so a reader sees either the old or the
/// new snapshot and never a mix of both.
pub struct EndpointRepository {
    topology: ArcSwap<AccountTopology>,
}

impl EndpointRepository {
    /// Start from an empty topology that only knows the default endpoint
    pub fn bootstrap(default_endpoint: Uri) -> Self {
        Self::new(AccountTopology::bootstrap(default_endpoint))
    }

    pub fn new(topology: AccountTopology) -> Self {
        Self {
            topology: ArcSwap::from_pointee(topology),
        }
    }

    /// Current topology snapshot
    pub fn snapshot(&self) -> Arc<AccountTopology> {
        self.topology.load_full()
    }

    /// Install a new topology, returning the one it replaced
    pub fn replace(&self, topology: impl Into<Arc<AccountTopology>>) -> Arc<AccountTopology> {
        let next: Arc<AccountTopology> = topology.into();
        let previous = self.topology.swap(next.clone());

        if *previous == *next {
            debug!("Account topology refreshed without changes");
        } else {
            info!(
                readable = next.readable_regions.len(),
                writable = next.writable_regions.len(),
                multi_write = next.supports_multiple_write_regions,
                "Account topology replaced"
            );
        }
        previous
    }

    /// Default endpoint of the current snapshot
    pub fn default_endpoint(&self) -> Uri {
        self.topology.load().default_endpoint.clone()
    }
}
