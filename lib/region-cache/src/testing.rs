//! Test fixtures shared by the routing tests

use crate::AccountTopologyFetcher;
use parking_lot::Mutex;
use region_api::{AccountTopology, RegionEndpoint, Uri};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Shape of a test account.
///
/// Regions are named `location1..=locationN` and served by
/// `https://locationN.example.net/`. All regions are readable; the first
/// `writable` of them are also writable.
#[derive(Clone, Copy, Debug)]
pub struct TestAccount {
    pub regions: usize,
    pub writable: usize,
    pub multi_write: bool,
}

impl TestAccount {
    pub const MULTI_WRITE: TestAccount = TestAccount {
        regions: 3,
        writable: 3,
        multi_write: true,
    };

    pub const SINGLE_WRITE: TestAccount = TestAccount {
        regions: 3,
        writable: 1,
        multi_write: false,
    };

    pub fn topology(&self) -> AccountTopology {
        let regions: Vec<RegionEndpoint> = (1..=self.regions)
            .map(|n| RegionEndpoint {
                region_name: region(n),
                endpoint: endpoint(n),
                can_read: true,
                can_write: n <= self.writable,
            })
            .collect();

        AccountTopology {
            writable_regions: regions.iter().filter(|r| r.can_write).cloned().collect(),
            readable_regions: regions,
            supports_multiple_write_regions: self.multi_write,
            default_endpoint: default_endpoint(),
        }
    }
}

pub fn region(n: usize) -> String {
    format!("location{}", n)
}

pub fn endpoint(n: usize) -> Uri {
    format!("https://location{}.example.net/", n)
        .parse()
        .expect("valid test endpoint")
}

pub fn default_endpoint() -> Uri {
    "https://global.example.net/".parse().expect("valid test endpoint")
}

/// Fetcher that counts invocations and can be told to fail
pub struct CountingFetcher {
    topology: Mutex<AccountTopology>,
    calls: AtomicUsize,
    failing: AtomicBool,
    delay: Duration,
}

impl CountingFetcher {
    pub fn new(topology: AccountTopology) -> Self {
        Self {
            topology: Mutex::new(topology),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_topology(&self, topology: AccountTopology) {
        *self.topology.lock() = topology;
    }
}

#[async_trait::async_trait]
impl AccountTopologyFetcher for CountingFetcher {
    async fn fetch(&self, _seed_endpoint: &Uri) -> anyhow::Result<AccountTopology> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("seed endpoint unreachable");
        }
        Ok(self.topology.lock().clone())
    }
}
