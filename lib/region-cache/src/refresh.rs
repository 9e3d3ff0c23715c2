//! De-duplicated topology refresh.
//!
//! At most one fetch against the seed endpoint is outstanding at a time.
//! A caller arriving while a fetch is in flight subscribes to that fetch's
//! outcome instead of issuing another. The fetch runs on its own task, so it
//! completes and installs its result even if every waiter goes away.

use crate::{RefreshError, RoutingMetrics};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use region_api::{AccountTopology, Uri};
use region_core::EndpointRepository;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Fetches the account topology from the seed endpoint.
///
/// Timeouts and cancellation of the underlying call are the fetcher's
/// business; the coordinator only sees success or failure.
#[async_trait::async_trait]
pub trait AccountTopologyFetcher: Send + Sync {
    async fn fetch(&self, seed_endpoint: &Uri) -> anyhow::Result<AccountTopology>;
}

pub type RefreshResult = Result<Arc<AccountTopology>, RefreshError>;

type SharedRefresh = Shared<BoxFuture<'static, RefreshResult>>;

struct InFlight {
    id: u64,
    outcome: SharedRefresh,
}

type InFlightSlot = Arc<Mutex<Option<InFlight>>>;

/// Clears the in-flight slot when the fetch task ends, including on panic.
struct InFlightGuard {
    id: u64,
    slot: InFlightSlot,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut slot = self.slot.lock();
        if slot.as_ref().map(|f| f.id) == Some(self.id) {
            *slot = None;
        }
    }
}

/// Coordinates topology refreshes for one account
pub struct RefreshCoordinator {
    repository: Arc<EndpointRepository>,
    fetcher: Arc<dyn AccountTopologyFetcher>,
    seed_endpoint: Uri,
    in_flight: InFlightSlot,
    next_id: AtomicU64,
    metrics: RoutingMetrics,
}

impl RefreshCoordinator {
    pub fn new(
        repository: Arc<EndpointRepository>,
        fetcher: Arc<dyn AccountTopologyFetcher>,
        seed_endpoint: Uri,
        metrics: RoutingMetrics,
    ) -> Self {
        Self {
            repository,
            fetcher,
            seed_endpoint,
            in_flight: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
            metrics,
        }
    }

    /// Refresh the topology, joining the in-flight fetch if there is one.
    ///
    /// On success the new snapshot is already installed when this returns.
    /// On failure the previous snapshot stays authoritative. Must be called
    /// from within a tokio runtime.
    pub async fn refresh_topology(&self) -> RefreshResult {
        self.join_or_start().await
    }

    /// True while a fetch is outstanding
    pub fn is_refreshing(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    /// Refresh on a fixed schedule until the returned task is aborted.
    /// The first refresh starts immediately.
    pub fn spawn_periodic(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.refresh_topology().await {
                    warn!("Scheduled topology refresh failed: {}", e);
                }
            }
        })
    }

    fn join_or_start(&self) -> SharedRefresh {
        let mut slot = self.in_flight.lock();
        if let Some(in_flight) = slot.as_ref() {
            debug!(refresh_id = in_flight.id, "Joining in-flight topology refresh");
            return in_flight.outcome.clone();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let guard = InFlightGuard {
            id,
            slot: self.in_flight.clone(),
        };
        let task = tokio::spawn(fetch_and_install(
            guard,
            self.repository.clone(),
            self.fetcher.clone(),
            self.seed_endpoint.clone(),
            self.metrics.clone(),
        ));

        let outcome = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(RefreshError::Aborted(e.to_string())),
            }
        }
        .boxed()
        .shared();

        *slot = Some(InFlight {
            id,
            outcome: outcome.clone(),
        });
        outcome
    }
}

async fn fetch_and_install(
    guard: InFlightGuard,
    repository: Arc<EndpointRepository>,
    fetcher: Arc<dyn AccountTopologyFetcher>,
    seed_endpoint: Uri,
    metrics: RoutingMetrics,
) -> RefreshResult {
    debug!(refresh_id = guard.id, seed = %seed_endpoint, "Fetching account topology");
    metrics.fetch_total.inc();

    let result = match fetcher.fetch(&seed_endpoint).await {
        Ok(topology) => {
            let topology = Arc::new(topology);
            repository.replace(topology.clone());
            metrics.record_refresh(true);
            metrics.record_topology(&topology);
            info!(
                refresh_id = guard.id,
                readable = topology.readable_regions.len(),
                writable = topology.writable_regions.len(),
                "Account topology refreshed"
            );
            Ok(topology)
        }
        Err(e) => {
            metrics.record_refresh(false);
            warn!(
                refresh_id = guard.id,
                seed = %seed_endpoint,
                "Account topology fetch failed, keeping previous snapshot: {:#}",
                e
            );
            Err(RefreshError::FetchFailed(Arc::new(e)))
        }
    };

    // Waiters must see the slot cleared once they observe the outcome.
    drop(guard);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{default_endpoint, CountingFetcher, TestAccount};
    use futures::future::join_all;

    fn coordinator(fetcher: Arc<CountingFetcher>) -> (Arc<RefreshCoordinator>, Arc<EndpointRepository>) {
        let repository = Arc::new(EndpointRepository::bootstrap(default_endpoint()));
        let coordinator = RefreshCoordinator::new(
            repository.clone(),
            fetcher,
            default_endpoint(),
            RoutingMetrics::new().expect("Failed to create metrics"),
        );
        (Arc::new(coordinator), repository)
    }

    #[tokio::test]
    async fn test_refresh_installs_topology() {
        let fetcher = Arc::new(CountingFetcher::new(TestAccount::MULTI_WRITE.topology()));
        let (coordinator, repository) = coordinator(fetcher.clone());

        let topology = coordinator.refresh_topology().await.expect("refresh failed");
        assert_eq!(*topology, TestAccount::MULTI_WRITE.topology());
        assert_eq!(*repository.snapshot(), TestAccount::MULTI_WRITE.topology());
        assert_eq!(fetcher.calls(), 1);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_share_one_fetch() {
        let fetcher = Arc::new(
            CountingFetcher::new(TestAccount::MULTI_WRITE.topology())
                .with_delay(Duration::from_millis(50)),
        );
        let (coordinator, _repository) = coordinator(fetcher.clone());

        let results = join_all((0..10).map(|_| coordinator.refresh_topology())).await;

        assert_eq!(fetcher.calls(), 1);
        assert!(results.iter().all(|r| r.is_ok()));
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_across_tasks_share_one_fetch() {
        let fetcher = Arc::new(
            CountingFetcher::new(TestAccount::MULTI_WRITE.topology())
                .with_delay(Duration::from_millis(50)),
        );
        let (coordinator, _repository) = coordinator(fetcher.clone());

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.refresh_topology().await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.expect("task panicked").is_ok());
        }

        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_sequential_refreshes_fetch_again() {
        let fetcher = Arc::new(CountingFetcher::new(TestAccount::MULTI_WRITE.topology()));
        let (coordinator, _repository) = coordinator(fetcher.clone());

        coordinator.refresh_topology().await.expect("first refresh failed");
        coordinator.refresh_topology().await.expect("second refresh failed");
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_snapshot_and_reaches_all_waiters() {
        let fetcher = Arc::new(
            CountingFetcher::new(TestAccount::MULTI_WRITE.topology())
                .with_delay(Duration::from_millis(20)),
        );
        let (coordinator, repository) = coordinator(fetcher.clone());
        coordinator.refresh_topology().await.expect("initial refresh failed");

        fetcher.set_topology(TestAccount::SINGLE_WRITE.topology());
        fetcher.set_failing(true);
        let results = join_all((0..5).map(|_| coordinator.refresh_topology())).await;

        assert!(results
            .iter()
            .all(|r| matches!(r, Err(RefreshError::FetchFailed(_)))));
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(*repository.snapshot(), TestAccount::MULTI_WRITE.topology());
        assert!(!coordinator.is_refreshing());

        fetcher.set_failing(false);
        coordinator.refresh_topology().await.expect("recovery refresh failed");
        assert_eq!(fetcher.calls(), 3);
        assert_eq!(*repository.snapshot(), TestAccount::SINGLE_WRITE.topology());
    }

    #[tokio::test]
    async fn test_fetch_completes_when_waiter_is_dropped() {
        let fetcher = Arc::new(
            CountingFetcher::new(TestAccount::MULTI_WRITE.topology())
                .with_delay(Duration::from_millis(30)),
        );
        let (coordinator, repository) = coordinator(fetcher.clone());

        let abandoned = tokio::time::timeout(Duration::from_millis(5), coordinator.refresh_topology()).await;
        assert!(abandoned.is_err());
        assert!(coordinator.is_refreshing());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!coordinator.is_refreshing());
        assert_eq!(*repository.snapshot(), TestAccount::MULTI_WRITE.topology());
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_periodic_refresh() {
        let fetcher = Arc::new(CountingFetcher::new(TestAccount::MULTI_WRITE.topology()));
        let (coordinator, repository) = coordinator(fetcher.clone());

        let handle = coordinator.clone().spawn_periodic(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(90)).await;
        handle.abort();

        assert!(fetcher.calls() >= 2);
        assert!(!repository.snapshot().is_bootstrap());
    }
}
