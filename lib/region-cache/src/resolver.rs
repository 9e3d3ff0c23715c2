//! Per-request endpoint resolution

use crate::refresh::RefreshResult;
use crate::{AccountTopologyFetcher, RefreshCoordinator, RoutingMetrics};
use region_api::{
    uri_serde, AccountTopology, ExcludedRegions, OperationClass, RoutingRequest, Uri,
};
use region_core::{
    Clock, CoreError, EndpointRepository, ExcludedRegionsSource, PreferenceResolver, RoutingConfig,
    StaticExcludedRegions, SystemClock, UnavailabilityTracker,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Whether the topology should be refreshed, and whether traffic can keep
/// flowing while it is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshDecision {
    pub needs_refresh: bool,
    pub can_refresh_in_background: bool,
}

impl RefreshDecision {
    const NOT_NEEDED: RefreshDecision = RefreshDecision {
        needs_refresh: false,
        can_refresh_in_background: true,
    };

    /// `known_endpoints` counts the topology's endpoints for the affected
    /// class, whatever the client currently excludes.
    fn needed(known_endpoints: usize) -> Self {
        Self {
            needs_refresh: true,
            can_refresh_in_background: known_endpoints > 1,
        }
    }
}

/// Ordered endpoint lists as they stand right now
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingState {
    #[serde(with = "uri_serde::seq")]
    pub read_endpoints: Vec<Uri>,
    #[serde(with = "uri_serde::seq")]
    pub write_endpoints: Vec<Uri>,
    #[serde(with = "uri_serde::seq")]
    pub unavailable_for_read: Vec<Uri>,
    #[serde(with = "uri_serde::seq")]
    pub unavailable_for_write: Vec<Uri>,
    pub supports_multiple_write_regions: bool,
    #[serde(with = "uri_serde")]
    pub default_endpoint: Uri,
}

/// RoutingResolver picks the endpoint for each request.
///
/// Every call works on whatever topology snapshot is installed at that
/// moment and never waits for a refresh. Exclusions and unavailability are
/// read fresh on each call.
pub struct RoutingResolver {
    config: RoutingConfig,
    repository: Arc<EndpointRepository>,
    tracker: UnavailabilityTracker,
    exclusions: Arc<dyn ExcludedRegionsSource>,
    clock: Arc<dyn Clock>,
    refresher: Arc<RefreshCoordinator>,
    metrics: RoutingMetrics,
}

/// Builder for [`RoutingResolver`]
pub struct RoutingResolverBuilder {
    config: RoutingConfig,
    fetcher: Arc<dyn AccountTopologyFetcher>,
    exclusions: Option<Arc<dyn ExcludedRegionsSource>>,
    clock: Option<Arc<dyn Clock>>,
    metrics: Option<RoutingMetrics>,
    initial_topology: Option<AccountTopology>,
}

impl RoutingResolverBuilder {
    /// Client-level exclusion source. Defaults to the config's fixed list.
    pub fn excluded_regions_source(mut self, source: Arc<dyn ExcludedRegionsSource>) -> Self {
        self.exclusions = Some(source);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn metrics(mut self, metrics: RoutingMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Topology to start from instead of the empty bootstrap one
    pub fn initial_topology(mut self, topology: AccountTopology) -> Self {
        self.initial_topology = Some(topology);
        self
    }

    pub fn build(self) -> Result<RoutingResolver, CoreError> {
        self.config.validate()?;

        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => RoutingMetrics::new().map_err(|e| {
                CoreError::InvalidConfiguration(format!("metrics registration failed: {}", e))
            })?,
        };

        let topology = self
            .initial_topology
            .unwrap_or_else(|| AccountTopology::bootstrap(self.config.default_endpoint.clone()));
        metrics.record_topology(&topology);
        let repository = Arc::new(EndpointRepository::new(topology));

        let refresher = Arc::new(RefreshCoordinator::new(
            repository.clone(),
            self.fetcher,
            self.config.default_endpoint.clone(),
            metrics.clone(),
        ));

        let exclusions = self.exclusions.unwrap_or_else(|| {
            Arc::new(StaticExcludedRegions::new(self.config.initial_excluded_regions()))
                as Arc<dyn ExcludedRegionsSource>
        });

        Ok(RoutingResolver {
            tracker: UnavailabilityTracker::new(self.config.unavailability_ttl()),
            config: self.config,
            repository,
            exclusions,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>),
            refresher,
            metrics,
        })
    }
}

impl RoutingResolver {
    pub fn builder(config: RoutingConfig, fetcher: Arc<dyn AccountTopologyFetcher>) -> RoutingResolverBuilder {
        RoutingResolverBuilder {
            config,
            fetcher,
            exclusions: None,
            clock: None,
            metrics: None,
            initial_topology: None,
        }
    }

    /// Endpoint to send `request` to
    pub fn resolve_service_endpoint(&self, request: &RoutingRequest) -> Uri {
        if !self.config.enable_endpoint_discovery {
            return self.config.default_endpoint.clone();
        }

        let class = request.class();
        self.metrics.record_resolution(class);

        let endpoints = self.applicable_endpoints(request);
        let index = match class {
            OperationClass::Read => 0,
            OperationClass::Write => request.routing_index_hint.min(endpoints.len().saturating_sub(1)),
        };

        let endpoint = endpoints
            .into_iter()
            .nth(index)
            .unwrap_or_else(|| self.repository.default_endpoint());
        debug!(
            endpoint = %endpoint,
            operation = class.as_str(),
            index,
            "Resolved service endpoint"
        );
        endpoint
    }

    /// Ordered read endpoints for `request`, available ones first
    pub fn applicable_read_endpoints(&self, request: &RoutingRequest) -> Vec<Uri> {
        let topology = self.repository.snapshot();
        self.ordered_endpoints(&topology, OperationClass::Read, request, self.clock.now())
    }

    /// Ordered write endpoints for `request`
    pub fn applicable_write_endpoints(&self, request: &RoutingRequest) -> Vec<Uri> {
        let topology = self.repository.snapshot();
        self.ordered_endpoints(&topology, OperationClass::Write, request, self.clock.now())
    }

    /// Ordered endpoints for the request's own operation class
    pub fn applicable_endpoints(&self, request: &RoutingRequest) -> Vec<Uri> {
        match request.class() {
            OperationClass::Read => self.applicable_read_endpoints(request),
            OperationClass::Write => self.applicable_write_endpoints(request),
        }
    }

    pub fn mark_endpoint_unavailable_for_read(&self, endpoint: &Uri) {
        self.mark_unavailable(endpoint, OperationClass::Read);
    }

    pub fn mark_endpoint_unavailable_for_write(&self, endpoint: &Uri) {
        self.mark_unavailable(endpoint, OperationClass::Write);
    }

    fn mark_unavailable(&self, endpoint: &Uri, class: OperationClass) {
        self.tracker.mark_unavailable(endpoint, class, self.clock.now());
        self.metrics.record_unavailable(class);
    }

    /// Report whether the topology needs refreshing.
    ///
    /// A refresh is needed when the most preferred read endpoint is
    /// unavailable, or, for single-write routing, when the primary write
    /// endpoint is. Multi-write accounts can keep writing elsewhere, so their
    /// top write preference alone never forces a refresh.
    pub fn should_refresh_endpoints(&self) -> RefreshDecision {
        if !self.config.enable_endpoint_discovery {
            return RefreshDecision::NOT_NEEDED;
        }

        let topology = self.repository.snapshot();
        let now = self.clock.now();
        let request_exclusions = ExcludedRegions::none();

        let reads = self.preference_order(&topology, OperationClass::Read, &request_exclusions, false);
        if let Some(top) = reads.first() {
            if !self.tracker.is_available(top, OperationClass::Read, now) {
                debug!(endpoint = %top, "Most preferred read endpoint unavailable, refresh needed");
                return RefreshDecision::needed(topology.distinct_endpoint_count(false));
            }
        }

        if !self.multi_write_enabled(&topology, false) {
            let writes =
                self.preference_order(&topology, OperationClass::Write, &request_exclusions, false);
            if let Some(top) = writes.first() {
                if !self.tracker.is_available(top, OperationClass::Write, now) {
                    debug!(endpoint = %top, "Primary write endpoint unavailable, refresh needed");
                    return RefreshDecision::needed(topology.distinct_endpoint_count(true));
                }
            }
        }

        RefreshDecision::NOT_NEEDED
    }

    /// Fetch a new topology, sharing any fetch already in flight
    pub async fn refresh_topology(&self) -> RefreshResult {
        self.refresher.refresh_topology().await
    }

    /// Current endpoint lists for diagnostics
    pub fn routing_state(&self) -> RoutingState {
        let topology = self.repository.snapshot();
        let now = self.clock.now();
        let request = RoutingRequest::read();

        RoutingState {
            read_endpoints: self.ordered_endpoints(&topology, OperationClass::Read, &request, now),
            write_endpoints: self.ordered_endpoints(&topology, OperationClass::Write, &request, now),
            unavailable_for_read: self.tracker.unavailable_endpoints(OperationClass::Read, now),
            unavailable_for_write: self.tracker.unavailable_endpoints(OperationClass::Write, now),
            supports_multiple_write_regions: topology.supports_multiple_write_regions,
            default_endpoint: topology.default_endpoint.clone(),
        }
    }

    pub fn topology(&self) -> Arc<AccountTopology> {
        self.repository.snapshot()
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub fn metrics(&self) -> &RoutingMetrics {
        &self.metrics
    }

    pub fn refresher(&self) -> Arc<RefreshCoordinator> {
        self.refresher.clone()
    }

    /// Multi-write routing applies only when the client opts in, the account
    /// supports it, and the request is not for account metadata.
    fn multi_write_enabled(&self, topology: &AccountTopology, is_master_resource: bool) -> bool {
        self.config.use_multiple_write_locations
            && topology.supports_multiple_write_regions
            && !is_master_resource
    }

    /// Candidates in preference order, before availability is considered
    fn preference_order(
        &self,
        topology: &AccountTopology,
        class: OperationClass,
        request_exclusions: &ExcludedRegions,
        is_master_resource: bool,
    ) -> Vec<Uri> {
        let is_write = class.is_write();
        let excluded = self.exclusions.excluded_regions().union(request_exclusions);
        let preferred = PreferenceResolver::effective_preferred_regions(
            topology,
            &self.config.preferred_regions,
            is_write,
        );

        PreferenceResolver::compute_applicable_with(
            topology,
            &preferred,
            &excluded,
            is_write,
            self.multi_write_enabled(topology, is_master_resource),
        )
    }

    fn ordered_endpoints(
        &self,
        topology: &AccountTopology,
        class: OperationClass,
        request: &RoutingRequest,
        now: Instant,
    ) -> Vec<Uri> {
        let endpoints = self.preference_order(
            topology,
            class,
            &request.excluded_regions,
            request.is_master_resource,
        );

        // Single-write failover goes through the routing index, not reordering.
        if class.is_write() && !self.multi_write_enabled(topology, request.is_master_resource) {
            return endpoints;
        }

        self.tracker.partition_by_availability(endpoints, class, now)
    }
}
