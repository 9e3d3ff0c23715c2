//! Prometheus metrics for endpoint routing

use anyhow::Result;
use prometheus::{Counter, CounterVec, Encoder, IntGaugeVec, Opts, Registry, TextEncoder};
use region_api::{AccountTopology, OperationClass};
use std::sync::Arc;

/// Routing metrics collector
#[derive(Clone)]
pub struct RoutingMetrics {
    /// Completed refreshes by outcome (success / failure)
    pub refresh_total: CounterVec,
    /// Topology fetches actually issued
    pub fetch_total: Counter,
    /// Endpoints marked unavailable by operation class
    pub endpoint_unavailable_total: CounterVec,
    /// Endpoint resolutions by operation class
    pub resolutions_total: CounterVec,
    /// Regions in the installed topology by role
    pub known_regions: IntGaugeVec,
    /// Registry the metrics are registered in
    pub registry: Arc<Registry>,
}

impl RoutingMetrics {
    /// Create a collector with its own registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Create a collector registered in an existing registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let refresh_total = CounterVec::new(
            Opts::new("region_topology_refresh_total", "Completed topology refreshes"),
            &["outcome"],
        )?;

        let fetch_total = Counter::new(
            "region_topology_fetch_total",
            "Topology fetches issued against the seed endpoint",
        )?;

        let endpoint_unavailable_total = CounterVec::new(
            Opts::new(
                "region_endpoint_unavailable_total",
                "Endpoints marked unavailable",
            ),
            &["operation"],
        )?;

        let resolutions_total = CounterVec::new(
            Opts::new("region_endpoint_resolutions_total", "Endpoint resolutions"),
            &["operation"],
        )?;

        let known_regions = IntGaugeVec::new(
            Opts::new("region_known_regions", "Regions in the current topology"),
            &["role"],
        )?;

        registry.register(Box::new(refresh_total.clone()))?;
        registry.register(Box::new(fetch_total.clone()))?;
        registry.register(Box::new(endpoint_unavailable_total.clone()))?;
        registry.register(Box::new(resolutions_total.clone()))?;
        registry.register(Box::new(known_regions.clone()))?;

        Ok(Self {
            refresh_total,
            fetch_total,
            endpoint_unavailable_total,
            resolutions_total,
            known_regions,
            registry,
        })
    }

    pub fn record_refresh(&self, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.refresh_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_unavailable(&self, class: OperationClass) {
        self.endpoint_unavailable_total
            .with_label_values(&[class.as_str()])
            .inc();
    }

    pub fn record_resolution(&self, class: OperationClass) {
        self.resolutions_total.with_label_values(&[class.as_str()]).inc();
    }

    pub fn record_topology(&self, topology: &AccountTopology) {
        self.known_regions
            .with_label_values(&["read"])
            .set(topology.readable_regions.len() as i64);
        self.known_regions
            .with_label_values(&["write"])
            .set(topology.writable_regions.len() as i64);
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl Default for RoutingMetrics {
    fn default() -> Self {
        Self::new().expect("Failed to create default RoutingMetrics")
    }
}
