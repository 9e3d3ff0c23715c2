//! Client-level excluded region sources

use arc_swap::ArcSwap;
use region_api::ExcludedRegions;
use std::sync::Arc;
use tracing::info;

/// Supplies the client-level exclusion set.
///
/// Called on every resolution, so implementations must be cheap and must
/// return the current value rather than a cached copy.
pub trait ExcludedRegionsSource: Send + Sync {
    fn excluded_regions(&self) -> ExcludedRegions;
}

/// Fixed exclusion set
#[derive(Clone, Debug, Default)]
pub struct StaticExcludedRegions(ExcludedRegions);

impl StaticExcludedRegions {
    pub fn new(regions: ExcludedRegions) -> Self {
        Self(regions)
    }
}

impl ExcludedRegionsSource for StaticExcludedRegions {
    fn excluded_regions(&self) -> ExcludedRegions {
        self.0.clone()
    }
}

/// Exclusion set that can be replaced at runtime
#[derive(Debug)]
pub struct SharedExcludedRegions {
    current: ArcSwap<ExcludedRegions>,
}

impl SharedExcludedRegions {
    pub fn new(initial: ExcludedRegions) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    /// Replace the exclusion set; the next resolution sees the new value
    pub fn set(&self, regions: ExcludedRegions) {
        info!(
            excluded = ?regions.iter().collect::<Vec<_>>(),
            "Client-level excluded regions updated"
        );
        self.current.store(Arc::new(regions));
    }
}

impl Default for SharedExcludedRegions {
    fn default() -> Self {
        Self::new(ExcludedRegions::none())
    }
}

impl ExcludedRegionsSource for SharedExcludedRegions {
    fn excluded_regions(&self) -> ExcludedRegions {
        ExcludedRegions::clone(&self.current.load())
    }
}
