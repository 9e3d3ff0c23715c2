//! Ordering of candidate endpoints by region preference.
//!
//! For a topology snapshot, a preferred-region order and an exclusion set,
//! this works out the full ordered list of endpoints a request may use:
//!
//! 1. Candidates are the writable regions for writes, readable otherwise.
//! 2. Single-write routing keeps account order. The first writable region is
//!    the primary and the rest are alternates reached by index only.
//! 3. Excluded region names are dropped. The match is exact, and names the
//!    topology does not know are ignored.
//! 4. Preferred regions come first in preference order, then every other
//!    candidate in account order.
//! 5. Duplicate URIs keep their first position. An empty result becomes the
//!    default endpoint alone.

use region_api::{AccountTopology, ExcludedRegions, RegionEndpoint, Uri};
use std::collections::HashSet;
use tracing::debug;

/// Stateless endpoint ordering
pub struct PreferenceResolver;

impl PreferenceResolver {
    /// Preferred-region order to use for a topology.
    ///
    /// A configured list is used as is. Without one, the region served by the
    /// default endpoint (if any) is promoted ahead of account order.
    pub fn effective_preferred_regions(
        topology: &AccountTopology,
        configured: &[String],
        for_write: bool,
    ) -> Vec<String> {
        if !configured.is_empty() {
            return configured.to_vec();
        }

        let candidates = topology.regions(for_write);
        let promoted = topology.default_region(for_write);

        promoted
            .into_iter()
            .chain(
                candidates
                    .iter()
                    .map(|r| r.region_name.as_str())
                    .filter(|name| Some(*name) != promoted),
            )
            .map(String::from)
            .collect()
    }

    /// Ordered candidate endpoints, using the account's multi-write capability
    pub fn compute_applicable(
        topology: &AccountTopology,
        preferred_regions: &[String],
        excluded: &ExcludedRegions,
        is_write: bool,
    ) -> Vec<Uri> {
        Self::compute_applicable_with(
            topology,
            preferred_regions,
            excluded,
            is_write,
            topology.supports_multiple_write_regions,
        )
    }

    /// Ordered candidate endpoints.
    ///
    /// `multi_write` says whether writes may use preference ordering. It is
    /// only consulted when `is_write` is set.
    pub fn compute_applicable_with(
        topology: &AccountTopology,
        preferred_regions: &[String],
        excluded: &ExcludedRegions,
        is_write: bool,
        multi_write: bool,
    ) -> Vec<Uri> {
        let remaining: Vec<&RegionEndpoint> = topology
            .regions(is_write)
            .iter()
            .filter(|region| !excluded.contains(&region.region_name))
            .collect();

        let ordered: Vec<&RegionEndpoint> = if is_write && !multi_write {
            remaining
        } else {
            order_by_preference(&remaining, preferred_regions)
        };

        let mut seen: HashSet<&Uri> = HashSet::with_capacity(ordered.len());
        let mut endpoints = Vec::with_capacity(ordered.len());
        for region in ordered {
            if seen.insert(&region.endpoint) {
                endpoints.push(region.endpoint.clone());
            }
        }

        if endpoints.is_empty() {
            debug!(
                is_write,
                excluded = excluded.len(),
                "No regional candidates left, falling back to default endpoint"
            );
            return vec![topology.default_endpoint.clone()];
        }

        endpoints
    }
}

fn order_by_preference<'a>(
    remaining: &[&'a RegionEndpoint],
    preferred_regions: &[String],
) -> Vec<&'a RegionEndpoint> {
    let mut ordered = Vec::with_capacity(remaining.len());

    for name in preferred_regions {
        if let Some(region) = remaining.iter().find(|r| r.region_name == *name) {
            ordered.push(*region);
        }
    }

    ordered.extend(
        remaining
            .iter()
            .filter(|r| !preferred_regions.contains(&r.region_name))
            .copied(),
    );

    ordered
}
