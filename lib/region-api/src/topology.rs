//! Account topology: regions, their endpoints and read/write roles

use http::Uri;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A single region and the endpoint serving it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionEndpoint {
    /// Case-sensitive region name, unique within a topology
    pub region_name: String,

    /// Network endpoint for the region
    #[serde(with = "crate::uri_serde")]
    pub endpoint: Uri,

    /// Region accepts reads
    pub can_read: bool,

    /// Region accepts writes
    pub can_write: bool,
}

impl RegionEndpoint {
    /// Region that only serves reads
    pub fn readable(region_name: impl Into<String>, endpoint: Uri) -> Self {
        Self {
            region_name: region_name.into(),
            endpoint,
            can_read: true,
            can_write: false,
        }
    }

    /// Region that serves reads and writes
    pub fn writable(region_name: impl Into<String>, endpoint: Uri) -> Self {
        Self {
            region_name: region_name.into(),
            endpoint,
            can_read: true,
            can_write: true,
        }
    }
}

/// Immutable snapshot of the account's regional layout.
///
/// A topology is never edited in place. A refresh builds a new one and the
/// repository swaps it in as a whole.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountTopology {
    /// Regions serving reads, in the order the account reports them
    #[serde(default)]
    pub readable_regions: Vec<RegionEndpoint>,

    /// Regions serving writes, in the order the account reports them
    #[serde(default)]
    pub writable_regions: Vec<RegionEndpoint>,

    /// Account accepts writes in more than one region
    #[serde(default)]
    pub supports_multiple_write_regions: bool,

    /// Global endpoint, always a valid fallback
    #[serde(with = "crate::uri_serde")]
    pub default_endpoint: Uri,
}

impl AccountTopology {
    /// Topology with no regional information, used before the first refresh.
    /// Every resolution falls back to `default_endpoint`.
    pub fn bootstrap(default_endpoint: Uri) -> Self {
        Self {
            readable_regions: Vec::new(),
            writable_regions: Vec::new(),
            supports_multiple_write_regions: false,
            default_endpoint,
        }
    }

    /// Candidate regions for the given direction
    pub fn regions(&self, for_write: bool) -> &[RegionEndpoint] {
        if for_write {
            &self.writable_regions
        } else {
            &self.readable_regions
        }
    }

    /// Number of distinct endpoints serving reads or writes. Regions that
    /// share an endpoint count once.
    pub fn distinct_endpoint_count(&self, for_write: bool) -> usize {
        self.regions(for_write)
            .iter()
            .map(|r| &r.endpoint)
            .collect::<HashSet<&Uri>>()
            .len()
    }

    /// True when the topology has not been populated by a refresh yet
    pub fn is_bootstrap(&self) -> bool {
        self.readable_regions.is_empty() && self.writable_regions.is_empty()
    }

    /// Name of the region served by the default endpoint, if any
    pub fn default_region(&self, for_write: bool) -> Option<&str> {
        self.regions(for_write)
            .iter()
            .find(|r| r.endpoint == self.default_endpoint)
            .map(|r| r.region_name.as_str())
    }
}
