//! Account metadata document returned by the seed endpoint

use crate::topology::{AccountTopology, RegionEndpoint};
use crate::uri_serde::parse_endpoint;
use http::Uri;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Region '{region}' has an invalid endpoint: {reason}")]
    InvalidEndpoint { region: String, reason: String },

    #[error("Region '{0}' is listed more than once")]
    DuplicateRegion(String),

    #[error("Region has an empty name")]
    EmptyRegionName,
}

/// A location entry in the account metadata
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountLocation {
    /// Region name
    pub name: String,

    /// Endpoint serving the region
    pub database_account_endpoint: String,
}

/// Account metadata as served by the global endpoint
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProperties {
    /// Account identifier, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Regions accepting writes, in account order
    #[serde(default)]
    pub writable_locations: Vec<AccountLocation>,

    /// Regions serving reads, in account order
    #[serde(default)]
    pub readable_locations: Vec<AccountLocation>,

    /// Multi-region writes enabled for the account
    #[serde(default)]
    pub enable_multiple_write_locations: bool,
}

impl AccountProperties {
    /// Convert the metadata into a topology snapshot.
    ///
    /// A region present in both lists is marked readable and writable in
    /// each. `default_endpoint` is the seed endpoint the metadata came from.
    pub fn into_topology(self, default_endpoint: Uri) -> Result<AccountTopology, MetadataError> {
        let writable = parse_locations(&self.writable_locations)?;
        let readable = parse_locations(&self.readable_locations)?;

        let is_writable = |name: &str| writable.iter().any(|(n, _)| n == name);
        let is_readable = |name: &str| readable.iter().any(|(n, _)| n == name);

        let readable_regions = readable
            .iter()
            .map(|(name, endpoint)| RegionEndpoint {
                region_name: name.clone(),
                endpoint: endpoint.clone(),
                can_read: true,
                can_write: is_writable(name),
            })
            .collect();

        let writable_regions = writable
            .iter()
            .map(|(name, endpoint)| RegionEndpoint {
                region_name: name.clone(),
                endpoint: endpoint.clone(),
                can_read: is_readable(name),
                can_write: true,
            })
            .collect();

        Ok(AccountTopology {
            readable_regions,
            writable_regions,
            supports_multiple_write_regions: self.enable_multiple_write_locations,
            default_endpoint,
        })
    }
}

fn parse_locations(locations: &[AccountLocation]) -> Result<Vec<(String, Uri)>, MetadataError> {
    let mut parsed: Vec<(String, Uri)> = Vec::with_capacity(locations.len());
    for location in locations {
        if location.name.is_empty() {
            return Err(MetadataError::EmptyRegionName);
        }
        if parsed.iter().any(|(name, _)| *name == location.name) {
            return Err(MetadataError::DuplicateRegion(location.name.clone()));
        }
        let endpoint = parse_endpoint(&location.database_account_endpoint).map_err(|reason| {
            MetadataError::InvalidEndpoint {
                region: location.name.clone(),
                reason,
            }
        })?;
        parsed.push((location.name.clone(), endpoint));
    }
    Ok(parsed)
}
