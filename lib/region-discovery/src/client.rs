//! HTTP client fetching account metadata from the seed endpoint

use crate::DiscoveryError;
use region_api::{AccountProperties, AccountTopology, Uri};
use region_cache::AccountTopologyFetcher;
use std::time::Duration;
use tracing::debug;

/// Default timeout for a single metadata request
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// HttpTopologyFetcher reads the account metadata document served at the
/// root of the seed endpoint and turns it into a topology snapshot
pub struct HttpTopologyFetcher {
    client: reqwest::Client,
}

impl HttpTopologyFetcher {
    /// Create a fetcher with the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self, DiscoveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch the raw account metadata
    pub async fn fetch_properties(&self, seed_endpoint: &Uri) -> Result<AccountProperties, DiscoveryError> {
        let url = seed_endpoint.to_string();
        debug!("Requesting account metadata from {}", url);

        let response = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let properties: AccountProperties = serde_json::from_slice(&body)?;
        debug!(
            "Account metadata lists {} writable and {} readable locations",
            properties.writable_locations.len(),
            properties.readable_locations.len()
        );
        Ok(properties)
    }

    /// Fetch and convert the metadata into a topology
    pub async fn fetch_topology(&self, seed_endpoint: &Uri) -> Result<AccountTopology, DiscoveryError> {
        let properties = self.fetch_properties(seed_endpoint).await?;
        Ok(properties.into_topology(seed_endpoint.clone())?)
    }
}

#[async_trait::async_trait]
impl AccountTopologyFetcher for HttpTopologyFetcher {
    async fn fetch(&self, seed_endpoint: &Uri) -> anyhow::Result<AccountTopology> {
        Ok(self.fetch_topology(seed_endpoint).await?)
    }
}
