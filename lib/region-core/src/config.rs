//! Routing configuration

use crate::{CoreError, Result};
use region_api::{uri_serde, ExcludedRegions, Uri};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Default time a failed endpoint stays deprioritised
pub const DEFAULT_UNAVAILABILITY_TTL_SECS: u64 = 300;

/// Default interval between scheduled topology refreshes
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;

/// Client routing configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Global account endpoint; seed for topology fetches and the last-resort target
    #[serde(with = "uri_serde")]
    pub default_endpoint: Uri,

    /// Use the account topology at all. When false every request goes to `default_endpoint`.
    #[serde(default = "default_true")]
    pub enable_endpoint_discovery: bool,

    /// Route writes across all writable regions when the account allows it
    #[serde(default = "default_true")]
    pub use_multiple_write_locations: bool,

    /// Ordered region preference, most preferred first
    #[serde(default)]
    pub preferred_regions: Vec<String>,

    /// Initial client-level excluded regions
    #[serde(default)]
    pub excluded_regions: Vec<String>,

    /// Seconds a failed endpoint is considered unavailable
    #[serde(default = "default_unavailability_ttl_secs")]
    pub unavailability_ttl_secs: u64,

    /// Seconds between scheduled topology refreshes
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_unavailability_ttl_secs() -> u64 {
    DEFAULT_UNAVAILABILITY_TTL_SECS
}

fn default_refresh_interval_secs() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}

impl RoutingConfig {
    /// Configuration with defaults for everything but the endpoint
    pub fn new(default_endpoint: Uri) -> Self {
        Self {
            default_endpoint,
            enable_endpoint_discovery: true,
            use_multiple_write_locations: true,
            preferred_regions: Vec::new(),
            excluded_regions: Vec::new(),
            unavailability_ttl_secs: DEFAULT_UNAVAILABILITY_TTL_SECS,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
        }
    }

    pub fn with_preferred_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preferred_regions = regions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_endpoint_discovery(mut self, enabled: bool) -> Self {
        self.enable_endpoint_discovery = enabled;
        self
    }

    pub fn with_multiple_write_locations(mut self, enabled: bool) -> Self {
        self.use_multiple_write_locations = enabled;
        self
    }

    pub fn with_unavailability_ttl(mut self, ttl: Duration) -> Self {
        self.unavailability_ttl_secs = ttl.as_secs();
        self
    }

    pub fn unavailability_ttl(&self) -> Duration {
        Duration::from_secs(self.unavailability_ttl_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Initial client-level exclusions as a set
    pub fn initial_excluded_regions(&self) -> ExcludedRegions {
        self.excluded_regions.iter().cloned().collect()
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: RoutingConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading routing configuration from {}", path.display());
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// Apply `REGION_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup("REGION_DEFAULT_ENDPOINT") {
            self.default_endpoint =
                uri_serde::parse_endpoint(&endpoint).map_err(CoreError::InvalidEndpoint)?;
        }
        if let Some(regions) = lookup("REGION_PREFERRED_REGIONS") {
            self.preferred_regions = split_list(&regions);
        }
        if let Some(regions) = lookup("REGION_EXCLUDED_REGIONS") {
            self.excluded_regions = split_list(&regions);
        }
        if let Some(enabled) = lookup("REGION_ENABLE_DISCOVERY") {
            self.enable_endpoint_discovery = enabled.trim().parse().map_err(|_| {
                CoreError::InvalidConfiguration(format!(
                    "REGION_ENABLE_DISCOVERY must be true or false, got '{}'",
                    enabled
                ))
            })?;
        }
        if let Some(ttl) = lookup("REGION_UNAVAILABILITY_TTL_SECS") {
            self.unavailability_ttl_secs = ttl.trim().parse().map_err(|_| {
                CoreError::InvalidConfiguration(format!(
                    "REGION_UNAVAILABILITY_TTL_SECS must be a number of seconds, got '{}'",
                    ttl
                ))
            })?;
        }
        self.validate()
    }

    /// Check the configuration for values the router cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.default_endpoint.scheme().is_none() || self.default_endpoint.authority().is_none() {
            return Err(CoreError::InvalidEndpoint(format!(
                "default endpoint '{}' must include a scheme and host",
                self.default_endpoint
            )));
        }
        if self.unavailability_ttl_secs == 0 {
            return Err(CoreError::InvalidConfiguration(
                "unavailability_ttl_secs must be greater than zero".to_string(),
            ));
        }
        if self.refresh_interval_secs == 0 {
            return Err(CoreError::InvalidConfiguration(
                "refresh_interval_secs must be greater than zero".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for region in &self.preferred_regions {
            if region.is_empty() {
                return Err(CoreError::InvalidConfiguration(
                    "preferred region names must not be empty".to_string(),
                ));
            }
            if !seen.insert(region.as_str()) {
                return Err(CoreError::InvalidConfiguration(format!(
                    "preferred region '{}' is listed more than once",
                    region
                )));
            }
        }
        Ok(())
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
