//! Region-aware endpoint routing and failover cache
//!
//! `RoutingResolver` decides, per request, which regional endpoint to use.
//! `RefreshCoordinator` keeps the account topology current, collapsing
//! concurrent refresh requests into a single fetch.

pub mod error;
pub mod metrics;
pub mod refresh;
pub mod resolver;

#[cfg(test)]
mod testing;

pub use error::RefreshError;
pub use metrics::RoutingMetrics;
pub use refresh::{AccountTopologyFetcher, RefreshCoordinator};
pub use resolver::{RefreshDecision, RoutingResolver, RoutingResolverBuilder, RoutingState};
