//! Region routing API types
//!
//! This library defines the data model shared by the routing crates:
//! - RegionEndpoint / AccountTopology: the account's regional layout
//! - RoutingRequest: the immutable per-call routing descriptor
//! - AccountProperties: the account metadata document served by the seed endpoint

pub mod metadata;
pub mod request;
pub mod topology;
pub mod uri_serde;

pub use metadata::{AccountLocation, AccountProperties, MetadataError};
pub use request::{ExcludedRegions, OperationClass, OperationType, RequestError, RoutingRequest};
pub use topology::{AccountTopology, RegionEndpoint};

/// Endpoint address type used throughout the routing crates
pub use http::Uri;
