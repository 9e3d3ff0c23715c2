//! Account topology discovery over HTTP
pub mod client;
pub mod error;

pub use client::HttpTopologyFetcher;
pub use error::DiscoveryError;
