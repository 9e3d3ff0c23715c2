//! Core region routing functionality
//!
//! This library provides:
//! - EndpointRepository holding the current account topology snapshot
//! - UnavailabilityTracker recording endpoint failures with lazy TTL expiry
//! - PreferenceResolver ordering candidate endpoints per request
//! - Routing configuration and excluded-region sources

pub mod clock;
pub mod config;
pub mod error;
pub mod exclusions;
pub mod preference;
pub mod repository;
pub mod unavailability;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::RoutingConfig;
pub use error::{CoreError, Result};
pub use exclusions::{ExcludedRegionsSource, SharedExcludedRegions, StaticExcludedRegions};
pub use preference::PreferenceResolver;
pub use repository::EndpointRepository;
pub use unavailability::UnavailabilityTracker;
