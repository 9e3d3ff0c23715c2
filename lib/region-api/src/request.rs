//! Per-call routing descriptors

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors raised while building a routing request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Excluded regions must be an explicit set, not absent")]
    MissingExcludedRegions,
}

/// Kind of operation a request performs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Read,
    ReadFeed,
    Query,
    Head,
    Create,
    Upsert,
    Replace,
    Patch,
    Delete,
    Batch,
    ExecuteJavaScript,
}

impl OperationType {
    /// Pure reads. Anything else is routed as a write.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            OperationType::Read | OperationType::ReadFeed | OperationType::Query | OperationType::Head
        )
    }

    /// Routing class this operation belongs to
    pub fn class(&self) -> OperationClass {
        if self.is_read_only() {
            OperationClass::Read
        } else {
            OperationClass::Write
        }
    }
}

/// Read/write split used for routing and unavailability tracking
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationClass {
    Read,
    Write,
}

impl OperationClass {
    pub fn is_write(&self) -> bool {
        matches!(self, OperationClass::Write)
    }

    /// Lowercase label, used for metrics and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationClass::Read => "read",
            OperationClass::Write => "write",
        }
    }
}

/// Set of region names excluded from routing.
///
/// "No exclusions" is an explicit empty set. Building one from an absent
/// collection is rejected.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExcludedRegions(BTreeSet<String>);

impl ExcludedRegions {
    /// Explicit empty set
    pub fn none() -> Self {
        Self(BTreeSet::new())
    }

    /// Build from a possibly absent collection
    pub fn from_optional<I, S>(regions: Option<I>) -> Result<Self, RequestError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        regions
            .map(|r| r.into_iter().collect())
            .ok_or(RequestError::MissingExcludedRegions)
    }

    pub fn contains(&self, region_name: &str) -> bool {
        self.0.contains(region_name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Union of two exclusion sets
    pub fn union(&self, other: &ExcludedRegions) -> ExcludedRegions {
        Self(self.0.union(&other.0).cloned().collect())
    }
}

impl<S: Into<String>> FromIterator<S> for ExcludedRegions {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Immutable routing descriptor passed into every resolution call.
///
/// Retries build a new value (for example with a higher routing index)
/// instead of mutating a shared request object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutingRequest {
    /// Operation being routed
    pub operation: OperationType,
    /// Request targets account metadata rather than data
    pub is_master_resource: bool,
    /// Regions to skip for this call only
    pub excluded_regions: ExcludedRegions,
    /// 0 = primary, >= 1 = alternate endpoint for writes
    pub routing_index_hint: usize,
}

impl RoutingRequest {
    pub fn new(operation: OperationType) -> Self {
        Self {
            operation,
            is_master_resource: false,
            excluded_regions: ExcludedRegions::none(),
            routing_index_hint: 0,
        }
    }

    /// Point read request
    pub fn read() -> Self {
        Self::new(OperationType::Read)
    }

    /// Create request
    pub fn write() -> Self {
        Self::new(OperationType::Create)
    }

    pub fn with_excluded_regions(mut self, excluded_regions: ExcludedRegions) -> Self {
        self.excluded_regions = excluded_regions;
        self
    }

    pub fn with_routing_index(mut self, routing_index_hint: usize) -> Self {
        self.routing_index_hint = routing_index_hint;
        self
    }

    pub fn with_master_resource(mut self, is_master_resource: bool) -> Self {
        self.is_master_resource = is_master_resource;
        self
    }

    pub fn class(&self) -> OperationClass {
        self.operation.class()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_classification() {
        assert_eq!(OperationType::Read.class(), OperationClass::Read);
        assert_eq!(OperationType::Query.class(), OperationClass::Read);
        assert_eq!(OperationType::Head.class(), OperationClass::Read);
        assert_eq!(OperationType::Create.class(), OperationClass::Write);
        assert_eq!(OperationType::Batch.class(), OperationClass::Write);
        assert_eq!(OperationType::ExecuteJavaScript.class(), OperationClass::Write);
    }

    #[test]
    fn test_excluded_regions_from_absent_collection_is_rejected() {
        let missing: Option<Vec<String>> = None;
        assert_eq!(
            ExcludedRegions::from_optional(missing),
            Err(RequestError::MissingExcludedRegions)
        );
    }

    #[test]
    fn test_excluded_regions_from_empty_collection() {
        let empty = ExcludedRegions::from_optional(Some(Vec::<String>::new())).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty, ExcludedRegions::none());
    }

    #[test]
    fn test_excluded_regions_union() {
        let a: ExcludedRegions = ["East US", "West US"].into_iter().collect();
        let b: ExcludedRegions = ["West US", "North Europe"].into_iter().collect();
        let merged = a.union(&b);
        assert_eq!(merged.len(), 3);
        assert!(merged.contains("North Europe"));
        assert!(!merged.contains("east us"));
    }

    #[test]
    fn test_request_builders_do_not_share_state() {
        let first = RoutingRequest::write();
        let retry = first.clone().with_routing_index(1);
        assert_eq!(first.routing_index_hint, 0);
        assert_eq!(retry.routing_index_hint, 1);
        assert_eq!(retry.class(), OperationClass::Write);
    }
}
