//! Unavailability tracking for endpoints.
//!
//! Failures are reported from outside (the caller saw a request fail) and
//! recorded per endpoint and operation class. A record expires lazily: once
//! it is older than the TTL the next lookup treats it as absent and drops it.
//! Marking and listing also sweep out every expired record, so endpoints that
//! are never looked up again do not accumulate. Nothing runs in the background.

use dashmap::DashMap;
use region_api::{OperationClass, Uri};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Per-endpoint, per-operation-class failure timestamps
#[derive(Debug)]
pub struct UnavailabilityTracker {
    ttl: Duration,
    records: DashMap<(Uri, OperationClass), Instant>,
}

impl UnavailabilityTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            records: DashMap::new(),
        }
    }

    /// Record a failure. Concurrent writers race and the last one wins.
    pub fn mark_unavailable(&self, endpoint: &Uri, class: OperationClass, now: Instant) {
        warn!(
            endpoint = %endpoint,
            operation = class.as_str(),
            ttl_secs = self.ttl.as_secs(),
            "Marking endpoint unavailable"
        );
        self.purge_expired(now);
        self.records.insert((endpoint.clone(), class), now);
    }

    /// True if no live failure record exists for the endpoint
    pub fn is_available(&self, endpoint: &Uri, class: OperationClass, now: Instant) -> bool {
        let key = (endpoint.clone(), class);
        let failed_at = match self.records.get(&key) {
            Some(entry) => *entry.value(),
            None => return true,
        };

        if !self.is_expired(failed_at, now) {
            return false;
        }

        // Only drop the record if nobody refreshed it since we looked.
        if self
            .records
            .remove_if(&key, |_, at| self.is_expired(*at, now))
            .is_some()
        {
            debug!(
                endpoint = %endpoint,
                operation = class.as_str(),
                "Unavailability expired, endpoint available again"
            );
        }
        true
    }

    /// Reorder `endpoints` so available ones come first. Relative order
    /// within the available and the unavailable groups is preserved.
    pub fn partition_by_availability(
        &self,
        endpoints: Vec<Uri>,
        class: OperationClass,
        now: Instant,
    ) -> Vec<Uri> {
        let (mut available, unavailable): (Vec<Uri>, Vec<Uri>) = endpoints
            .into_iter()
            .partition(|endpoint| self.is_available(endpoint, class, now));
        available.extend(unavailable);
        available
    }

    /// Endpoints currently unavailable for `class`
    pub fn unavailable_endpoints(&self, class: OperationClass, now: Instant) -> Vec<Uri> {
        self.purge_expired(now);
        let mut endpoints: Vec<Uri> = self
            .records
            .iter()
            .filter(|entry| entry.key().1 == class && !self.is_expired(*entry.value(), now))
            .map(|entry| entry.key().0.clone())
            .collect();
        endpoints.sort_by_key(|uri| uri.to_string());
        endpoints
    }

    fn purge_expired(&self, now: Instant) {
        let before = self.records.len();
        self.records.retain(|_, at| !self.is_expired(*at, now));
        let purged = before.saturating_sub(self.records.len());
        if purged > 0 {
            debug!(purged, "Dropped expired unavailability records");
        }
    }

    fn is_expired(&self, failed_at: Instant, now: Instant) -> bool {
        now.saturating_duration_since(failed_at) > self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn test_unknown_endpoint_is_available() {
        let tracker = UnavailabilityTracker::new(Duration::from_secs(300));
        assert!(tracker.is_available(&uri("https://a.example.net/"), OperationClass::Read, Instant::now()));
    }

    #[test]
    fn test_mark_is_per_operation_class() {
        let tracker = UnavailabilityTracker::new(Duration::from_secs(300));
        let endpoint = uri("https://a.example.net/");
        let now = Instant::now();

        tracker.mark_unavailable(&endpoint, OperationClass::Write, now);
        assert!(!tracker.is_available(&endpoint, OperationClass::Write, now));
        assert!(tracker.is_available(&endpoint, OperationClass::Read, now));
    }

    #[test]
    fn test_record_expires_after_ttl() {
        let ttl = Duration::from_secs(300);
        let tracker = UnavailabilityTracker::new(ttl);
        let endpoint = uri("https://a.example.net/");
        let start = Instant::now();

        tracker.mark_unavailable(&endpoint, OperationClass::Read, start);
        assert!(!tracker.is_available(&endpoint, OperationClass::Read, start + ttl));
        assert!(tracker.is_available(&endpoint, OperationClass::Read, start + ttl + Duration::from_millis(1)));
        assert!(tracker.records.is_empty());
    }

    #[test]
    fn test_remark_extends_unavailability() {
        let ttl = Duration::from_secs(10);
        let tracker = UnavailabilityTracker::new(ttl);
        let endpoint = uri("https://a.example.net/");
        let start = Instant::now();

        tracker.mark_unavailable(&endpoint, OperationClass::Read, start);
        tracker.mark_unavailable(&endpoint, OperationClass::Read, start + Duration::from_secs(8));
        assert!(!tracker.is_available(&endpoint, OperationClass::Read, start + Duration::from_secs(15)));
    }

    #[test]
    fn test_partition_preserves_relative_order() {
        let tracker = UnavailabilityTracker::new(Duration::from_secs(300));
        let now = Instant::now();
        let endpoints: Vec<Uri> = (1..=5)
            .map(|i| uri(&format!("https://ep{}.example.net/", i)))
            .collect();

        tracker.mark_unavailable(&endpoints[0], OperationClass::Read, now);
        tracker.mark_unavailable(&endpoints[3], OperationClass::Read, now);

        let ordered = tracker.partition_by_availability(endpoints.clone(), OperationClass::Read, now);
        assert_eq!(
            ordered,
            vec![
                endpoints[1].clone(),
                endpoints[2].clone(),
                endpoints[4].clone(),
                endpoints[0].clone(),
                endpoints[3].clone(),
            ]
        );
    }

    #[test]
    fn test_partition_all_unavailable_keeps_everything() {
        let tracker = UnavailabilityTracker::new(Duration::from_secs(300));
        let now = Instant::now();
        let endpoints = vec![uri("https://a.example.net/"), uri("https://b.example.net/")];
        for endpoint in &endpoints {
            tracker.mark_unavailable(endpoint, OperationClass::Write, now);
        }

        let ordered = tracker.partition_by_availability(endpoints.clone(), OperationClass::Write, now);
        assert_eq!(ordered, endpoints);
    }

    #[test]
    fn test_unavailable_endpoints_listing() {
        let tracker = UnavailabilityTracker::new(Duration::from_secs(60));
        let start = Instant::now();
        tracker.mark_unavailable(&uri("https://b.example.net/"), OperationClass::Read, start);
        tracker.mark_unavailable(&uri("https://a.example.net/"), OperationClass::Read, start);
        tracker.mark_unavailable(&uri("https://c.example.net/"), OperationClass::Write, start);

        assert_eq!(
            tracker.unavailable_endpoints(OperationClass::Read, start),
            vec![uri("https://a.example.net/"), uri("https://b.example.net/")]
        );
        assert!(tracker
            .unavailable_endpoints(OperationClass::Read, start + Duration::from_secs(61))
            .is_empty());
    }

    #[test]
    fn test_expired_records_are_reclaimed_without_lookup() {
        let ttl = Duration::from_secs(1);
        let tracker = UnavailabilityTracker::new(ttl);
        let start = Instant::now();
        for i in 0..1_000 {
            let endpoint = uri(&format!("https://stale{}.example.net/", i));
            tracker.mark_unavailable(&endpoint, OperationClass::Read, start);
        }
        assert_eq!(tracker.records.len(), 1_000);

        let later = start + Duration::from_secs(3600);
        assert!(tracker.unavailable_endpoints(OperationClass::Write, later).is_empty());
        assert!(tracker.records.is_empty());

        for i in 0..10 {
            let endpoint = uri(&format!("https://stale{}.example.net/", i));
            tracker.mark_unavailable(&endpoint, OperationClass::Write, start);
        }
        let fresh = uri("https://fresh.example.net/");
        tracker.mark_unavailable(&fresh, OperationClass::Read, later);
        assert_eq!(tracker.records.len(), 1);
        assert!(!tracker.is_available(&fresh, OperationClass::Read, later));
    }
}
