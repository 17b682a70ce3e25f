//! Firehose aggregation context
//!
//! All tallies and the identity cache live in one [`Stats`] value guarded by
//! a single exclusive lock. The ingest task is the only writer; the reporter
//! takes consistent snapshots. Callers go through the [`Aggregator`] trait so
//! the locking strategy stays an internal detail.

use crate::event::EventRecord;
use crate::resolver::{AppLookup, IdentityCache};
use crate::tally::Tally;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Ingest records, take snapshots
#[async_trait]
pub trait Aggregator: Send + Sync {
    /// Apply one record to every dimension as a single atomic step
    async fn ingest(&self, record: EventRecord);

    /// Point-in-time copy of every tally, sorted for display
    async fn snapshot(&self) -> Snapshot;
}

/// The tallied dimensions, in report order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    EventType,
    Origin,
    Job,
    Deployment,
    Ip,
    App,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::EventType,
        Dimension::Origin,
        Dimension::Job,
        Dimension::Deployment,
        Dimension::Ip,
        Dimension::App,
    ];

    /// Section heading in the report
    pub fn label(&self) -> &'static str {
        match self {
            Dimension::EventType => "EventTypes",
            Dimension::Origin => "Origins",
            Dimension::Job => "Jobs",
            Dimension::Deployment => "Deployments",
            Dimension::Ip => "IPs",
            Dimension::App => "Apps",
        }
    }
}

/// In-memory state: one tally per dimension plus the identity cache
#[derive(Debug, Default)]
pub struct Stats {
    event_types: Tally,
    origins: Tally,
    jobs: Tally,
    deployments: Tally,
    ips: Tally,
    apps: Tally,
    identities: IdentityCache,
    records: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tally(&self, dimension: Dimension) -> &Tally {
        match dimension {
            Dimension::EventType => &self.event_types,
            Dimension::Origin => &self.origins,
            Dimension::Job => &self.jobs,
            Dimension::Deployment => &self.deployments,
            Dimension::Ip => &self.ips,
            Dimension::App => &self.apps,
        }
    }

    /// Number of records applied so far
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn identities(&self) -> &IdentityCache {
        &self.identities
    }

    /// Apply one record
    ///
    /// A failed identity lookup only drops the record's contribution to the
    /// apps dimension; every other dimension is still counted.
    pub async fn apply(&mut self, record: &EventRecord, lookup: &dyn AppLookup) {
        if let Some(app_id) = record.app_id.as_deref() {
            match self.identities.resolve(app_id, lookup).await {
                Ok(identity) => {
                    let key = identity.key();
                    self.apps.increment(&key);
                }
                Err(e) => log::warn!("{}", e),
            }
        }

        self.event_types.increment(record.event_type.as_str());
        self.origins.increment(&record.origin);
        self.jobs.increment(&record.job);
        self.deployments.increment(&record.deployment);
        self.ips.increment(&record.ip);
        self.records += 1;
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            sections: Dimension::ALL
                .iter()
                .map(|&dimension| (dimension, self.tally(dimension).snapshot_sorted()))
                .collect(),
            records: self.records,
            identities: self.identities.len(),
        }
    }
}

/// Sorted copy of every tally taken under one lock acquisition
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub sections: Vec<(Dimension, Vec<(String, u64)>)>,
    pub records: u64,
    pub identities: usize,
}

impl Snapshot {
    pub fn section(&self, dimension: Dimension) -> &[(String, u64)] {
        self.sections
            .iter()
            .find(|(d, _)| *d == dimension)
            .map(|(_, entries)| entries.as_slice())
            .unwrap_or(&[])
    }

    /// Count for `key` in `dimension`, 0 when never observed
    pub fn count(&self, dimension: Dimension, key: &str) -> u64 {
        self.section(dimension)
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }
}

/// [`Aggregator`] backed by one coarse lock over all of [`Stats`]
///
/// The lock is held for the whole of a record's update, including an
/// identity lookup on a cache miss.
pub struct StatsAggregator {
    stats: Mutex<Stats>,
    lookup: Arc<dyn AppLookup>,
}

impl StatsAggregator {
    pub fn new(lookup: Arc<dyn AppLookup>) -> Self {
        Self {
            stats: Mutex::new(Stats::new()),
            lookup,
        }
    }
}

#[async_trait]
impl Aggregator for StatsAggregator {
    async fn ingest(&self, record: EventRecord) {
        let mut stats = self.stats.lock().await;
        stats.apply(&record, self.lookup.as_ref()).await;
    }

    async fn snapshot(&self) -> Snapshot {
        let stats = self.stats.lock().await;
        stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use crate::resolver::tests::CountingLookup;

    fn record(event_type: EventType, origin: &str, app_id: Option<&str>) -> EventRecord {
        EventRecord {
            event_type,
            origin: origin.to_string(),
            job: "router".to_string(),
            deployment: "cf".to_string(),
            ip: "10.0.0.1".to_string(),
            app_id: app_id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_three_records_without_app_ids() {
        let lookup = Arc::new(CountingLookup::default());
        let aggregator = StatsAggregator::new(lookup.clone());

        aggregator.ingest(record(EventType::Other("A".into()), "x", None)).await;
        aggregator.ingest(record(EventType::Other("A".into()), "y", None)).await;
        aggregator.ingest(record(EventType::Other("B".into()), "x", None)).await;

        let snapshot = aggregator.snapshot().await;
        assert_eq!(
            snapshot.section(Dimension::EventType),
            &[("A".to_string(), 2), ("B".to_string(), 1)]
        );
        assert_eq!(
            snapshot.section(Dimension::Origin),
            &[("x".to_string(), 2), ("y".to_string(), 1)]
        );
        assert!(snapshot.section(Dimension::App).is_empty());
        assert_eq!(lookup.calls(), 0);
    }

    #[tokio::test]
    async fn test_every_dimension_sums_to_record_count() {
        let lookup = Arc::new(CountingLookup::default());
        let aggregator = StatsAggregator::new(lookup);

        let mut empty = EventRecord::default();
        empty.event_type = EventType::HttpStartStop;
        aggregator.ingest(empty).await;
        aggregator.ingest(record(EventType::LogMessage, "rep", Some("1"))).await;
        aggregator.ingest(record(EventType::ValueMetric, "", None)).await;

        let snapshot = aggregator.snapshot().await;
        assert_eq!(snapshot.records, 3);
        for dimension in Dimension::ALL.iter().filter(|d| **d != Dimension::App) {
            let total: u64 = snapshot.section(*dimension).iter().map(|(_, c)| c).sum();
            assert_eq!(total, 3, "{:?}", dimension);
        }
        assert_eq!(snapshot.count(Dimension::Origin, ""), 2);
        assert_eq!(snapshot.count(Dimension::Job, ""), 1);
    }

    #[tokio::test]
    async fn test_app_identity_resolved_once() {
        let lookup = Arc::new(CountingLookup::default());
        let aggregator = StatsAggregator::new(lookup.clone());

        for _ in 0..5 {
            aggregator.ingest(record(EventType::LogMessage, "rep", Some("9"))).await;
        }

        let snapshot = aggregator.snapshot().await;
        assert_eq!(snapshot.count(Dimension::App, "acme/dev/app-9"), 5);
        assert_eq!(snapshot.identities, 1);
        assert_eq!(lookup.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_lookup_skips_only_apps_dimension() {
        let lookup = Arc::new(CountingLookup::default());
        lookup.fail_for("bad");
        let aggregator = StatsAggregator::new(lookup.clone());

        aggregator.ingest(record(EventType::LogMessage, "rep", Some("bad"))).await;
        aggregator.ingest(record(EventType::LogMessage, "rep", Some("bad"))).await;

        let snapshot = aggregator.snapshot().await;
        assert!(snapshot.section(Dimension::App).is_empty());
        assert_eq!(snapshot.count(Dimension::EventType, "LogMessage"), 2);
        assert_eq!(snapshot.count(Dimension::Origin, "rep"), 2);
        assert_eq!(lookup.calls(), 2, "failures are retried");
    }

    #[tokio::test]
    async fn test_snapshot_after_n_records_reflects_exactly_n() {
        let aggregator = StatsAggregator::new(Arc::new(CountingLookup::default()));

        for n in 1..=20u64 {
            aggregator.ingest(record(EventType::CounterEvent, "metron", None)).await;
            let snapshot = aggregator.snapshot().await;
            assert_eq!(snapshot.records, n);
            assert_eq!(snapshot.count(Dimension::Origin, "metron"), n);
        }
    }
}
