//! Firehose stats nozzle
//!
//! Subscribes to a platform's firehose, tallies envelopes by event type,
//! origin, job, deployment, ip and owning application, and prints the sorted
//! tallies on a fixed interval.

pub mod aggregator;
pub mod config;
pub mod error_sink;
pub mod event;
pub mod firehose;
pub mod ingest;
pub mod platform;
pub mod reporter;
pub mod resolver;
pub mod runtime;
pub mod tally;

pub use aggregator::{Aggregator, Dimension, Snapshot, StatsAggregator};
pub use config::Config;
pub use event::{EventRecord, EventType};
pub use runtime::{run, StartupError};
