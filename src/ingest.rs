//! Firehose ingestion loop

use crate::aggregator::Aggregator;
use crate::event::EventRecord;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const RATE_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Feed every record from `records` into `aggregator`, in arrival order
///
/// Returns the number of records ingested once the stream closes. A closed
/// stream is the normal end of the firehose, not an error.
pub async fn run_ingest(
    mut records: mpsc::Receiver<EventRecord>,
    aggregator: Arc<dyn Aggregator>,
) -> u64 {
    log::info!("Ingest loop started, waiting for envelopes...");

    let mut total = 0u64;
    let mut window_count = 0u64;
    let mut last_log_time = Instant::now();

    while let Some(record) = records.recv().await {
        aggregator.ingest(record).await;

        total += 1;
        window_count += 1;

        if last_log_time.elapsed() >= RATE_LOG_INTERVAL {
            let per_sec = window_count as f64 / last_log_time.elapsed().as_secs_f64();
            log::info!("Ingestion rate: {:.1} envelopes/sec (total: {})", per_sec, total);
            last_log_time = Instant::now();
            window_count = 0;
        }
    }

    log::debug!("Firehose closed after {} envelopes", total);
    total
}
