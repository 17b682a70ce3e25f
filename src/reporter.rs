//! Periodic stats report
//!
//! Every interval the reporter takes one snapshot (a single lock
//! acquisition), then renders it with the lock already released. Each report
//! is rendered into memory and written to the sink in one async write.

use crate::aggregator::{Aggregator, Snapshot};
use chrono::{DateTime, Utc};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::{interval, MissedTickBehavior};

const SEPARATOR: &str =
    "=================================================================================================";

#[derive(Debug, Clone)]
pub struct ReporterConfig {
    pub interval: Duration,
    /// None = report until the process exits
    pub max_reports: Option<u64>,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_reports: None,
        }
    }
}

/// Write one report for `snapshot`
pub fn render<W: Write>(out: &mut W, snapshot: &Snapshot, at: DateTime<Utc>) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", SEPARATOR)?;
    writeln!(out, "Stats at {}", at.format("%Y-%m-%d %H:%M:%S UTC"))?;

    for (dimension, entries) in &snapshot.sections {
        writeln!(out)?;
        writeln!(out, "{}", dimension.label())?;
        for (key, count) in entries {
            writeln!(out, "  {} : {}", key, count)?;
        }
    }

    writeln!(out)?;
    writeln!(
        out,
        "Envelopes: {}  Resolved apps: {}",
        snapshot.records, snapshot.identities
    )?;
    out.flush()
}

/// Report on a fixed interval, writing to `out`
///
/// A slow sink delays the next report rather than triggering a burst of
/// catch-up reports. Returns the number of reports written; only returns at
/// all when `max_reports` is set.
pub async fn run_reporter<W: AsyncWrite + Unpin>(
    aggregator: Arc<dyn Aggregator>,
    config: ReporterConfig,
    mut out: W,
) -> u64 {
    log::info!("Reporter started (interval: {:?})", config.interval);

    let mut timer = interval(config.interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut buf = Vec::new();
    let mut reports = 0u64;

    loop {
        if config.max_reports.is_some_and(|max| reports >= max) {
            log::info!("Reporter stopping after {} reports", reports);
            return reports;
        }

        timer.tick().await;

        let snapshot = aggregator.snapshot().await;

        buf.clear();
        if let Err(e) = render(&mut buf, &snapshot, Utc::now()) {
            log::error!("Failed to render report: {}", e);
        } else if let Err(e) = write_report(&mut out, &buf).await {
            log::error!("Failed to write report: {}", e);
        }
        reports += 1;
    }
}

async fn write_report<W: AsyncWrite + Unpin>(out: &mut W, report: &[u8]) -> io::Result<()> {
    out.write_all(report).await?;
    out.flush().await
}
