//! Nozzle runtime: wires the firehose, aggregator, reporter, error sink and
//! token refresher together and runs them until the process is signalled.

use crate::aggregator::{Aggregator, StatsAggregator};
use crate::config::{Config, ConfigError};
use crate::error_sink::run_error_sink;
use crate::firehose::{FirehoseSource, FirehoseStreams, JsonlFirehose};
use crate::ingest::run_ingest;
use crate::platform::{token_refresh_task, ClientConfig, ClientError, PlatformClient, SharedClient};
use crate::reporter::{run_reporter, ReporterConfig};
use std::sync::Arc;

/// Name the nozzle subscribes to the firehose under
pub const SUBSCRIPTION_ID: &str = "StatsNozzle";

/// Fatal errors; everything else is logged and survived
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to obtain initial platform client: {0}")]
    Client(#[from] ClientError),
    #[error("failed to open firehose source {source_name}: {error}")]
    Firehose {
        source_name: String,
        error: std::io::Error,
    },
}

impl StartupError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            StartupError::Config(_) => 8,
            StartupError::Client(_) | StartupError::Firehose { .. } => 9,
        }
    }
}

/// Run the nozzle until Ctrl+C
pub async fn run(config: Config) -> Result<(), StartupError> {
    log::info!("Starting firehose stats nozzle");
    log::info!("   ├─ API: {}", config.api_address);
    log::info!("   ├─ User: {}", config.username);
    log::info!("   ├─ Token refresh: every {}m", config.token_refresh_interval.as_secs() / 60);
    log::info!("   ├─ Report interval: {:?}", config.report_interval);
    log::info!("   ├─ Firehose source: {}", config.firehose_source);
    log::info!("   └─ Log filter: {}", config.rust_log);

    let client_config = ClientConfig::from(&config);

    log::info!("Getting platform client...");
    let client = SharedClient::new(PlatformClient::connect(&client_config).await?);
    log::info!("Platform client ready");

    let firehose = JsonlFirehose::open(&config.firehose_source)
        .await
        .map_err(|error| StartupError::Firehose {
            source_name: config.firehose_source.clone(),
            error,
        })?;
    let FirehoseStreams { records, errors } = firehose.subscribe(SUBSCRIPTION_ID);

    let aggregator: Arc<dyn Aggregator> = Arc::new(StatsAggregator::new(Arc::new(client.clone())));

    tokio::spawn(run_error_sink(errors));

    let refresh_config = client_config.clone();
    tokio::spawn(token_refresh_task(
        client,
        config.token_refresh_interval,
        move || {
            let refresh_config = refresh_config.clone();
            async move { PlatformClient::connect(&refresh_config).await }
        },
    ));

    let reporter_config = ReporterConfig {
        interval: config.report_interval,
        max_reports: config.max_reports,
    };
    tokio::spawn(run_reporter(
        aggregator.clone(),
        reporter_config,
        tokio::io::stdout(),
    ));

    let mut ingest = tokio::spawn(run_ingest(records, aggregator));

    tokio::select! {
        result = &mut ingest => {
            match result {
                Ok(total) => log::info!("Firehose ended after {} envelopes, still reporting", total),
                Err(e) => log::error!("Ingest task failed: {}", e),
            }
            wait_for_ctrl_c().await;
        }
        _ = wait_for_ctrl_c() => {}
    }

    log::info!("Nozzle stopped");
    Ok(())
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("Received CTRL+C, shutting down..."),
        Err(err) => {
            log::error!("Failed to listen for CTRL+C: {}", err);
            std::future::pending::<()>().await;
        }
    }
}
