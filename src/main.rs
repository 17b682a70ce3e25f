//! Firehose stats nozzle
//!
//! Usage:
//!   API_ADDR=https://api.sys.example.com CF_USERNAME=admin CF_PASSWORD=... \
//!     firehose-stats < envelopes.jsonl
//!
//! Environment variables:
//!   API_ADDR, CF_USERNAME, CF_PASSWORD - required
//!   TOKEN_REFRESH_INTERVAL - minutes between token refreshes (default: 90)
//!   REPORT_INTERVAL_SECS - seconds between reports (default: 5)
//!   FIREHOSE_SOURCE - envelope file, `-` for stdin (default: -)

use firehose_stats::{config::Config, run, StartupError};
use std::process;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    // Logs go to stderr, the report owns stdout
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let result = match Config::from_env() {
        Ok(config) => run(config).await,
        Err(e) => Err(StartupError::from(e)),
    };

    if let Err(e) = result {
        log::error!("{}", e);
        process::exit(e.exit_code());
    }
}
