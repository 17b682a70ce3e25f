//! Runtime configuration loaded from environment variables

use std::env;
use std::time::Duration;

/// Configuration for the stats nozzle
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Platform API address, e.g. `https://api.sys.example.com`
    pub api_address: String,

    pub username: String,

    pub password: String,

    /// How often the platform client is rebuilt to get a fresh token
    pub token_refresh_interval: Duration,

    /// How often the tallies are printed
    pub report_interval: Duration,

    /// Stop reporting after this many reports (None = run until exit)
    pub max_reports: Option<u64>,

    /// Where firehose envelopes are read from (`-` = stdin)
    pub firehose_source: String,

    pub skip_ssl_validation: bool,

    pub rust_log: String,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("missing environment variables: {}", .0.join(", "))]
    Missing(Vec<String>),
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}

const DEFAULT_TOKEN_REFRESH_MINUTES: u64 = 90;
const DEFAULT_REPORT_INTERVAL_SECS: u64 = 5;

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `API_ADDR` (required)
    /// - `CF_USERNAME` (required)
    /// - `CF_PASSWORD` (required)
    /// - `TOKEN_REFRESH_INTERVAL` minutes (default: 90)
    /// - `REPORT_INTERVAL_SECS` (default: 5)
    /// - `MAX_REPORTS` (default: unlimited)
    /// - `FIREHOSE_SOURCE` (default: `-`, stdin)
    /// - `SKIP_SSL_VALIDATION` (default: true)
    /// - `RUST_LOG` (default: info)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let mut required = |name: &str| match env::var(name) {
            Ok(value) if !value.is_empty() => value,
            _ => {
                missing.push(name.to_string());
                String::new()
            }
        };

        let api_address = required("API_ADDR");
        let username = required("CF_USERNAME");
        let password = required("CF_PASSWORD");

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let refresh_minutes =
            parse_positive("TOKEN_REFRESH_INTERVAL", DEFAULT_TOKEN_REFRESH_MINUTES)?;
        let refresh_secs = refresh_minutes
            .checked_mul(60)
            .ok_or_else(|| ConfigError::Invalid {
                var: "TOKEN_REFRESH_INTERVAL",
                value: refresh_minutes.to_string(),
            })?;
        let report_secs = parse_positive("REPORT_INTERVAL_SECS", DEFAULT_REPORT_INTERVAL_SECS)?;

        let max_reports = match env::var("MAX_REPORTS") {
            Ok(s) if !s.is_empty() => Some(s.trim().parse::<u64>().map_err(|_| {
                ConfigError::Invalid {
                    var: "MAX_REPORTS",
                    value: s.clone(),
                }
            })?),
            _ => None,
        };

        let skip_ssl_validation = match env::var("SKIP_SSL_VALIDATION") {
            Ok(s) if !s.is_empty() => {
                s.trim()
                    .to_lowercase()
                    .parse::<bool>()
                    .map_err(|_| ConfigError::Invalid {
                        var: "SKIP_SSL_VALIDATION",
                        value: s.clone(),
                    })?
            }
            _ => true,
        };

        Ok(Self {
            api_address: api_address.trim_end_matches('/').to_string(),
            username,
            password,
            token_refresh_interval: Duration::from_secs(refresh_secs),
            report_interval: Duration::from_secs(report_secs),
            max_reports,
            firehose_source: env::var("FIREHOSE_SOURCE").unwrap_or_else(|_| "-".to_string()),
            skip_ssl_validation,
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

/// Parses an optional numeric variable; unset or empty falls back to `default`.
fn parse_positive(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(var) {
        Ok(s) if !s.is_empty() => match s.trim().parse::<u64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConfigError::Invalid { var, value: s }),
        },
        _ => Ok(default),
    }
}
