//! Firehose event records
//!
//! An [`EventRecord`] is the part of a firehose envelope the nozzle tallies:
//! event type, origin, job, deployment, source ip and, for log messages, the
//! application id. Envelopes arrive as JSON; missing string fields decode to
//! the empty string so that absence is itself a countable category.

use serde::Deserialize;
use std::fmt;

/// Envelope event type
///
/// Accepts both the enum name (`"LogMessage"`) and the wire number (`5`).
/// Names the nozzle does not know are carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "RawEventType")]
pub enum EventType {
    HttpStartStop,
    LogMessage,
    ValueMetric,
    CounterEvent,
    Error,
    ContainerMetric,
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::HttpStartStop => "HttpStartStop",
            EventType::LogMessage => "LogMessage",
            EventType::ValueMetric => "ValueMetric",
            EventType::CounterEvent => "CounterEvent",
            EventType::Error => "Error",
            EventType::ContainerMetric => "ContainerMetric",
            EventType::Other(name) => name,
        }
    }

    fn from_number(n: u64) -> Self {
        match n {
            4 => EventType::HttpStartStop,
            5 => EventType::LogMessage,
            6 => EventType::ValueMetric,
            7 => EventType::CounterEvent,
            8 => EventType::Error,
            9 => EventType::ContainerMetric,
            other => EventType::Other(other.to_string()),
        }
    }
}

impl From<String> for EventType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "HttpStartStop" => EventType::HttpStartStop,
            "LogMessage" => EventType::LogMessage,
            "ValueMetric" => EventType::ValueMetric,
            "CounterEvent" => EventType::CounterEvent,
            "Error" => EventType::Error,
            "ContainerMetric" => EventType::ContainerMetric,
            _ => EventType::Other(name),
        }
    }
}

impl Default for EventType {
    fn default() -> Self {
        EventType::Other(String::new())
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEventType {
    Number(u64),
    Name(String),
}

impl From<RawEventType> for EventType {
    fn from(raw: RawEventType) -> Self {
        match raw {
            RawEventType::Number(n) => EventType::from_number(n),
            RawEventType::Name(name) => EventType::from(name),
        }
    }
}

/// A single firehose record, reduced to the tallied attributes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventRecord {
    pub event_type: EventType,
    pub origin: String,
    pub job: String,
    pub deployment: String,
    pub ip: String,
    pub app_id: Option<String>,
}

impl EventRecord {
    /// Decode one JSON envelope
    pub fn from_json(line: &str) -> Result<Self, serde_json::Error> {
        let envelope: Envelope = serde_json::from_str(line)?;
        Ok(envelope.into())
    }

    /// Decode one JSON envelope from raw bytes; invalid UTF-8 is a decode error
    pub fn from_json_slice(line: &[u8]) -> Result<Self, serde_json::Error> {
        let envelope: Envelope = serde_json::from_slice(line)?;
        Ok(envelope.into())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(default)]
    event_type: EventType,
    #[serde(default)]
    origin: String,
    #[serde(default)]
    job: String,
    #[serde(default)]
    deployment: String,
    #[serde(default)]
    ip: String,
    #[serde(default, alias = "app_id")]
    app_id: Option<String>,
    #[serde(default)]
    log_message: Option<LogMessage>,
}

#[derive(Deserialize)]
struct LogMessage {
    #[serde(default, alias = "appId")]
    app_id: Option<String>,
}

impl From<Envelope> for EventRecord {
    fn from(envelope: Envelope) -> Self {
        let app_id = envelope
            .log_message
            .and_then(|m| m.app_id)
            .or(envelope.app_id)
            .filter(|id| !id.is_empty());

        Self {
            event_type: envelope.event_type,
            origin: envelope.origin,
            job: envelope.job,
            deployment: envelope.deployment,
            ip: envelope.ip,
            app_id,
        }
    }
}
