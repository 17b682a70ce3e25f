//! Firehose subscription
//!
//! A [`FirehoseSource`] hands out two streams, the way the platform consumer
//! does: an ordered stream of event records and an out-of-band stream of
//! transport errors. The record stream closing means the firehose ended.
//!
//! [`JsonlFirehose`] reads newline-delimited JSON envelopes from stdin or a
//! file, so the nozzle can be fed by any tool that dumps the firehose as JSON.

use crate::event::EventRecord;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

/// Default capacity of the record channel
pub const RECORD_BUFFER: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum FirehoseError {
    #[error("firehose read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("undecodable envelope on line {line}: {source}")]
    Decode {
        line: u64,
        #[source]
        source: serde_json::Error,
    },
}

/// The two streams a firehose subscription produces
pub struct FirehoseStreams {
    pub records: mpsc::Receiver<EventRecord>,
    pub errors: mpsc::UnboundedReceiver<FirehoseError>,
}

pub trait FirehoseSource {
    /// Start consuming the firehose under `subscription_id`
    fn subscribe(self, subscription_id: &str) -> FirehoseStreams;
}

/// Firehose fed by newline-delimited JSON envelopes
pub struct JsonlFirehose {
    input: Box<dyn AsyncRead + Unpin + Send>,
    buffer: usize,
}

impl JsonlFirehose {
    pub fn new(input: impl AsyncRead + Unpin + Send + 'static) -> Self {
        Self {
            input: Box::new(input),
            buffer: RECORD_BUFFER,
        }
    }

    /// Open `source`: `-` is stdin, anything else a file path
    pub async fn open(source: &str) -> std::io::Result<Self> {
        if source == "-" {
            return Ok(Self::new(tokio::io::stdin()));
        }
        let file = tokio::fs::File::open(PathBuf::from(source)).await?;
        Ok(Self::new(file))
    }

    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }
}

impl FirehoseSource for JsonlFirehose {
    fn subscribe(self, subscription_id: &str) -> FirehoseStreams {
        let (record_tx, records) = mpsc::channel(self.buffer);
        let (error_tx, errors) = mpsc::unbounded_channel();
        let subscription_id = subscription_id.to_string();

        tokio::spawn(async move {
            log::info!("Firehose subscription {} started", subscription_id);

            let mut reader = BufReader::new(self.input);
            let mut line = Vec::new();
            let mut line_number = 0u64;

            loop {
                line.clear();
                match reader.read_until(b'\n', &mut line).await {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) => {
                        let _ = error_tx.send(FirehoseError::Io(e));
                        break;
                    }
                }
                line_number += 1;

                if line.trim_ascii().is_empty() {
                    continue;
                }

                // Bad bytes only cost this line, never the stream
                match EventRecord::from_json_slice(&line) {
                    Ok(record) => {
                        if record_tx.send(record).await.is_err() {
                            log::debug!("Record receiver dropped, stopping firehose reader");
                            break;
                        }
                    }
                    Err(source) => {
                        let _ = error_tx.send(FirehoseError::Decode {
                            line: line_number,
                            source,
                        });
                    }
                }
            }

            log::info!(
                "Firehose subscription {} ended after {} lines",
                subscription_id,
                line_number
            );
        });

        FirehoseStreams { records, errors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;

    #[tokio::test]
    async fn test_records_arrive_in_order_and_bad_lines_go_to_errors() {
        let input = concat!(
            r#"{"eventType":"LogMessage","origin":"rep"}"#,
            "\n",
            "garbage\n",
            "\n",
            r#"{"eventType":"ValueMetric","origin":"gorouter"}"#,
            "\n",
        );

        let streams = JsonlFirehose::new(input.as_bytes()).subscribe("test");
        let FirehoseStreams {
            mut records,
            mut errors,
        } = streams;

        let first = records.recv().await.unwrap();
        let second = records.recv().await.unwrap();
        assert_eq!(first.event_type, EventType::LogMessage);
        assert_eq!(second.origin, "gorouter");
        assert!(records.recv().await.is_none(), "stream closes at end of input");

        match errors.recv().await {
            Some(FirehoseError::Decode { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected decode error, got {:?}", other),
        }
        assert!(errors.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_skipped() {
        let input: &[u8] = b"{\"origin\":\"a\"}\n\xff\xfe\n{\"origin\":\"b\"}\n";

        let FirehoseStreams {
            mut records,
            mut errors,
        } = JsonlFirehose::new(input).subscribe("test");

        let mut origins = Vec::new();
        while let Some(record) = records.recv().await {
            origins.push(record.origin);
        }
        assert_eq!(origins, vec!["a".to_string(), "b".to_string()]);

        match errors.recv().await {
            Some(FirehoseError::Decode { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected decode error, got {:?}", other),
        }
        assert!(errors.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_open_file_source() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"eventType":"CounterEvent","job":"router"}}"#).unwrap();
        file.flush().unwrap();

        let source = JsonlFirehose::open(file.path().to_str().unwrap())
            .await
            .unwrap();
        let mut streams = source.with_buffer(1).subscribe("file");

        let record = streams.records.recv().await.unwrap();
        assert_eq!(record.job, "router");
        assert!(streams.records.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_open_missing_file_fails() {
        assert!(JsonlFirehose::open("/nonexistent/envelopes.jsonl").await.is_err());
    }
}
