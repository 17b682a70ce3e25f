use std::fmt::Display;
use tokio::sync::mpsc;

/// Drain transport errors, logging each one
///
/// The channel is unbounded so producers never wait on the sink, and no
/// single error stops it. Returns how many errors were drained once every
/// sender is gone.
pub async fn run_error_sink<E: Display>(mut errors: mpsc::UnboundedReceiver<E>) -> u64 {
    let mut drained = 0u64;
    while let Some(err) = errors.recv().await {
        log::warn!("Firehose error: {}", err);
        drained += 1;
    }
    log::debug!("Error channel closed after {} errors", drained);
    drained
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sink_drains_everything_without_blocking_producer() {
        let (tx, rx) = mpsc::unbounded_channel::<String>();

        // Producer runs to completion before the sink even starts
        for i in 0..1_000 {
            tx.send(format!("websocket closed ({})", i)).unwrap();
        }
        drop(tx);

        assert_eq!(run_error_sink(rx).await, 1_000);
    }
}
