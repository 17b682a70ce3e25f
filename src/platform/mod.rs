//! Platform access: the API client and its refreshable shared handle

pub mod client;

pub use client::{ClientConfig, ClientError, PlatformClient};

use crate::resolver::{AppInfo, AppLookup, LookupError};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant};

/// Atomically swappable handle to the current client
///
/// Readers always observe a fully built client: a refresh publishes a new
/// `Arc` in one step and in-flight lookups keep the one they loaded.
#[derive(Debug)]
pub struct SharedClient<T>(Arc<ArcSwap<T>>);

impl<T> Clone for SharedClient<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> SharedClient<T> {
    pub fn new(client: T) -> Self {
        Self(Arc::new(ArcSwap::from_pointee(client)))
    }

    /// The most recently published client
    pub fn current(&self) -> Arc<T> {
        self.0.load_full()
    }

    pub fn publish(&self, client: T) {
        self.0.store(Arc::new(client));
    }
}

#[async_trait]
impl<T> AppLookup for SharedClient<T>
where
    T: AppLookup + 'static,
{
    async fn lookup_app(&self, app_id: &str) -> Result<AppInfo, LookupError> {
        let client = self.current();
        client.lookup_app(app_id).await
    }
}

/// Rebuild the client every `every` and publish it, but only on success
///
/// A failed refresh is logged and the previous client stays in use until a
/// later refresh succeeds. Runs until the task is dropped.
pub async fn token_refresh_task<T, F, Fut, E>(handle: SharedClient<T>, every: Duration, connect: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    log::info!("Token refresh task started (interval: {}s)", every.as_secs());

    // First tick is one full interval out: the startup client is fresh
    let Some(start) = Instant::now().checked_add(every) else {
        log::warn!("Token refresh interval too large, refresh disabled");
        return std::future::pending().await;
    };
    let mut timer = interval_at(start, every);

    loop {
        timer.tick().await;

        match connect().await {
            Ok(client) => {
                handle.publish(client);
                log::info!("Refreshed platform client, got new token");
            }
            Err(e) => {
                log::error!("Failed to refresh platform client, keeping previous token: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_publish_replaces_current() {
        let handle = SharedClient::new(1u32);
        let reader = handle.clone();
        let held = reader.current();

        handle.publish(2);

        assert_eq!(*held, 1);
        assert_eq!(*reader.current(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_swaps_only_on_success() {
        let handle = SharedClient::new(0u32);
        let attempts = Arc::new(AtomicU32::new(0));

        let task_handle = handle.clone();
        let task_attempts = attempts.clone();
        let task = tokio::spawn(token_refresh_task(
            task_handle,
            Duration::from_secs(60),
            move || {
                let attempt = task_attempts.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    // Every second attempt fails
                    if attempt % 2 == 0 {
                        Err(format!("refresh {} rejected", attempt))
                    } else {
                        Ok(attempt)
                    }
                }
            },
        ));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(*handle.current(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(*handle.current(), 1, "failed refresh must keep the old client");

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(*handle.current(), 3);

        task.abort();
    }
}
