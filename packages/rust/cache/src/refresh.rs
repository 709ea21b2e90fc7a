//! Background refresh worker.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{CacheInner, cache_key};

/// Handle to a running refresh task.
pub(crate) struct RefreshWorker {
    pub cancel: CancellationToken,
    pub handle: JoinHandle<()>,
}

impl RefreshWorker {
    pub fn spawn(inner: Arc<CacheInner>, cities: Vec<String>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_refresh(inner, cities, interval, cancel.clone()));
        Self { cancel, handle }
    }

    /// Signal the worker and wait up to `timeout` for it to exit. A worker
    /// stuck in a fetch past the deadline is aborted.
    pub async fn stop(self, timeout: Duration) {
        self.cancel.cancel();
        let abort = self.handle.abort_handle();

        match time::timeout(timeout, self.handle).await {
            Ok(Ok(())) => info!("cache refresh worker stopped"),
            Ok(Err(e)) => warn!(error = %e, "cache refresh worker ended abnormally"),
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "cache refresh worker did not stop in time, aborting");
                abort.abort();
            }
        }
    }
}

/// Refresh every city each interval until cancelled. The first cycle runs
/// immediately. Cancellation is observed between cycles.
async fn run_refresh(
    inner: Arc<CacheInner>,
    cities: Vec<String>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => refresh_cycle(&inner, &cities).await,
            () = cancel.cancelled() => {
                debug!("cache refresh worker cancelled");
                return;
            }
        }
    }
}

async fn refresh_cycle(inner: &CacheInner, cities: &[String]) {
    let mut refreshed = 0usize;
    for city in cities {
        match inner.fetcher.fetch_all(city).await {
            Ok(data) => {
                let count = data.len();
                inner.insert(cache_key(city, None), data).await;
                refreshed += 1;
                debug!(city = %city, count, "refreshed city");
            }
            Err(e) => warn!(city = %city, error = %e, "refresh failed for city"),
        }
    }
    info!(refreshed, total = cities.len(), "cache refresh cycle complete");
}
