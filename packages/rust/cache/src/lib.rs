//! TTL cache over aggregated experience listings, with an optional
//! background refresh worker.
//!
//! The entry table sits behind a single lock that is only held for table
//! access. Fetches through the [`ExperienceFetcher`] always happen with the
//! lock released, so concurrent misses on different keys do not serialize
//! on network latency. Two concurrent misses on the same key may both fetch;
//! the last write wins.

mod entry;
mod refresh;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sidequest_shared::{CacheOptions, Result, SidequestError, SourceExperience};
use sidequest_sources::ExperienceFetcher;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

pub use entry::{CacheEntry, CacheStats};
use refresh::RefreshWorker;

/// Entry key: lowercased, trimmed city, optionally suffixed with `:category`.
pub fn cache_key(city: &str, category: Option<&str>) -> String {
    let city = city.trim().to_lowercase();
    match category {
        Some(cat) => format!("{city}:{}", cat.trim().to_lowercase()),
        None => city,
    }
}

// ---------------------------------------------------------------------------
// Shared inner state
// ---------------------------------------------------------------------------

/// State shared between the cache handle and its refresh worker.
pub(crate) struct CacheInner {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    pub(crate) fetcher: Arc<dyn ExperienceFetcher>,
}

impl CacheInner {
    pub(crate) async fn insert(&self, key: String, data: Vec<SourceExperience>) {
        let entry = CacheEntry::new(data, self.ttl);
        self.entries.lock().await.insert(key, entry);
    }

    async fn live(&self, key: &str) -> Option<Vec<SourceExperience>> {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .filter(|entry| entry.is_live())
            .map(|entry| entry.data.clone())
    }
}

// ---------------------------------------------------------------------------
// RefreshingCache
// ---------------------------------------------------------------------------

/// Process-wide cache of source listings keyed by `(city, category?)`.
pub struct RefreshingCache {
    inner: Arc<CacheInner>,
    worker: Mutex<Option<RefreshWorker>>,
}

impl RefreshingCache {
    pub fn new(fetcher: Arc<dyn ExperienceFetcher>, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: Mutex::new(HashMap::new()),
                ttl,
                fetcher,
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn with_options(fetcher: Arc<dyn ExperienceFetcher>, options: &CacheOptions) -> Self {
        Self::new(fetcher, options.ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Live entry for the key, or `None`. Never fetches.
    pub async fn get(&self, city: &str, category: Option<&str>) -> Option<Vec<SourceExperience>> {
        self.inner.live(&cache_key(city, category)).await
    }

    /// Live entry for the key, fetching and storing on a miss.
    ///
    /// With a category, the full fetched set is filtered (case-insensitive)
    /// and stored under the category key only. Fetch errors propagate and
    /// nothing is stored.
    #[instrument(skip_all, fields(city = %city, category = ?category))]
    pub async fn get_or_fetch(
        &self,
        city: &str,
        category: Option<&str>,
    ) -> Result<Vec<SourceExperience>> {
        let key = cache_key(city, category);
        if let Some(data) = self.inner.live(&key).await {
            debug!(%key, count = data.len(), "cache hit");
            return Ok(data);
        }

        debug!(%key, "cache miss, fetching");
        let mut data = self.inner.fetcher.fetch_all(city).await?;
        if let Some(cat) = category {
            let wanted = cat.trim().to_lowercase();
            data.retain(|item| item.category.to_lowercase() == wanted);
        }

        self.inner.insert(key.clone(), data.clone()).await;
        info!(%key, count = data.len(), "cached experiences");
        Ok(data)
    }

    /// Insert or replace an entry with a fresh TTL.
    pub async fn store(&self, city: &str, category: Option<&str>, data: Vec<SourceExperience>) {
        self.inner.insert(cache_key(city, category), data).await;
    }

    /// Remove one entry. Returns whether it existed.
    pub async fn invalidate(&self, city: &str, category: Option<&str>) -> bool {
        let key = cache_key(city, category);
        let removed = self.inner.entries.lock().await.remove(&key).is_some();
        debug!(%key, removed, "invalidate");
        removed
    }

    /// Remove every entry. Returns how many were removed.
    pub async fn invalidate_all(&self) -> usize {
        let mut entries = self.inner.entries.lock().await;
        let count = entries.len();
        entries.clear();
        debug!(count, "invalidated all entries");
        count
    }

    pub async fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = self.inner.entries.lock().await;

        let expired_entries = entries.values().filter(|e| !e.is_live_at(now)).count();
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();

        CacheStats {
            total_entries: entries.len(),
            expired_entries,
            valid_entries: entries.len() - expired_entries,
            total_experiences: entries.values().map(|e| e.data.len()).sum(),
            keys,
        }
    }

    // -----------------------------------------------------------------------
    // Background refresh
    // -----------------------------------------------------------------------

    /// Start re-fetching `cities` every `interval`, ignoring TTL. Returns
    /// `Ok(false)` without side effects when a worker is already running.
    /// A zero interval is rejected.
    pub async fn start_background_refresh(
        &self,
        cities: Vec<String>,
        interval: Duration,
    ) -> Result<bool> {
        if interval.is_zero() {
            return Err(SidequestError::validation(
                "refresh interval must be greater than zero",
            ));
        }

        let mut worker = self.worker.lock().await;
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            debug!("cache refresh worker already running");
            return Ok(false);
        }

        info!(cities = ?cities, interval_secs = interval.as_secs(), "starting cache refresh worker");
        *worker = Some(RefreshWorker::spawn(Arc::clone(&self.inner), cities, interval));
        Ok(true)
    }

    /// Stop the worker, waiting at most `timeout`. Returns `false` when no
    /// worker was running.
    pub async fn stop_background_refresh(&self, timeout: Duration) -> bool {
        let Some(worker) = self.worker.lock().await.take() else {
            return false;
        };
        worker.stop(timeout).await;
        true
    }

    pub async fn is_refreshing(&self) -> bool {
        self.worker
            .lock()
            .await
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }
}

impl Drop for RefreshingCache {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.cancel.cancel();
        }
    }
}
