//! Cache entries and statistics.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sidequest_shared::SourceExperience;

/// One immutable snapshot of aggregator output. Refreshes replace entries
/// wholesale; nothing mutates `data` after insertion.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: Vec<SourceExperience>,
    pub created_at: Instant,
    pub expires_at: Instant,
    /// Wall-clock creation time, for display.
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(data: Vec<SourceExperience>, ttl: Duration) -> Self {
        Self::created_at(data, Instant::now(), ttl)
    }

    pub fn created_at(data: Vec<SourceExperience>, now: Instant, ttl: Duration) -> Self {
        Self {
            data,
            created_at: now,
            expires_at: now + ttl,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_live_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }

    pub fn is_live(&self) -> bool {
        self.is_live_at(Instant::now())
    }
}

/// Snapshot of the entry table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub valid_entries: usize,
    /// Listings across all entries, expired ones included.
    pub total_experiences: usize,
    /// Sorted entry keys.
    pub keys: Vec<String>,
}
