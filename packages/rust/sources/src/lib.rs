//! Experience sources and the multi-source aggregator.
//!
//! This crate provides:
//! - [`ExperienceSource`]: one independently failing listing provider
//! - Built-in sources: [`RedditSource`], [`TravelGuideSource`], [`SocialSource`]
//! - [`SourceAggregator`]: queries every source, isolates failures, deduplicates

pub mod aggregator;
mod curated;
pub mod guides;
pub mod reddit;
pub mod social;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use sidequest_shared::{Result, SidequestError, SourceExperience};

pub use aggregator::{ExperienceFetcher, SourceAggregator, dedup, fingerprint};
pub use guides::TravelGuideSource;
pub use reddit::RedditSource;
pub use social::SocialSource;

/// User-Agent string for source requests.
const USER_AGENT: &str = concat!("Sidequest/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A named provider of experience listings for a city.
///
/// Sources are tried independently by the aggregator; an `Err` from one
/// source never prevents the others from being queried.
#[async_trait]
pub trait ExperienceSource: Send + Sync {
    /// Source name recorded on every listing it produces.
    fn name(&self) -> &str;

    /// Fetch normalized listings for `city`.
    async fn fetch(&self, city: &str) -> Result<Vec<SourceExperience>>;
}

/// Build a reqwest client shared by the live sources.
pub fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| SidequestError::Network(format!("failed to build HTTP client: {e}")))
}

/// Truncate to at most `max_chars` characters without splitting a code point.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("Vidyarthi Bhavan", 9), "Vidyarthi");
        assert_eq!(truncate_chars("₹₹₹₹", 2), "₹₹");
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[test]
    fn client_builds() {
        assert!(build_client(5).is_ok());
    }
}
