//! Multi-source aggregation and name-based deduplication.

use std::collections::HashSet;

use async_trait::async_trait;
use sidequest_shared::{Result, SidequestError, SourceExperience, SourcesConfig};
use tracing::{debug, info, instrument, warn};

use crate::{ExperienceSource, RedditSource, SocialSource, TravelGuideSource, build_client};

/// Anything that can produce the deduplicated listing set for a city.
///
/// The cache refreshes through this seam, so tests can count or fail fetches
/// without touching the network.
#[async_trait]
pub trait ExperienceFetcher: Send + Sync {
    async fn fetch_all(&self, city: &str) -> Result<Vec<SourceExperience>>;
}

/// Queries each registered source in order and merges the results.
pub struct SourceAggregator {
    sources: Vec<Box<dyn ExperienceSource>>,
}

impl SourceAggregator {
    pub fn new(sources: Vec<Box<dyn ExperienceSource>>) -> Self {
        Self { sources }
    }

    /// Guides first, then the social feeds, then reddit (when enabled).
    /// Earlier sources win name collisions during deduplication.
    pub fn from_config(config: &SourcesConfig) -> Result<Self> {
        let client = build_client(config.request_timeout_secs)?;

        let mut sources: Vec<Box<dyn ExperienceSource>> = vec![
            Box::new(TravelGuideSource::new(
                client.clone(),
                config.guides.clone(),
                config.guide_min_items,
            )),
            Box::new(SocialSource::instagram()),
            Box::new(SocialSource::twitter()),
        ];
        if config.reddit_enabled {
            sources.push(Box::new(RedditSource::new(
                client,
                &config.reddit_base_url,
                config.subreddits.clone(),
                config.reddit_limit,
            )?));
        }

        Ok(Self::new(sources))
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl ExperienceFetcher for SourceAggregator {
    /// Errors with [`SidequestError::SourcesExhausted`] only when every
    /// source failed. Sources that succeed with zero listings count as success.
    #[instrument(skip_all, fields(city = %city, sources = self.sources.len()))]
    async fn fetch_all(&self, city: &str) -> Result<Vec<SourceExperience>> {
        let mut all = Vec::new();
        let mut failed = 0usize;

        for source in &self.sources {
            match source.fetch(city).await {
                Ok(items) => {
                    debug!(source = source.name(), count = items.len(), "source fetched");
                    all.extend(items);
                }
                Err(e) => {
                    failed += 1;
                    warn!(source = source.name(), error = %e, "source failed");
                }
            }
        }

        if !self.sources.is_empty() && failed == self.sources.len() {
            return Err(SidequestError::SourcesExhausted(city.to_string()));
        }

        let raw = all.len();
        let unique = dedup(all);
        info!(raw, unique = unique.len(), failed, "aggregated experiences");
        Ok(unique)
    }
}

// ---------------------------------------------------------------------------
// Dedup
// ---------------------------------------------------------------------------

/// Normalized name used for duplicate detection: lowercased and trimmed,
/// then reduced to alphanumerics and whitespace. Trimming happens first, so
/// whitespace left behind by stripped punctuation is kept.
pub fn fingerprint(name: &str) -> String {
    name.to_lowercase()
        .trim()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect()
}

/// Keep the first listing for each fingerprint, preserving order.
pub fn dedup(items: Vec<SourceExperience>) -> Vec<SourceExperience> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(fingerprint(&item.name)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        name: &'static str,
        names: Vec<&'static str>,
    }

    #[async_trait]
    impl ExperienceSource for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, city: &str) -> Result<Vec<SourceExperience>> {
            Ok(self
                .names
                .iter()
                .map(|n| SourceExperience::new(*n, self.name, "art", city))
                .collect())
        }
    }

    struct Broken(&'static str);

    #[async_trait]
    impl ExperienceSource for Broken {
        fn name(&self) -> &str {
            self.0
        }

        async fn fetch(&self, _city: &str) -> Result<Vec<SourceExperience>> {
            Err(SidequestError::source_failure(self.0, "connection refused"))
        }
    }

    #[test]
    fn fingerprint_normalizes() {
        assert_eq!(fingerprint("Clay Studio"), "clay studio");
        assert_eq!(fingerprint("  clay studio!  "), "clay studio");
        assert_eq!(fingerprint("Tipu Sultan's Palace"), "tipu sultans palace");
        assert_eq!(fingerprint("clay studio !"), "clay studio ");
    }

    #[test]
    fn dedup_keeps_first_and_is_idempotent() {
        let items = vec![
            SourceExperience::new("Clay Studio", "guide", "craft", "Bangalore"),
            SourceExperience::new("clay studio!", "instagram", "craft", "Bangalore"),
            SourceExperience::new("Night Market", "reddit", "shopping", "Bangalore"),
        ];
        let once = dedup(items);
        assert_eq!(once.len(), 2);
        assert_eq!(once[0].source_name, "guide");
        assert_eq!(once[1].name, "Night Market");

        let twice = dedup(once.clone());
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn failing_source_does_not_block_others() {
        let aggregator = SourceAggregator::new(vec![
            Box::new(Broken("guides")),
            Box::new(Fixed {
                name: "instagram",
                names: vec!["Clay Studio", "Silent Disco"],
            }),
            Box::new(Fixed {
                name: "reddit",
                names: vec!["CLAY STUDIO", "Book Exchange"],
            }),
        ]);

        let items = aggregator.fetch_all("Bangalore").await.unwrap();
        let names: Vec<_> = items.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Clay Studio", "Silent Disco", "Book Exchange"]);
        assert_eq!(items[0].source_name, "instagram");
    }

    #[tokio::test]
    async fn all_sources_failing_is_exhausted() {
        let aggregator =
            SourceAggregator::new(vec![Box::new(Broken("guides")), Box::new(Broken("reddit"))]);
        let err = aggregator.fetch_all("Mysore").await.unwrap_err();
        assert!(matches!(err, SidequestError::SourcesExhausted(city) if city == "Mysore"));
    }

    #[tokio::test]
    async fn empty_success_is_not_failure() {
        let aggregator = SourceAggregator::new(vec![
            Box::new(Broken("guides")),
            Box::new(Fixed {
                name: "instagram",
                names: vec![],
            }),
        ]);
        let items = aggregator.fetch_all("Bangalore").await.unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn from_config_orders_sources() {
        let config = SourcesConfig::default();
        let aggregator = SourceAggregator::from_config(&config).unwrap();
        assert_eq!(
            aggregator.source_names(),
            vec!["travel_guide", "instagram", "twitter", "reddit"]
        );

        let no_reddit = SourcesConfig {
            reddit_enabled: false,
            ..SourcesConfig::default()
        };
        let aggregator = SourceAggregator::from_config(&no_reddit).unwrap();
        assert_eq!(aggregator.source_names().len(), 3);
    }
}
