//! Social feeds backed by built-in listings.

use async_trait::async_trait;
use sidequest_shared::{Result, SourceExperience};
use tracing::debug;

use crate::ExperienceSource;
use crate::curated::{CuratedListing, INSTAGRAM_FEED, TWITTER_FEED};

/// A social platform feed. Live platform APIs are not queried; each feed
/// serves a fixed set of listings tagged with the platform name.
pub struct SocialSource {
    name: &'static str,
    feed: &'static [CuratedListing],
}

impl SocialSource {
    pub fn instagram() -> Self {
        Self {
            name: "instagram",
            feed: INSTAGRAM_FEED,
        }
    }

    pub fn twitter() -> Self {
        Self {
            name: "twitter",
            feed: TWITTER_FEED,
        }
    }
}

#[async_trait]
impl ExperienceSource for SocialSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch(&self, city: &str) -> Result<Vec<SourceExperience>> {
        debug!(source = self.name, city, count = self.feed.len(), "serving social feed");
        Ok(self
            .feed
            .iter()
            .map(|listing| listing.to_experience(self.name))
            .collect())
    }
}
