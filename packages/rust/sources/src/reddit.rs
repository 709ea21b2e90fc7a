//! Reddit search source.
//!
//! Queries `/r/<subreddit>/search.json` for each configured subreddit and
//! turns post titles into listings, categorized by keyword.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use sidequest_shared::{Result, SidequestError, SourceExperience};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::{ExperienceSource, truncate_chars};

/// Titles shorter than this are too vague to be an experience.
const MIN_TITLE_CHARS: usize = 10;
const MAX_NAME_CHARS: usize = 100;
const MAX_DESCRIPTION_CHARS: usize = 300;

/// Keyword table, checked in order; the first matching category wins.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("food", &["food", "eat", "restaurant", "cafe", "dosa", "biryani", "breakfast"]),
    ("craft", &["pottery", "craft", "workshop", "class", "diy"]),
    ("heritage", &["heritage", "history", "temple", "museum", "palace", "fort"]),
    ("nature", &["park", "lake", "trek", "hike", "garden", "nature", "sunrise"]),
    ("music", &["music", "concert", "gig", "jazz", "band", "live"]),
    ("fitness", &["yoga", "run", "cycling", "fitness", "gym"]),
    ("shopping", &["market", "shopping", "bazaar", "flea", "thrift"]),
];

const DEFAULT_CATEGORY: &str = "art";

// ---------------------------------------------------------------------------
// Response shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchListing {
    data: SearchData,
}

#[derive(Debug, Default, Deserialize)]
struct SearchData {
    #[serde(default)]
    children: Vec<SearchChild>,
}

#[derive(Debug, Deserialize)]
struct SearchChild {
    data: Post,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Post {
    title: String,
    selftext: String,
    permalink: String,
}

// ---------------------------------------------------------------------------
// RedditSource
// ---------------------------------------------------------------------------

pub struct RedditSource {
    client: Client,
    base_url: Url,
    subreddits: Vec<String>,
    limit: usize,
}

impl RedditSource {
    pub fn new(
        client: Client,
        base_url: &str,
        subreddits: Vec<String>,
        limit: usize,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            SidequestError::config(format!("invalid reddit base URL '{base_url}': {e}"))
        })?;
        Ok(Self {
            client,
            base_url,
            subreddits,
            limit,
        })
    }

    fn search_url(&self, subreddit: &str, city: &str) -> Result<Url> {
        let mut url = self
            .base_url
            .join(&format!("r/{subreddit}/search.json"))
            .map_err(|e| SidequestError::config(format!("invalid subreddit '{subreddit}': {e}")))?;
        url.query_pairs_mut()
            .append_pair("q", &format!("things to do {city} OR hidden gem {city}"))
            .append_pair("restrict_sr", "true")
            .append_pair("sort", "relevance")
            .append_pair("t", "year")
            .append_pair("limit", &self.limit.to_string());
        Ok(url)
    }

    async fn search(&self, subreddit: &str, city: &str) -> Result<Vec<SourceExperience>> {
        let url = self.search_url(subreddit, city)?;
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| SidequestError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SidequestError::Network(format!("{url}: HTTP {status}")));
        }

        let listing: SearchListing = response
            .json()
            .await
            .map_err(|e| SidequestError::parse(format!("{url}: malformed search response: {e}")))?;

        Ok(listing
            .data
            .children
            .into_iter()
            .filter_map(|child| self.post_to_experience(child.data, city))
            .collect())
    }

    fn post_to_experience(&self, post: Post, city: &str) -> Option<SourceExperience> {
        let title = post.title.trim();
        if title.chars().count() < MIN_TITLE_CHARS {
            return None;
        }
        let category = categorize(&format!("{title} {}", post.selftext));
        let mut exp = SourceExperience::new(
            truncate_chars(title, MAX_NAME_CHARS),
            self.name(),
            category,
            city,
        );
        exp.description = truncate_chars(post.selftext.trim(), MAX_DESCRIPTION_CHARS);
        if !post.permalink.is_empty() {
            exp.source_url = self.base_url.join(&post.permalink).ok().map(String::from);
        }
        Some(exp)
    }
}

#[async_trait]
impl ExperienceSource for RedditSource {
    fn name(&self) -> &str {
        "reddit"
    }

    /// Fails only when every subreddit request fails.
    #[instrument(skip_all, fields(city = %city))]
    async fn fetch(&self, city: &str) -> Result<Vec<SourceExperience>> {
        let mut items = Vec::new();
        let mut last_error = None;
        let mut succeeded = 0usize;

        for subreddit in &self.subreddits {
            match self.search(subreddit, city).await {
                Ok(found) => {
                    debug!(subreddit, count = found.len(), "reddit search done");
                    succeeded += 1;
                    items.extend(found);
                }
                Err(e) => {
                    warn!(subreddit, error = %e, "reddit search failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if succeeded == 0 => Err(SidequestError::source_failure("reddit", e.to_string())),
            _ => Ok(items),
        }
    }
}

/// Pick a category from free text by keyword. Keywords match whole words,
/// allowing a plural `s`/`es`.
pub fn categorize(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, words)| {
            words
                .iter()
                .any(|w| tokens.iter().any(|t| keyword_matches(t, w)))
        })
        .map(|(category, _)| *category)
        .unwrap_or(DEFAULT_CATEGORY)
}

fn keyword_matches(token: &str, keyword: &str) -> bool {
    token == keyword
        || token.strip_suffix('s') == Some(keyword)
        || token.strip_suffix("es") == Some(keyword)
}
