//! Discovery: find candidate experiences for the request.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sidequest_shared::{Experience, SourceExperience};
use tracing::warn;

use super::{StageOutcome, StageRunner, prompts};
use crate::trace::{StageId, StageSummary};

/// A cached source listing offered to the generator as grounding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateListing {
    pub name: String,
    pub category: String,
    pub description: String,
    pub location: String,
    pub budget_min: i64,
    pub budget_max: i64,
    pub timing: String,
    pub source: String,
}

impl From<SourceExperience> for CandidateListing {
    fn from(exp: SourceExperience) -> Self {
        Self {
            name: exp.name,
            category: exp.category,
            description: exp.description,
            location: exp.location,
            budget_min: exp.budget_min,
            budget_max: exp.budget_max,
            timing: exp.timing_label,
            source: exp.source_name,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryInput {
    pub query: String,
    pub city: String,
    pub budget_min: i64,
    pub budget_max: i64,
    pub party_size: u32,
    pub solo_preference: bool,
    pub crowd_preference: String,
    pub interest_pods: Vec<String>,
    pub social_media_urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<CandidateListing>,
}

impl DiscoveryInput {
    /// Whether there is anything to search for.
    pub fn has_intent(&self) -> bool {
        !self.query.trim().is_empty()
            || !self.interest_pods.is_empty()
            || !self.social_media_urls.is_empty()
    }

    /// Attach at most `max` listings as candidates.
    pub fn with_candidates(mut self, listings: Vec<SourceExperience>, max: usize) -> Self {
        self.candidates = listings
            .into_iter()
            .take(max)
            .map(CandidateListing::from)
            .collect();
        self
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DiscoveryReply {
    /// Items are decoded one at a time so a malformed item drops alone.
    discovered_experiences: Vec<Value>,
}

fn decode_experience(item: Value) -> Option<Experience> {
    match serde_json::from_value::<Experience>(item) {
        Ok(exp) if !exp.name.trim().is_empty() => Some(exp),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "dropping malformed discovered experience");
            None
        }
    }
}

pub async fn run(input: &DiscoveryInput, runner: &StageRunner) -> StageOutcome<Vec<Experience>> {
    if !input.has_intent() {
        return StageOutcome::skipped(StageId::Discovery, "no query, interests or social links");
    }

    let candidates_offered = input.candidates.len();
    runner
        .execute(
            StageId::Discovery,
            prompts::DISCOVERY,
            input,
            |reply: DiscoveryReply| {
                reply
                    .discovered_experiences
                    .into_iter()
                    .filter_map(decode_experience)
                    .collect()
            },
            |found: &Vec<Experience>| StageSummary::Discovery {
                experiences_found: found.len(),
                candidates_offered,
            },
        )
        .await
}
