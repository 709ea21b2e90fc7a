//! Community: solo-arrival and social dynamics per discovered experience.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sidequest_shared::{Experience, ScaffoldingNote};

use super::{NO_EXPERIENCES, StageOutcome, StageRunner, prompts};
use crate::trace::{StageId, StageSummary};

#[derive(Debug, Clone, Serialize)]
pub struct CommunityInput {
    pub city: String,
    pub solo_preference: bool,
    pub crowd_preference: String,
    pub experiences: Vec<Experience>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommunityReply {
    social_scaffolding: BTreeMap<String, ScaffoldingNote>,
}

pub async fn run(
    input: &CommunityInput,
    runner: &StageRunner,
) -> StageOutcome<BTreeMap<String, ScaffoldingNote>> {
    if input.experiences.is_empty() {
        return StageOutcome::skipped(StageId::Community, NO_EXPERIENCES);
    }

    runner
        .execute(
            StageId::Community,
            prompts::COMMUNITY,
            input,
            |reply: CommunityReply| reply.social_scaffolding,
            |notes: &BTreeMap<String, ScaffoldingNote>| StageSummary::Community {
                experiences_analyzed: notes.len(),
            },
        )
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::testing::{Reply, ScriptedGeneration};

    fn input() -> CommunityInput {
        CommunityInput {
            city: "Bangalore".into(),
            solo_preference: true,
            crowd_preference: "relatively_niche".into(),
            experiences: vec![Experience {
                name: "Silent Disco".into(),
                ..Default::default()
            }],
        }
    }

    #[tokio::test]
    async fn parses_scaffolding() {
        let generation = Arc::new(ScriptedGeneration::new().json(
            StageId::Community,
            json!({"social_scaffolding": {
                "Silent Disco": {"solo_friendly": true, "solo_percentage": "60%"}
            }}),
        ));
        let runner = StageRunner::new(generation, Duration::from_secs(1));

        let outcome = run(&input(), &runner).await;
        assert_eq!(outcome.output["Silent Disco"].solo_percentage, "60%");
        assert!(outcome.output["Silent Disco"].solo_friendly);
    }

    #[tokio::test]
    async fn backend_failure_degrades() {
        let generation =
            Arc::new(ScriptedGeneration::new().reply(StageId::Community, Reply::Fail("boom")));
        let runner = StageRunner::new(generation, Duration::from_secs(1));

        let outcome = run(&input(), &runner).await;
        assert!(outcome.output.is_empty());
        assert!(outcome.trace.is_error());
        assert!(outcome.error.unwrap().error.contains("boom"));
    }
}
