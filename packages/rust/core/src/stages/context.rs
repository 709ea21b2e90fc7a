//! Context: cultural annotations per discovered experience.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sidequest_shared::{ContextNote, Experience};

use super::{NO_EXPERIENCES, StageOutcome, StageRunner, prompts};
use crate::trace::{StageId, StageSummary};

#[derive(Debug, Clone, Serialize)]
pub struct ContextInput {
    pub city: String,
    pub solo_preference: bool,
    pub crowd_preference: String,
    pub experiences: Vec<Experience>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContextReply {
    cultural_context: BTreeMap<String, ContextNote>,
}

pub async fn run(
    input: &ContextInput,
    runner: &StageRunner,
) -> StageOutcome<BTreeMap<String, ContextNote>> {
    if input.experiences.is_empty() {
        return StageOutcome::skipped(StageId::Context, NO_EXPERIENCES);
    }

    runner
        .execute(
            StageId::Context,
            prompts::CONTEXT,
            input,
            |reply: ContextReply| reply.cultural_context,
            |notes: &BTreeMap<String, ContextNote>| StageSummary::Context {
                contexts_added: notes.len(),
            },
        )
        .await
}
