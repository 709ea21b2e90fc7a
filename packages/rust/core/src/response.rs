//! Outbound result of one pipeline run.

use std::collections::BTreeMap;

use serde::Serialize;
use sidequest_shared::{
    BudgetBreakdown, CollisionSuggestion, ContextNote, Experience, ScaffoldingNote, SessionId,
};

use crate::state::PipelineState;
use crate::trace::{ErrorEntry, StageId, TraceEntry};

#[derive(Debug, Clone, Serialize)]
pub struct ItineraryResponse {
    pub narrative_itinerary: String,
    pub experiences: Vec<Experience>,
    pub cultural_context: BTreeMap<String, ContextNote>,
    pub budget_breakdown: Option<BudgetBreakdown>,
    pub social_scaffolding: BTreeMap<String, ScaffoldingNote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collision_suggestion: Option<CollisionSuggestion>,
    pub agent_trace: Vec<TraceEntry>,
    pub errors: Vec<ErrorEntry>,
    pub session_id: SessionId,
}

impl ItineraryResponse {
    /// The trace entry a stage produced, if it ran.
    pub fn stage_trace(&self, stage: StageId) -> Option<&TraceEntry> {
        self.agent_trace.iter().find(|entry| entry.stage == stage)
    }
}

impl From<PipelineState> for ItineraryResponse {
    fn from(state: PipelineState) -> Self {
        state.into_response()
    }
}
