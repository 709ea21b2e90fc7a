//! Per-run pipeline state.
//!
//! Inputs are fixed at construction. Each output field is written only
//! through its stage's `apply_*` method, and every apply appends exactly the
//! trace and error entries that stage produced.

use std::collections::BTreeMap;

use sidequest_shared::{
    BudgetBreakdown, CollisionSuggestion, ContextNote, Experience, ItineraryRequest, Result,
    ScaffoldingNote, SessionId, SidequestError,
};

use crate::response::ItineraryResponse;
use crate::stages::StageOutcome;
use crate::stages::community::CommunityInput;
use crate::stages::context::ContextInput;
use crate::stages::costing::CostingInput;
use crate::stages::discovery::DiscoveryInput;
use crate::stages::synthesis::{
    self, DEFAULT_AVAILABLE_HOURS, DEFAULT_START_TIME, SynthesisInput, SynthesisOutput,
};
use crate::trace::{ErrorEntry, TraceEntry};

#[derive(Debug, Clone)]
pub struct PipelineState {
    session_id: SessionId,
    request: ItineraryRequest,

    discovered: Vec<Experience>,
    context: BTreeMap<String, ContextNote>,
    scaffolding: BTreeMap<String, ScaffoldingNote>,
    narrative: String,
    collision: Option<CollisionSuggestion>,
    cost: Option<BudgetBreakdown>,

    trace: Vec<TraceEntry>,
    errors: Vec<ErrorEntry>,
}

impl PipelineState {
    /// Validate the request and build a fresh state with a new session id.
    pub fn from_request(request: &ItineraryRequest) -> Result<Self> {
        validate(request)?;
        Ok(Self {
            session_id: SessionId::new(),
            request: request.clone(),
            discovered: Vec::new(),
            context: BTreeMap::new(),
            scaffolding: BTreeMap::new(),
            narrative: String::new(),
            collision: None,
            cost: None,
            trace: Vec::new(),
            errors: Vec::new(),
        })
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn request(&self) -> &ItineraryRequest {
        &self.request
    }

    pub fn discovered(&self) -> &[Experience] {
        &self.discovered
    }

    pub fn context(&self) -> &BTreeMap<String, ContextNote> {
        &self.context
    }

    pub fn scaffolding(&self) -> &BTreeMap<String, ScaffoldingNote> {
        &self.scaffolding
    }

    pub fn narrative(&self) -> &str {
        &self.narrative
    }

    pub fn collision(&self) -> Option<&CollisionSuggestion> {
        self.collision.as_ref()
    }

    pub fn cost(&self) -> Option<&BudgetBreakdown> {
        self.cost.as_ref()
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    pub fn errors(&self) -> &[ErrorEntry] {
        &self.errors
    }

    /// Append a run-level trace entry.
    pub(crate) fn record(&mut self, entry: TraceEntry) {
        self.trace.push(entry);
    }

    /// `(succeeded, failed)` stage counts so far.
    pub fn stage_counts(&self) -> (usize, usize) {
        let succeeded = self.trace.iter().filter(|e| e.is_success()).count();
        let failed = self.trace.iter().filter(|e| e.is_error()).count();
        (succeeded, failed)
    }

    // -----------------------------------------------------------------------
    // Stage read sets
    // -----------------------------------------------------------------------

    pub fn discovery_input(&self) -> DiscoveryInput {
        let r = &self.request;
        DiscoveryInput {
            query: r.query.clone(),
            city: r.city.clone(),
            budget_min: r.budget_min,
            budget_max: r.budget_max,
            party_size: r.party_size,
            solo_preference: r.solo_preference,
            crowd_preference: r.crowd_preference.clone(),
            interest_pods: r.interest_pods.clone(),
            social_media_urls: r.social_media_urls.clone(),
            start_date: r.start_date.clone(),
            end_date: r.end_date.clone(),
            available_hours: r.available_hours,
            start_time: r.start_time.clone(),
            candidates: Vec::new(),
        }
    }

    pub fn context_input(&self) -> ContextInput {
        ContextInput {
            city: self.request.city.clone(),
            solo_preference: self.request.solo_preference,
            crowd_preference: self.request.crowd_preference.clone(),
            experiences: self.discovered.clone(),
        }
    }

    pub fn community_input(&self) -> CommunityInput {
        CommunityInput {
            city: self.request.city.clone(),
            solo_preference: self.request.solo_preference,
            crowd_preference: self.request.crowd_preference.clone(),
            experiences: self.discovered.clone(),
        }
    }

    pub fn synthesis_input(&self) -> SynthesisInput {
        let r = &self.request;
        let start_time = r
            .start_time
            .clone()
            .unwrap_or_else(|| DEFAULT_START_TIME.to_string());
        let available_hours = r.available_hours.unwrap_or(DEFAULT_AVAILABLE_HOURS);
        SynthesisInput {
            query: r.query.clone(),
            city: r.city.clone(),
            interest_pods: r.interest_pods.clone(),
            experiences: self.discovered.clone(),
            cultural_context: self.context.clone(),
            social_scaffolding: self.scaffolding.clone(),
            start_date: r.start_date.clone(),
            end_time: synthesis::end_time(&start_time, available_hours),
            start_time,
            available_hours,
        }
    }

    pub fn costing_input(&self) -> CostingInput {
        CostingInput {
            city: self.request.city.clone(),
            budget_min: self.request.budget_min,
            budget_max: self.request.budget_max,
            party_size: self.request.party_size,
            experiences: self.discovered.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Stage writes
    // -----------------------------------------------------------------------

    fn absorb<T>(&mut self, outcome: StageOutcome<T>) -> T {
        self.trace.push(outcome.trace);
        if let Some(error) = outcome.error {
            self.errors.push(error);
        }
        outcome.output
    }

    pub fn apply_discovery(&mut self, outcome: StageOutcome<Vec<Experience>>) {
        self.discovered = self.absorb(outcome);
    }

    pub fn apply_context(&mut self, outcome: StageOutcome<BTreeMap<String, ContextNote>>) {
        self.context = self.absorb(outcome);
    }

    pub fn apply_community(&mut self, outcome: StageOutcome<BTreeMap<String, ScaffoldingNote>>) {
        self.scaffolding = self.absorb(outcome);
    }

    pub fn apply_synthesis(&mut self, outcome: StageOutcome<SynthesisOutput>) {
        let output = self.absorb(outcome);
        self.narrative = output.narrative;
        self.collision = output.collision;
    }

    pub fn apply_costing(&mut self, outcome: StageOutcome<Option<BudgetBreakdown>>) {
        self.cost = self.absorb(outcome);
    }

    /// Project into the outbound response shape.
    pub fn into_response(self) -> ItineraryResponse {
        ItineraryResponse {
            narrative_itinerary: self.narrative,
            experiences: self.discovered,
            cultural_context: self.context,
            budget_breakdown: self.cost,
            social_scaffolding: self.scaffolding,
            collision_suggestion: self.collision.filter(|c| !c.title.trim().is_empty()),
            agent_trace: self.trace,
            errors: self.errors,
            session_id: self.session_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A plan covers at most one day.
const MAX_AVAILABLE_HOURS: f64 = 24.0;

fn validate(request: &ItineraryRequest) -> Result<()> {
    if request.city.trim().is_empty() {
        return Err(SidequestError::validation("city must not be blank"));
    }
    if request.budget_min < 0 || request.budget_max < 0 {
        return Err(SidequestError::validation("budget must not be negative"));
    }
    if request.budget_min > request.budget_max {
        return Err(SidequestError::validation(format!(
            "budget_min ({}) exceeds budget_max ({})",
            request.budget_min, request.budget_max
        )));
    }
    if request.party_size == 0 {
        return Err(SidequestError::validation("party_size must be at least 1"));
    }
    if let Some(hours) = request.available_hours {
        if !hours.is_finite() || hours <= 0.0 || hours > MAX_AVAILABLE_HOURS {
            return Err(SidequestError::validation(format!(
                "available_hours must be in (0, {MAX_AVAILABLE_HOURS}], got {hours}"
            )));
        }
    }
    if let Some(start) = &request.start_time {
        if synthesis::parse_clock(start).is_none() {
            return Err(SidequestError::validation(format!(
                "start_time must be HH:MM, got '{start}'"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use sidequest_shared::DefaultsConfig;

    use super::*;
    use crate::trace::{StageId, StageSummary};

    fn request() -> ItineraryRequest {
        ItineraryRequest::with_defaults("hidden gems", &DefaultsConfig::default())
    }

    fn experience(name: &str) -> Experience {
        Experience {
            name: name.into(),
            ..Default::default()
        }
    }

    #[test]
    fn rejects_malformed_requests() {
        let cases: [fn(&mut ItineraryRequest); 8] = [
            |r: &mut ItineraryRequest| r.city = "  ".into(),
            |r: &mut ItineraryRequest| r.budget_min = -1,
            |r: &mut ItineraryRequest| {
                r.budget_min = 6000;
                r.budget_max = 5000;
            },
            |r: &mut ItineraryRequest| r.party_size = 0,
            |r: &mut ItineraryRequest| r.available_hours = Some(0.0),
            |r: &mut ItineraryRequest| r.available_hours = Some(24.5),
            |r: &mut ItineraryRequest| r.available_hours = Some(1e18),
            |r: &mut ItineraryRequest| r.start_time = Some("25:00".into()),
        ];
        for mutate in cases {
            let mut r = request();
            mutate(&mut r);
            let err = PipelineState::from_request(&r).unwrap_err();
            assert!(matches!(err, SidequestError::Validation { .. }), "{err}");
        }
    }

    #[test]
    fn fresh_state_is_empty() {
        let state = PipelineState::from_request(&request()).unwrap();
        assert!(state.discovered().is_empty());
        assert!(state.trace().is_empty());
        assert!(state.cost().is_none());
        assert_eq!(state.stage_counts(), (0, 0));
    }

    #[test]
    fn branch_inputs_are_independent_copies() {
        let mut state = PipelineState::from_request(&request()).unwrap();
        state.apply_discovery(StageOutcome::success(
            StageId::Discovery,
            Instant::now(),
            vec![experience("Clay Studio")],
            StageSummary::Discovery {
                experiences_found: 1,
                candidates_offered: 0,
            },
        ));

        let mut context = state.context_input();
        let community = state.community_input();
        context.experiences[0].name = "Mutated".into();
        context.experiences.push(experience("Extra"));

        assert_eq!(community.experiences.len(), 1);
        assert_eq!(community.experiences[0].name, "Clay Studio");
        assert_eq!(state.discovered()[0].name, "Clay Studio");
    }

    #[test]
    fn synthesis_window_defaults() {
        let mut r = request();
        r.start_time = None;
        r.available_hours = None;
        let input = PipelineState::from_request(&r).unwrap().synthesis_input();
        assert_eq!(input.start_time, "10:00");
        assert_eq!(input.end_time, "18:00");
    }

    #[test]
    fn apply_records_trace_and_error() {
        let mut state = PipelineState::from_request(&request()).unwrap();
        state.apply_context(StageOutcome::failed(StageId::Context, Instant::now(), "boom"));

        assert!(state.context().is_empty());
        assert_eq!(state.trace().len(), 1);
        assert_eq!(state.errors().len(), 1);
        assert_eq!(state.stage_counts(), (0, 1));
    }
}
