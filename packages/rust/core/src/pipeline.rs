//! End-to-end itinerary pipeline:
//! request → Discovery → {Context, Community} → Synthesis → Costing → response.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinError;
use tracing::{info, instrument, warn};

use sidequest_cache::RefreshingCache;
use sidequest_shared::{ItineraryRequest, PipelineOptions, Result, SourceExperience};

use crate::generation::GenerationService;
use crate::response::ItineraryResponse;
use crate::stages::{
    StageOutcome, StageRunner, community, context, costing, discovery, synthesis,
};
use crate::state::PipelineState;
use crate::trace::{StageId, TraceEntry};

/// Progress callback for reporting stage status.
pub trait PipelineObserver: Send + Sync {
    /// Called before a stage runs (both branch stages are announced together).
    fn stage_started(&self, stage: StageId);
    /// Called with the stage's trace entry once it has been merged.
    fn stage_finished(&self, entry: &TraceEntry);
}

/// No-op observer for headless/test usage.
pub struct SilentObserver;

impl PipelineObserver for SilentObserver {
    fn stage_started(&self, _stage: StageId) {}
    fn stage_finished(&self, _entry: &TraceEntry) {}
}

/// Runs the stage graph against a generation backend, optionally grounding
/// Discovery in cached source listings.
pub struct Orchestrator {
    runner: StageRunner,
    cache: Option<Arc<RefreshingCache>>,
    max_candidates: usize,
}

impl Orchestrator {
    pub fn new(generation: Arc<dyn GenerationService>, options: &PipelineOptions) -> Self {
        Self {
            runner: StageRunner::new(generation, options.stage_timeout),
            cache: None,
            max_candidates: options.max_candidates,
        }
    }

    pub fn with_cache(mut self, cache: Arc<RefreshingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Run every stage and project the result.
    ///
    /// Only a malformed request is an `Err`; stage failures are recorded in
    /// the trace and error list and the affected outputs stay empty.
    #[instrument(skip_all, fields(city = %request.city))]
    pub async fn run(
        &self,
        request: &ItineraryRequest,
        observer: &dyn PipelineObserver,
    ) -> Result<ItineraryResponse> {
        let started = Instant::now();
        let mut state = PipelineState::from_request(request)?;

        info!(session = %state.session_id(), query = %request.query, "starting pipeline");
        state.record(TraceEntry::started(&request.query, &request.city));

        // --- Discovery ---
        observer.stage_started(StageId::Discovery);
        let mut input = state.discovery_input();
        if input.has_intent() {
            let listings = self.candidates(&input.city).await;
            input = input.with_candidates(listings, self.max_candidates);
        }
        let outcome = discovery::run(&input, &self.runner).await;
        observer.stage_finished(&outcome.trace);
        state.apply_discovery(outcome);

        // --- Context + Community, each on its own copy of the inputs ---
        observer.stage_started(StageId::Context);
        observer.stage_started(StageId::Community);
        let branch_started = Instant::now();

        let context_input = state.context_input();
        let runner = self.runner.clone();
        let context_task = tokio::spawn(async move { context::run(&context_input, &runner).await });

        let community_input = state.community_input();
        let runner = self.runner.clone();
        let community_task =
            tokio::spawn(async move { community::run(&community_input, &runner).await });

        let (context_result, community_result) = tokio::join!(context_task, community_task);
        let context_outcome = context_result
            .unwrap_or_else(|e| branch_failure(StageId::Context, branch_started, e));
        let community_outcome = community_result
            .unwrap_or_else(|e| branch_failure(StageId::Community, branch_started, e));

        observer.stage_finished(&context_outcome.trace);
        state.apply_context(context_outcome);
        observer.stage_finished(&community_outcome.trace);
        state.apply_community(community_outcome);

        // --- Synthesis ---
        observer.stage_started(StageId::Synthesis);
        let outcome = synthesis::run(&state.synthesis_input(), &self.runner).await;
        observer.stage_finished(&outcome.trace);
        state.apply_synthesis(outcome);

        // --- Costing ---
        observer.stage_started(StageId::Costing);
        let outcome = costing::run(&state.costing_input(), &self.runner).await;
        observer.stage_finished(&outcome.trace);
        state.apply_costing(outcome);

        let (succeeded, failed) = state.stage_counts();
        let completed = TraceEntry::completed(started, succeeded, failed);
        info!(
            session = %state.session_id(),
            latency_ms = completed.latency_ms,
            succeeded,
            failed,
            "pipeline complete"
        );
        state.record(completed);

        Ok(state.into_response())
    }

    /// Cached listings for Discovery. Failures only cost grounding.
    async fn candidates(&self, city: &str) -> Vec<SourceExperience> {
        let Some(cache) = &self.cache else {
            return Vec::new();
        };
        match cache.get_or_fetch(city, None).await {
            Ok(listings) => listings,
            Err(e) => {
                warn!(city, error = %e, "candidate fetch failed, continuing without");
                Vec::new()
            }
        }
    }
}

/// A branch task that panicked or was cancelled counts as a stage failure.
fn branch_failure<T: Default>(stage: StageId, started: Instant, e: JoinError) -> StageOutcome<T> {
    warn!(%stage, error = %e, "branch task did not complete");
    StageOutcome::failed(stage, started, format!("branch task failed: {e}"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use sidequest_shared::{DefaultsConfig, SidequestError};
    use sidequest_sources::ExperienceFetcher;

    use super::*;
    use crate::testing::{Reply, ScriptedGeneration};
    use crate::trace::TraceStatus;

    fn options() -> PipelineOptions {
        PipelineOptions {
            stage_timeout: Duration::from_millis(200),
            ..PipelineOptions::default()
        }
    }

    fn request(query: &str) -> ItineraryRequest {
        ItineraryRequest::with_defaults(query, &DefaultsConfig::default())
    }

    fn happy_path() -> ScriptedGeneration {
        ScriptedGeneration::new()
            .json(
                StageId::Discovery,
                json!({"discovered_experiences": [
                    {"name": "Clay Studio", "category": "craft", "budget": 1500},
                    {"name": "Silent Disco", "category": "music", "budget": 500}
                ]}),
            )
            .json(
                StageId::Context,
                json!({"cultural_context": {
                    "Clay Studio": {"dress_code": "Clothes you can get muddy"},
                    "Silent Disco": {"optimal_timing": "After sunset"}
                }}),
            )
            .json(
                StageId::Community,
                json!({"social_scaffolding": {
                    "Clay Studio": {"solo_friendly": true, "solo_percentage": "70%"}
                }}),
            )
            .json(
                StageId::Synthesis,
                json!({
                    "narrative_itinerary": "Morning clay, evening disco.",
                    "collision_suggestion": {"title": "Mud and Music", "experiences": [], "why": "Hands then feet"}
                }),
            )
            .json(
                StageId::Costing,
                json!({"budget_breakdown": {"total_estimate": 9000, "within_budget": true}}),
            )
    }

    fn stage_names(response: &ItineraryResponse) -> Vec<StageId> {
        response
            .agent_trace
            .iter()
            .map(|e| e.stage)
            .filter(|s| *s != StageId::Pipeline)
            .collect()
    }

    #[tokio::test]
    async fn happy_path_fills_every_output() {
        let generation = Arc::new(happy_path());
        let orchestrator = Orchestrator::new(generation, &options());

        let response = orchestrator
            .run(&request("crafty day out"), &SilentObserver)
            .await
            .unwrap();

        assert_eq!(response.experiences.len(), 2);
        assert_eq!(response.cultural_context.len(), 2);
        assert_eq!(response.social_scaffolding["Clay Studio"].solo_percentage, "70%");
        assert_eq!(response.narrative_itinerary, "Morning clay, evening disco.");
        assert_eq!(response.collision_suggestion.unwrap().title, "Mud and Music");
        assert!(response.errors.is_empty());

        let first = response.agent_trace.first().unwrap();
        assert!(matches!(first.status, TraceStatus::Started { .. }));
        let last = response.agent_trace.last().unwrap();
        assert!(matches!(
            last.status,
            TraceStatus::Completed {
                stages_succeeded: 5,
                stages_failed: 0,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn each_stage_traced_exactly_once() {
        let orchestrator = Orchestrator::new(Arc::new(happy_path()), &options());
        let response = orchestrator
            .run(&request("crafty day out"), &SilentObserver)
            .await
            .unwrap();

        let mut stages = stage_names(&response);
        assert_eq!(stages.len(), 5);
        stages.sort();
        stages.dedup();
        assert_eq!(stages.len(), 5);
        assert_eq!(response.agent_trace.len(), 7);
    }

    #[tokio::test]
    async fn costing_within_budget_is_recomputed() {
        let orchestrator = Orchestrator::new(Arc::new(happy_path()), &options());
        let response = orchestrator
            .run(&request("crafty day out"), &SilentObserver)
            .await
            .unwrap();

        let cost = response.budget_breakdown.unwrap();
        assert_eq!(cost.total_estimate, 9000);
        assert!(!cost.within_budget);
    }

    #[tokio::test]
    async fn empty_discovery_skips_downstream() {
        let generation = Arc::new(
            ScriptedGeneration::new().json(StageId::Discovery, json!({"discovered_experiences": []})),
        );
        let orchestrator = Orchestrator::new(generation.clone(), &options());

        let response = orchestrator
            .run(&request("anything"), &SilentObserver)
            .await
            .unwrap();

        for stage in [
            StageId::Context,
            StageId::Community,
            StageId::Synthesis,
            StageId::Costing,
        ] {
            assert!(response.stage_trace(stage).unwrap().is_skipped(), "{stage}");
        }
        assert!(response.narrative_itinerary.is_empty());
        assert!(response.budget_breakdown.is_none());
        assert!(response.errors.is_empty());
        assert_eq!(generation.calls(), vec![StageId::Discovery]);
    }

    #[tokio::test]
    async fn discovery_failure_degrades_to_skips() {
        let generation =
            Arc::new(ScriptedGeneration::new().reply(StageId::Discovery, Reply::Fail("quota")));
        let orchestrator = Orchestrator::new(generation, &options());

        let response = orchestrator
            .run(&request("anything"), &SilentObserver)
            .await
            .unwrap();

        assert!(response.stage_trace(StageId::Discovery).unwrap().is_error());
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].stage, StageId::Discovery);
        assert!(response.stage_trace(StageId::Costing).unwrap().is_skipped());
    }

    #[tokio::test]
    async fn branch_failure_is_isolated() {
        let generation = Arc::new(
            happy_path().reply(StageId::Context, Reply::Text("definitely not json".into())),
        );
        let orchestrator = Orchestrator::new(generation, &options());

        let response = orchestrator
            .run(&request("crafty day out"), &SilentObserver)
            .await
            .unwrap();

        assert!(response.cultural_context.is_empty());
        assert!(response.stage_trace(StageId::Context).unwrap().is_error());
        assert!(response.stage_trace(StageId::Community).unwrap().is_success());
        assert_eq!(response.social_scaffolding.len(), 1);
        assert_eq!(response.errors.len(), 1);
        assert!(!response.narrative_itinerary.is_empty());
    }

    #[tokio::test]
    async fn stage_timeout_is_a_stage_error() {
        let generation = Arc::new(happy_path().reply(StageId::Synthesis, Reply::Hang));
        let orchestrator = Orchestrator::new(generation, &options());

        let response = orchestrator
            .run(&request("crafty day out"), &SilentObserver)
            .await
            .unwrap();

        assert!(response.stage_trace(StageId::Synthesis).unwrap().is_error());
        assert!(response.narrative_itinerary.is_empty());
        assert!(response.budget_breakdown.is_some());
        assert!(response.errors[0].error.contains("timed out"));
    }

    #[tokio::test]
    async fn malformed_request_is_rejected() {
        let orchestrator = Orchestrator::new(Arc::new(happy_path()), &options());
        let mut bad = request("anything");
        bad.budget_min = 9000;

        let err = orchestrator.run(&bad, &SilentObserver).await.unwrap_err();
        assert!(matches!(err, SidequestError::Validation { .. }));
    }

    #[tokio::test]
    async fn oversized_day_is_rejected_not_panicking() {
        let generation = Arc::new(happy_path());
        let orchestrator = Orchestrator::new(generation.clone(), &options());
        let mut bad = request("crafty day out");
        bad.available_hours = Some(1e18);

        let err = orchestrator.run(&bad, &SilentObserver).await.unwrap_err();
        assert!(matches!(err, SidequestError::Validation { .. }));
        assert!(generation.calls().is_empty());
    }

    // --- Observer and cache grounding ---

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl PipelineObserver for Recorder {
        fn stage_started(&self, stage: StageId) {
            self.events.lock().unwrap().push(format!("start:{stage}"));
        }
        fn stage_finished(&self, entry: &TraceEntry) {
            self.events.lock().unwrap().push(format!("end:{}", entry.stage));
        }
    }

    #[tokio::test]
    async fn observer_sees_stage_order() {
        let orchestrator = Orchestrator::new(Arc::new(happy_path()), &options());
        let recorder = Recorder::default();
        orchestrator.run(&request("crafty day out"), &recorder).await.unwrap();

        let events = recorder.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "start:discovery",
                "end:discovery",
                "start:context",
                "start:community",
                "end:context",
                "end:community",
                "start:synthesis",
                "end:synthesis",
                "start:costing",
                "end:costing",
            ]
        );
    }

    struct StaticFetcher {
        fail: bool,
        calls: Mutex<HashMap<String, usize>>,
    }

    #[async_trait]
    impl ExperienceFetcher for StaticFetcher {
        async fn fetch_all(&self, city: &str) -> Result<Vec<SourceExperience>> {
            *self.calls.lock().unwrap().entry(city.to_string()).or_default() += 1;
            if self.fail {
                return Err(SidequestError::SourcesExhausted(city.to_string()));
            }
            Ok((0..20)
                .map(|i| SourceExperience::new(format!("Spot {i}"), "reddit", "art", city))
                .collect())
        }
    }

    fn cache(fail: bool) -> (Arc<RefreshingCache>, Arc<StaticFetcher>) {
        let fetcher = Arc::new(StaticFetcher {
            fail,
            calls: Mutex::new(HashMap::new()),
        });
        let cache = Arc::new(RefreshingCache::new(fetcher.clone(), Duration::from_secs(600)));
        (cache, fetcher)
    }

    #[tokio::test]
    async fn discovery_is_grounded_in_cached_listings() {
        let generation = Arc::new(happy_path());
        let (cache, fetcher) = cache(false);
        let orchestrator = Orchestrator::new(generation.clone(), &options()).with_cache(cache);

        orchestrator.run(&request("street art"), &SilentObserver).await.unwrap();
        orchestrator.run(&request("street art"), &SilentObserver).await.unwrap();

        let payload = generation.payload(StageId::Discovery).unwrap();
        assert_eq!(payload["candidates"].as_array().unwrap().len(), 15);
        assert_eq!(fetcher.calls.lock().unwrap()["Bangalore"], 1);
    }

    #[tokio::test]
    async fn cache_failure_does_not_fail_discovery() {
        let generation = Arc::new(happy_path());
        let (cache, _) = cache(true);
        let orchestrator = Orchestrator::new(generation.clone(), &options()).with_cache(cache);

        let response = orchestrator
            .run(&request("street art"), &SilentObserver)
            .await
            .unwrap();

        assert!(response.stage_trace(StageId::Discovery).unwrap().is_success());
        let payload = generation.payload(StageId::Discovery).unwrap();
        assert!(payload.get("candidates").is_none());
    }
}
