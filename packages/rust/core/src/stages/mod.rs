//! The five pipeline stages and their shared execution helper.
//!
//! Each stage module declares an owned input struct (its read set), a zero
//! value for its output, and a `run` function returning a [`StageOutcome`].
//! Stages never return `Err`: skips and failures are folded into the outcome.

pub mod community;
pub mod context;
pub mod costing;
pub mod discovery;
mod prompts;
pub mod synthesis;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde::de::DeserializeOwned;
use sidequest_shared::{Result, SidequestError};
use tokio::time;
use tracing::{info, warn};

use crate::generation::{GenerationRequest, GenerationService, ModelParams, strip_json_fence};
use crate::trace::{ErrorEntry, StageId, StageSummary, TraceEntry};

/// Reason recorded when a stage has no discovered experiences to work on.
pub(crate) const NO_EXPERIENCES: &str = "no experiences discovered";

// ---------------------------------------------------------------------------
// StageOutcome
// ---------------------------------------------------------------------------

/// Everything a stage produced: its output (or zero value), exactly one
/// trace entry, and an error entry when the stage failed.
#[derive(Debug, Clone)]
pub struct StageOutcome<T> {
    pub output: T,
    pub trace: TraceEntry,
    pub error: Option<ErrorEntry>,
}

impl<T: Default> StageOutcome<T> {
    pub fn success(stage: StageId, started: Instant, output: T, summary: StageSummary) -> Self {
        Self {
            output,
            trace: TraceEntry::success(stage, started, summary),
            error: None,
        }
    }

    pub fn skipped(stage: StageId, reason: &str) -> Self {
        info!(%stage, reason, "stage skipped");
        Self {
            output: T::default(),
            trace: TraceEntry::skipped(stage, reason),
            error: None,
        }
    }

    pub fn failed(stage: StageId, started: Instant, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            output: T::default(),
            trace: TraceEntry::error(stage, started, error.clone()),
            error: Some(ErrorEntry::new(stage, error)),
        }
    }
}

// ---------------------------------------------------------------------------
// StageRunner
// ---------------------------------------------------------------------------

/// Generation backend plus the per-call deadline. Cheap to clone into
/// spawned branch tasks.
#[derive(Clone)]
pub struct StageRunner {
    generation: Arc<dyn GenerationService>,
    timeout: Duration,
}

impl StageRunner {
    pub fn new(generation: Arc<dyn GenerationService>, timeout: Duration) -> Self {
        Self {
            generation,
            timeout,
        }
    }

    /// Render `input`, call the backend under the timeout, and parse the
    /// reply into `R`.
    async fn invoke<I, R>(&self, stage: StageId, system_prompt: &str, input: &I) -> Result<R>
    where
        I: Serialize,
        R: DeserializeOwned,
    {
        let payload = serde_json::to_value(input)
            .map_err(|e| SidequestError::parse(format!("failed to render {stage} input: {e}")))?;
        let request = GenerationRequest {
            stage,
            system_prompt: system_prompt.to_string(),
            payload,
            params: ModelParams::for_stage(stage),
        };

        let text = match time::timeout(self.timeout, self.generation.generate(request)).await {
            Ok(result) => result?,
            Err(_) => return Err(SidequestError::Timeout(self.timeout.as_millis() as u64)),
        };

        serde_json::from_str(strip_json_fence(&text))
            .map_err(|e| SidequestError::parse(format!("{stage} returned unparseable output: {e}")))
    }

    /// Run one generation-backed stage. `R` is the reply envelope, `extract`
    /// turns it into the stage output, `summarize` builds the trace figures.
    pub(crate) async fn execute<I, R, T>(
        &self,
        stage: StageId,
        system_prompt: &str,
        input: &I,
        extract: impl FnOnce(R) -> T,
        summarize: impl FnOnce(&T) -> StageSummary,
    ) -> StageOutcome<T>
    where
        I: Serialize,
        R: DeserializeOwned,
        T: Default,
    {
        let started = Instant::now();
        match self.invoke::<I, R>(stage, system_prompt, input).await {
            Ok(reply) => {
                let output = extract(reply);
                let summary = summarize(&output);
                info!(
                    %stage,
                    latency_ms = started.elapsed().as_millis() as u64,
                    "stage succeeded"
                );
                StageOutcome::success(stage, started, output, summary)
            }
            Err(e) => {
                warn!(%stage, error = %e, "stage failed, using empty output");
                StageOutcome::failed(stage, started, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Reply, ScriptedGeneration};
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Envelope {
        items: Vec<String>,
    }

    fn runner(reply: Reply, timeout: Duration) -> StageRunner {
        let generation = ScriptedGeneration::new().reply(StageId::Context, reply);
        StageRunner::new(Arc::new(generation), timeout)
    }

    async fn run(runner: &StageRunner) -> StageOutcome<Vec<String>> {
        runner
            .execute(
                StageId::Context,
                "prompt",
                &serde_json::json!({}),
                |e: Envelope| e.items,
                |items| StageSummary::Context {
                    contexts_added: items.len(),
                },
            )
            .await
    }

    #[tokio::test]
    async fn fenced_reply_is_parsed() {
        let r = runner(
            Reply::Text("```json\n{\"items\": [\"a\", \"b\"]}\n```".into()),
            Duration::from_secs(1),
        );
        let outcome = run(&r).await;
        assert_eq!(outcome.output, vec!["a", "b"]);
        assert!(outcome.trace.is_success());
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn missing_fields_default() {
        let r = runner(Reply::Text("{\"other\": 1}".into()), Duration::from_secs(1));
        let outcome = run(&r).await;
        assert!(outcome.output.is_empty());
        assert!(outcome.trace.is_success());
    }

    #[tokio::test]
    async fn unparseable_reply_degrades() {
        let r = runner(Reply::Text("not json at all".into()), Duration::from_secs(1));
        let outcome = run(&r).await;
        assert!(outcome.output.is_empty());
        assert!(outcome.trace.is_error());
        assert_eq!(outcome.error.unwrap().stage, StageId::Context);
    }

    #[tokio::test]
    async fn timeout_degrades() {
        let r = runner(Reply::Hang, Duration::from_millis(20));
        let outcome = run(&r).await;
        assert!(outcome.trace.is_error());
        assert!(outcome.error.unwrap().error.contains("timed out"));
    }
}
