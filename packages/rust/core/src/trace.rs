//! Trace and error records produced by pipeline runs.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

// ---------------------------------------------------------------------------
// StageId
// ---------------------------------------------------------------------------

/// Identifies who produced a trace entry. `Pipeline` marks the run-level
/// started/completed entries; the rest are the five stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Pipeline,
    Discovery,
    Context,
    Community,
    Synthesis,
    Costing,
}

impl StageId {
    /// The five stages in execution order.
    pub const STAGES: [StageId; 5] = [
        Self::Discovery,
        Self::Context,
        Self::Community,
        Self::Synthesis,
        Self::Costing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pipeline => "pipeline",
            Self::Discovery => "discovery",
            Self::Context => "context",
            Self::Community => "community",
            Self::Synthesis => "synthesis",
            Self::Costing => "costing",
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TraceEntry
// ---------------------------------------------------------------------------

/// Stage-specific figures recorded on success.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StageSummary {
    Discovery {
        experiences_found: usize,
        candidates_offered: usize,
    },
    Context {
        contexts_added: usize,
    },
    Community {
        experiences_analyzed: usize,
    },
    Synthesis {
        narrative_length: usize,
        has_collision: bool,
    },
    Costing {
        total_estimate: i64,
        within_budget: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TraceStatus {
    Started {
        query: String,
        city: String,
    },
    Completed {
        total_latency_ms: u64,
        stages_succeeded: usize,
        stages_failed: usize,
    },
    Success {
        summary: StageSummary,
    },
    Error {
        error: String,
    },
    Skipped {
        reason: String,
    },
}

/// One append-only record in a run's trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub stage: StageId,
    pub started_at: DateTime<Utc>,
    pub latency_ms: u64,
    #[serde(flatten)]
    pub status: TraceStatus,
}

impl TraceEntry {
    fn finished(stage: StageId, started: Instant, status: TraceStatus) -> Self {
        let latency = started.elapsed();
        let started_at = Utc::now()
            - chrono::Duration::from_std(latency).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            stage,
            started_at,
            latency_ms: latency.as_millis() as u64,
            status,
        }
    }

    pub fn started(query: &str, city: &str) -> Self {
        Self {
            stage: StageId::Pipeline,
            started_at: Utc::now(),
            latency_ms: 0,
            status: TraceStatus::Started {
                query: query.to_string(),
                city: city.to_string(),
            },
        }
    }

    pub fn completed(started: Instant, stages_succeeded: usize, stages_failed: usize) -> Self {
        let total_latency_ms = started.elapsed().as_millis() as u64;
        Self::finished(
            StageId::Pipeline,
            started,
            TraceStatus::Completed {
                total_latency_ms,
                stages_succeeded,
                stages_failed,
            },
        )
    }

    pub fn success(stage: StageId, started: Instant, summary: StageSummary) -> Self {
        Self::finished(stage, started, TraceStatus::Success { summary })
    }

    pub fn error(stage: StageId, started: Instant, error: impl Into<String>) -> Self {
        Self::finished(stage, started, TraceStatus::Error { error: error.into() })
    }

    pub fn skipped(stage: StageId, reason: impl Into<String>) -> Self {
        Self {
            stage,
            started_at: Utc::now(),
            latency_ms: 0,
            status: TraceStatus::Skipped {
                reason: reason.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, TraceStatus::Success { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, TraceStatus::Error { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, TraceStatus::Skipped { .. })
    }
}

// ---------------------------------------------------------------------------
// ErrorEntry
// ---------------------------------------------------------------------------

/// A stage failure that was absorbed rather than propagated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEntry {
    pub stage: StageId,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorEntry {
    pub fn new(stage: StageId, error: impl Into<String>) -> Self {
        Self {
            stage,
            error: error.into(),
            timestamp: Utc::now(),
        }
    }
}
