//! The text-generation seam every stage calls through.
//!
//! Stages hand a [`GenerationRequest`] to a [`GenerationService`] and get raw
//! text back. The production implementation is [`OpenRouterClient`], usually
//! wrapped in [`RetryingGeneration`].

mod openrouter;
mod retry;

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use sidequest_shared::Result;

use crate::trace::StageId;

pub use openrouter::OpenRouterClient;
pub use retry::RetryingGeneration;

/// Sampling parameters for one call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ModelParams {
    pub fn for_stage(stage: StageId) -> Self {
        let (temperature, max_tokens) = match stage {
            StageId::Discovery => (0.3, 4096),
            StageId::Context => (0.4, 2048),
            StageId::Community => (0.2, 2048),
            StageId::Synthesis => (0.7, 8192),
            StageId::Costing => (0.1, 2048),
            StageId::Pipeline => (0.3, 2048),
        };
        Self {
            temperature,
            max_tokens,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub stage: StageId,
    pub system_prompt: String,
    /// Rendered stage input, sent as pretty JSON.
    pub payload: Value,
    pub params: ModelParams,
}

/// Produces raw text for a stage. Implementations should map upstream
/// throttling to `RateLimited` so the retry wrapper can back off.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String>;
}

/// Strip markdown code fences and surrounding prose, leaving the outermost
/// `{...}` object when one is present.
pub fn strip_json_fence(text: &str) -> &str {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").expect("valid regex")
    });

    let inner = match FENCE_RE.captures(text).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => text.trim(),
    };

    match (inner.find('{'), inner.rfind('}')) {
        (Some(start), Some(end)) if start < end => &inner[start..=end],
        _ => inner,
    }
}
