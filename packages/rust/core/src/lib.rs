//! Core itinerary pipeline for Sidequest.
//!
//! Ties the generation backend, the stage graph and the experience cache
//! together into a single `Orchestrator::run` call.

pub mod generation;
pub mod pipeline;
pub mod response;
pub mod stages;
pub mod state;
pub mod trace;

#[cfg(test)]
mod testing;

pub use generation::{GenerationService, OpenRouterClient, RetryingGeneration};
pub use pipeline::{Orchestrator, PipelineObserver, SilentObserver};
pub use response::ItineraryResponse;
pub use state::PipelineState;
pub use trace::{ErrorEntry, StageId, StageSummary, TraceEntry, TraceStatus};
