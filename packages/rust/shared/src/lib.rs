//! Shared types, error model, and configuration for Sidequest.
//!
//! This crate is the foundation depended on by all other Sidequest crates.
//! It provides:
//! - [`SidequestError`]: the unified error type
//! - Domain types ([`ItineraryRequest`], [`Experience`], [`SourceExperience`], [`SessionId`])
//! - Configuration ([`AppConfig`], [`PipelineOptions`], [`CacheOptions`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CacheConfig, CacheOptions, DefaultsConfig, GenerationConfig, GuidePage,
    OpenRouterConfig, PipelineOptions, SourcesConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from, validate_api_key,
};
pub use error::{Result, SidequestError};
pub use types::{
    BudgetBreakdown, CollisionSuggestion, ContextNote, CostLine, Experience, ItineraryRequest,
    ScaffoldingNote, SessionId, SourceExperience, experience_id,
};
