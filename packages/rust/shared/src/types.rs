//! Core domain types for Sidequest itineraries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::DefaultsConfig;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// ItineraryRequest
// ---------------------------------------------------------------------------

/// Inbound request for one itinerary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItineraryRequest {
    /// Natural language description of what the user wants.
    #[serde(default)]
    pub query: String,
    #[serde(default = "default_city")]
    pub city: String,
    /// Reel / video links to mine for experiences.
    #[serde(default)]
    pub social_media_urls: Vec<String>,
    #[serde(default = "default_budget_min")]
    pub budget_min: i64,
    #[serde(default = "default_budget_max")]
    pub budget_max: i64,
    #[serde(default = "default_party_size", alias = "num_people")]
    pub party_size: u32,
    #[serde(default = "default_true")]
    pub solo_preference: bool,
    /// Interest tags such as `food_nerd` or `heritage_walker`.
    #[serde(default)]
    pub interest_pods: Vec<String>,
    #[serde(default = "default_crowd_preference")]
    pub crowd_preference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_hours: Option<f64>,
    /// Day start in `HH:MM`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
}

impl ItineraryRequest {
    /// A request for `query` with every other field taken from `defaults`.
    pub fn with_defaults(query: impl Into<String>, defaults: &DefaultsConfig) -> Self {
        Self {
            query: query.into(),
            city: defaults.city.clone(),
            social_media_urls: Vec::new(),
            budget_min: defaults.budget_min,
            budget_max: defaults.budget_max,
            party_size: defaults.party_size,
            solo_preference: defaults.solo_preference,
            interest_pods: Vec::new(),
            crowd_preference: defaults.crowd_preference.clone(),
            start_date: None,
            end_date: None,
            available_hours: Some(defaults.available_hours),
            start_time: Some(defaults.start_time.clone()),
        }
    }
}

fn default_city() -> String {
    DefaultsConfig::default().city
}
fn default_budget_min() -> i64 {
    DefaultsConfig::default().budget_min
}
fn default_budget_max() -> i64 {
    DefaultsConfig::default().budget_max
}
fn default_party_size() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
fn default_crowd_preference() -> String {
    DefaultsConfig::default().crowd_preference
}

// ---------------------------------------------------------------------------
// Stage outputs
// ---------------------------------------------------------------------------

/// One discovered experience. Missing fields from the generator default to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Experience {
    pub name: String,
    pub category: String,
    pub timing: String,
    /// Estimated cost in the local currency.
    #[serde(deserialize_with = "lenient_amount")]
    pub budget: i64,
    pub location: String,
    #[serde(deserialize_with = "lenient_flag")]
    pub solo_friendly: bool,
    pub source: String,
    pub lore: String,
    pub description: String,
}

/// Cultural context annotations for one experience.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextNote {
    pub optimal_timing: String,
    pub dress_code: String,
    pub transport_hacks: String,
    pub social_norms: String,
    pub religious_cultural: String,
    pub safety_accessibility: String,
}

/// Social dynamics annotations for one experience.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaffoldingNote {
    #[serde(deserialize_with = "lenient_flag")]
    pub solo_friendly: bool,
    /// Share of visitors arriving alone, e.g. `"40%"`.
    pub solo_percentage: String,
    pub scaffolding: String,
    pub arrival_vibe: String,
    pub beginner_energy: String,
}

/// One priced line of a cost breakdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostLine {
    pub experience: String,
    #[serde(deserialize_with = "lenient_amount")]
    pub cost: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_required: Option<String>,
}

/// Cost breakdown for a whole itinerary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetBreakdown {
    #[serde(deserialize_with = "lenient_amount")]
    pub total_estimate: i64,
    pub breakdown: Vec<CostLine>,
    pub deals: Vec<String>,
    pub tips: Vec<String>,
    #[serde(deserialize_with = "lenient_flag")]
    pub within_budget: bool,
}

/// Generator amounts arrive as integers, floats, numeric strings or null.
/// Floats are rounded; anything unreadable becomes 0.
fn lenient_amount<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let amount = match value {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.round() as i64),
        _ => None,
    };
    Ok(amount.unwrap_or(0))
}

/// Booleans that may arrive as `"yes"`/`"true"` strings, numbers or null.
fn lenient_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Bool(b)) => b,
        Some(serde_json::Value::String(s)) => {
            matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "y" | "1")
        }
        Some(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    })
}

/// A cross-interest follow-up suggestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionSuggestion {
    pub title: String,
    pub experiences: Vec<String>,
    pub why: String,
}

// ---------------------------------------------------------------------------
// SourceExperience
// ---------------------------------------------------------------------------

/// A listing normalized from any experience source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceExperience {
    /// Stable id derived from `(name, source_name)`.
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub location: String,
    pub source_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub budget_min: i64,
    pub budget_max: i64,
    /// Opening hours or similar, e.g. `"10 AM - 5:30 PM"`.
    pub timing_label: String,
    /// `morning`, `afternoon`, `evening`, `night` or `flexible`.
    pub time_of_day: String,
    pub solo_friendly: bool,
    pub fetched_at: DateTime<Utc>,
}

impl SourceExperience {
    /// Build a listing with permissive defaults; fields can be adjusted afterwards.
    pub fn new(
        name: impl Into<String>,
        source_name: impl Into<String>,
        category: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let source_name = source_name.into();
        Self {
            id: experience_id(&name, &source_name),
            name,
            category: category.into(),
            description: String::new(),
            location: location.into(),
            source_name,
            source_url: None,
            budget_min: 0,
            budget_max: 1000,
            timing_label: "Flexible".into(),
            time_of_day: "flexible".into(),
            solo_friendly: true,
            fetched_at: Utc::now(),
        }
    }
}

/// Deterministic id: first 12 hex chars of SHA-256 over name + source.
pub fn experience_id(name: &str, source_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(source_name.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..12].to_string()
}
