//! Synthesis: weave experiences and their annotations into a day narrative.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sidequest_shared::{CollisionSuggestion, ContextNote, Experience, ScaffoldingNote};

use super::{NO_EXPERIENCES, StageOutcome, StageRunner, prompts};
use crate::trace::{StageId, StageSummary};

pub const DEFAULT_START_TIME: &str = "10:00";
pub const DEFAULT_AVAILABLE_HOURS: f64 = 8.0;
const FALLBACK_END_TIME: &str = "18:00";
const MINUTES_PER_DAY: i64 = 24 * 60;

#[derive(Debug, Clone, Serialize)]
pub struct SynthesisInput {
    pub query: String,
    pub city: String,
    pub interest_pods: Vec<String>,
    pub experiences: Vec<Experience>,
    pub cultural_context: BTreeMap<String, ContextNote>,
    pub social_scaffolding: BTreeMap<String, ScaffoldingNote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    pub start_time: String,
    pub end_time: String,
    pub available_hours: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynthesisOutput {
    pub narrative: String,
    pub collision: Option<CollisionSuggestion>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SynthesisReply {
    narrative_itinerary: String,
    collision_suggestion: Option<CollisionSuggestion>,
}

pub async fn run(input: &SynthesisInput, runner: &StageRunner) -> StageOutcome<SynthesisOutput> {
    if input.experiences.is_empty() {
        return StageOutcome::skipped(StageId::Synthesis, NO_EXPERIENCES);
    }

    runner
        .execute(
            StageId::Synthesis,
            prompts::SYNTHESIS,
            input,
            |reply: SynthesisReply| SynthesisOutput {
                narrative: reply.narrative_itinerary,
                collision: reply
                    .collision_suggestion
                    .filter(|c| !c.title.trim().is_empty()),
            },
            |output: &SynthesisOutput| StageSummary::Synthesis {
                narrative_length: output.narrative.chars().count(),
                has_collision: output.collision.is_some(),
            },
        )
        .await
}

// ---------------------------------------------------------------------------
// Time window
// ---------------------------------------------------------------------------

/// Parse `HH:MM` (24h) into `(hour, minute)`.
pub fn parse_clock(text: &str) -> Option<(u32, u32)> {
    let (h, m) = text.trim().split_once(':')?;
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    (hour < 24 && minute < 60).then_some((hour, minute))
}

/// End of the day window: `start + hours`, wrapping past midnight.
/// An unparseable start yields `18:00`.
pub fn end_time(start: &str, hours: f64) -> String {
    let Some((hour, minute)) = parse_clock(start) else {
        return FALLBACK_END_TIME.to_string();
    };
    let start_minutes = i64::from(hour) * 60 + i64::from(minute);
    // `as` saturates on huge or non-finite spans; reduce before adding.
    let span = ((hours * 60.0).round() as i64).rem_euclid(MINUTES_PER_DAY);
    let end = (start_minutes + span) % MINUTES_PER_DAY;
    format!("{:02}:{:02}", end / 60, end % 60)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::testing::ScriptedGeneration;

    fn input() -> SynthesisInput {
        SynthesisInput {
            query: "slow day of crafts".into(),
            city: "Bangalore".into(),
            interest_pods: vec!["maker".into()],
            experiences: vec![Experience {
                name: "Clay Studio".into(),
                ..Default::default()
            }],
            cultural_context: BTreeMap::new(),
            social_scaffolding: BTreeMap::new(),
            start_date: None,
            start_time: DEFAULT_START_TIME.into(),
            end_time: end_time(DEFAULT_START_TIME, DEFAULT_AVAILABLE_HOURS),
            available_hours: DEFAULT_AVAILABLE_HOURS,
        }
    }

    #[test]
    fn clock_parsing() {
        assert_eq!(parse_clock("10:00"), Some((10, 0)));
        assert_eq!(parse_clock("9:05"), Some((9, 5)));
        assert_eq!(parse_clock("24:00"), None);
        assert_eq!(parse_clock("10:60"), None);
        assert_eq!(parse_clock("ten"), None);
    }

    #[test]
    fn end_time_arithmetic() {
        assert_eq!(end_time("10:00", 8.0), "18:00");
        assert_eq!(end_time("09:30", 2.5), "12:00");
        assert_eq!(end_time("20:00", 6.0), "02:00");
        assert_eq!(end_time("whenever", 3.0), "18:00");
    }

    #[test]
    fn end_time_survives_absurd_spans() {
        for hours in [1e18, -1e18, f64::INFINITY, f64::NAN] {
            let end = end_time("10:00", hours);
            assert!(parse_clock(&end).is_some(), "{hours} -> {end}");
        }
        assert_eq!(end_time("10:00", 48.0), "10:00");
    }

    #[tokio::test]
    async fn blank_collision_is_dropped() {
        let generation = Arc::new(ScriptedGeneration::new().json(
            StageId::Synthesis,
            json!({
                "narrative_itinerary": "## Morning\nThrow clay.",
                "collision_suggestion": {"title": "", "experiences": [], "why": ""}
            }),
        ));
        let runner = StageRunner::new(generation.clone(), Duration::from_secs(1));

        let outcome = run(&input(), &runner).await;
        assert_eq!(outcome.output.narrative, "## Morning\nThrow clay.");
        assert!(outcome.output.collision.is_none());

        let payload = generation.payload(StageId::Synthesis).unwrap();
        assert_eq!(payload["end_time"], "18:00");
    }

    #[tokio::test]
    async fn collision_kept_when_titled() {
        let generation = Arc::new(ScriptedGeneration::new().json(
            StageId::Synthesis,
            json!({
                "narrative_itinerary": "Day plan",
                "collision_suggestion": {
                    "title": "Clay and Coffee",
                    "experiences": ["Clay Studio", "Third Wave"],
                    "why": "Both reward slow mornings"
                }
            }),
        ));
        let runner = StageRunner::new(generation, Duration::from_secs(1));

        let outcome = run(&input(), &runner).await;
        let collision = outcome.output.collision.unwrap();
        assert_eq!(collision.title, "Clay and Coffee");
        assert_eq!(collision.experiences.len(), 2);
    }
}
