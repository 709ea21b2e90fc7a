//! Costing: price the itinerary and decide budget fit locally.

use serde::{Deserialize, Serialize};
use sidequest_shared::{BudgetBreakdown, Experience};

use super::{NO_EXPERIENCES, StageOutcome, StageRunner, prompts};
use crate::trace::{StageId, StageSummary};

#[derive(Debug, Clone, Serialize)]
pub struct CostingInput {
    pub city: String,
    pub budget_min: i64,
    pub budget_max: i64,
    pub party_size: u32,
    pub experiences: Vec<Experience>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CostingReply {
    budget_breakdown: BudgetBreakdown,
}

/// The generator's `within_budget` is ignored; it is recomputed here as
/// `total_estimate <= budget_max`.
pub async fn run(
    input: &CostingInput,
    runner: &StageRunner,
) -> StageOutcome<Option<BudgetBreakdown>> {
    if input.experiences.is_empty() {
        return StageOutcome::skipped(StageId::Costing, NO_EXPERIENCES);
    }

    let budget_max = input.budget_max;
    runner
        .execute(
            StageId::Costing,
            prompts::COSTING,
            input,
            |reply: CostingReply| {
                let mut breakdown = reply.budget_breakdown;
                breakdown.within_budget = breakdown.total_estimate <= budget_max;
                Some(breakdown)
            },
            |breakdown: &Option<BudgetBreakdown>| {
                let (total_estimate, within_budget) = breakdown
                    .as_ref()
                    .map(|b| (b.total_estimate, b.within_budget))
                    .unwrap_or((0, true));
                StageSummary::Costing {
                    total_estimate,
                    within_budget,
                }
            },
        )
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::testing::ScriptedGeneration;

    fn input(budget_max: i64) -> CostingInput {
        CostingInput {
            city: "Bangalore".into(),
            budget_min: 200,
            budget_max,
            party_size: 2,
            experiences: vec![Experience {
                name: "Clay Studio".into(),
                budget: 1500,
                ..Default::default()
            }],
        }
    }

    async fn cost(reply: serde_json::Value, budget_max: i64) -> BudgetBreakdown {
        let generation = Arc::new(ScriptedGeneration::new().json(StageId::Costing, reply));
        let runner = StageRunner::new(generation, Duration::from_secs(1));
        run(&input(budget_max), &runner).await.output.unwrap()
    }

    #[tokio::test]
    async fn over_budget_overrides_generator_claim() {
        let breakdown = cost(
            json!({"budget_breakdown": {"total_estimate": 6000, "within_budget": true}}),
            5000,
        )
        .await;
        assert!(!breakdown.within_budget);
    }

    #[tokio::test]
    async fn under_budget_overrides_generator_claim() {
        let breakdown = cost(
            json!({"budget_breakdown": {
                "total_estimate": 3000,
                "within_budget": false,
                "breakdown": [{"experience": "Clay Studio", "cost": 3000, "type": "workshop"}]
            }}),
            5000,
        )
        .await;
        assert!(breakdown.within_budget);
        assert_eq!(breakdown.breakdown[0].kind, "workshop");
    }

    #[tokio::test]
    async fn exactly_at_budget_is_within() {
        let breakdown = cost(json!({"budget_breakdown": {"total_estimate": 5000}}), 5000).await;
        assert!(breakdown.within_budget);
    }
}
