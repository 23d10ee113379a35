use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{ScoreResult, ScoreTier};

/// Lower pgood bound for each tier above C.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBands {
    pub a: f64,
    pub a_minus: f64,
    pub b_plus: f64,
    pub b: f64,
    pub b_minus: f64,
}

impl Default for ScoreBands {
    fn default() -> Self {
        Self {
            a: 0.95,
            a_minus: 0.90,
            b_plus: 0.85,
            b: 0.80,
            b_minus: 0.75,
        }
    }
}

impl ScoreBands {
    pub fn tier_for(&self, pgood: f64) -> ScoreTier {
        if !pgood.is_finite() {
            return ScoreTier::C;
        }
        [
            (self.a, ScoreTier::A),
            (self.a_minus, ScoreTier::AMinus),
            (self.b_plus, ScoreTier::BPlus),
            (self.b, ScoreTier::B),
            (self.b_minus, ScoreTier::BMinus),
        ]
        .into_iter()
        .find(|(floor, _)| pgood >= *floor)
        .map(|(_, tier)| tier)
        .unwrap_or(ScoreTier::C)
    }
}

/// Tier forced by failed binary checks, if any failed.
pub fn binary_check_override(failed_binary_checks: &BTreeSet<String>) -> Option<ScoreTier> {
    (!failed_binary_checks.is_empty()).then_some(ScoreTier::C)
}

/// Build the credit score record for one model run.
///
/// Any failed binary check pins the tier to C regardless of pgood.
pub fn generate_credit_score(
    pgood: f64,
    failed_binary_checks: &BTreeSet<String>,
    bands: &ScoreBands,
    model_version: &str,
) -> ScoreResult {
    let tier = match binary_check_override(failed_binary_checks) {
        Some(tier) => {
            debug!(failed = ?failed_binary_checks, "binary check failure forces tier C");
            tier
        }
        None => bands.tier_for(pgood),
    };

    ScoreResult {
        tier,
        pgood,
        model_version: model_version.to_string(),
    }
}
