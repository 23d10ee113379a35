use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::config::{features, ConfigSnapshot};
use super::domain::{ApplicationSnapshot, ProductLine, ScoreResult, ScoreTier};

/// Reduced-limit onboarding tier parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryLevelConfig {
    pub eligible_tiers: BTreeSet<ScoreTier>,
    pub min_pgood: f64,
    pub max_pgood: f64,
    pub limit_amount: u64,
    #[serde(default)]
    pub waitlist: bool,
}

impl EntryLevelConfig {
    pub fn from_config(config: &ConfigSnapshot) -> Option<Self> {
        config.parameters(features::ENTRY_LEVEL_LIMIT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryLevelOffer {
    pub limit_amount: u64,
    pub waitlisted: bool,
}

/// Entry level only applies to direct J1 applicants within the configured score band.
pub fn assess(
    application: &ApplicationSnapshot,
    score: Option<&ScoreResult>,
    config: &EntryLevelConfig,
) -> Option<EntryLevelOffer> {
    if application.product_line != ProductLine::J1 || application.partner.is_some() {
        return None;
    }
    let score = score?;
    if !config.eligible_tiers.contains(&score.tier) {
        return None;
    }
    let pgood = score.pgood;
    if !pgood.is_finite() || pgood < config.min_pgood || pgood > config.max_pgood {
        return None;
    }

    Some(EntryLevelOffer {
        limit_amount: config.limit_amount,
        waitlisted: config.waitlist,
    })
}
