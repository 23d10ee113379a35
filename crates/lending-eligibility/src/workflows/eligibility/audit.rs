use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::ApplicationId;
use super::rules::CheckName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckVerdict {
    /// The check produced the run's decision.
    Triggered,
    /// The check ran and let the pipeline continue.
    Cleared,
    /// Missing configuration or signal; the check did not run.
    Skipped,
}

/// Append-only record of one check evaluated against an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCheckOutcome {
    pub application_id: ApplicationId,
    pub check: CheckName,
    pub verdict: CheckVerdict,
    pub detail: String,
    pub is_mycroft_holdout: bool,
    pub evaluated_at: DateTime<Utc>,
}
