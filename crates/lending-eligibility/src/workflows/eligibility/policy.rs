use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{ApplicationStatus, CustomerId};

/// Change reasons written to status history.
pub mod reasons {
    pub const VIDEO_INJECTION: &str = "liveness video injection";
    pub const HIGH_SCORE_BYPASS: &str = "High Score Bypass";
    pub const MEDIUM_SCORE_BYPASS: &str = "Medium Score Bypass";
    pub const PASS_BINARY_AND_DECISION: &str = "pass binary and decision check";
    pub const REVIVED_BY_ALTERNATE_SCORE: &str = "revived by alternate score";
    pub const MYCROFT_FAIL: &str = "mycroft fail";
    pub const ANTI_FRAUD_UNAVAILABLE: &str = "anti fraud service unavailable";
    pub const PROMPTED_BY_ANTI_FRAUD: &str = "prompted by anti fraud";
    pub const HIGH_RISK_ASN: &str = "High Risk ASN";
    pub const OFFLINE_ACTIVATION: &str = "Offline Activation";
    pub const ENTRY_LEVEL_WAITLIST: &str = "Entry Level Waitlist";
    pub const BPJS_NO_FDC_BYPASS: &str = "BPJS No FDC Bypass";
    pub const GOOD_FDC_BYPASS: &str = "Good FDC Bypass";
    pub const TELCO_SWAP_IN_BYPASS: &str = "Telco Swap In Bypass";
    pub const FAILED_LIVENESS: &str = "failed liveness check";
    pub const MYCROFT_HOLDOUT: &str = "mycroft holdout";
}

/// Terminal output of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    Transition(StatusTransition),
    NoDecision { hold: Hold },
}

impl Decision {
    pub(crate) fn transition(status: ApplicationStatus, reason: &str) -> Self {
        Decision::Transition(StatusTransition {
            status,
            reason: reason.to_string(),
            reapply_lock: None,
            follow_up: None,
        })
    }

    pub(crate) fn hold(hold: Hold) -> Self {
        Decision::NoDecision { hold }
    }

    pub fn status(&self) -> Option<ApplicationStatus> {
        match self {
            Decision::Transition(transition) => Some(transition.status),
            Decision::NoDecision { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Decision::Transition(transition) => Some(transition.reason.as_str()),
            Decision::NoDecision { .. } => None,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            Decision::Transition(transition) => {
                let mut summary = format!(
                    "move to {} ({}): {}",
                    transition.status.code(),
                    transition.status.label(),
                    transition.reason
                );
                if let Some(lock) = &transition.reapply_lock {
                    summary.push_str(&format!("; reapply locked until {}", lock.until));
                }
                summary
            }
            Decision::NoDecision { hold } => hold.summary().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub status: ApplicationStatus,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reapply_lock: Option<ReapplyLock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<FollowUp>,
}

/// Delayed work the service schedules once the transition is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUp {
    /// Re-run the anti-fraud binary check once the service recovers.
    AntiFraudRetry,
}

/// Blocks the customer from submitting a new application before `until`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReapplyLock {
    pub customer_id: CustomerId,
    pub until: NaiveDate,
}

/// Why the pipeline left the status unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hold {
    /// Lowest credit tier; the caller routes to the shadow scoring flow.
    SecondaryScoring,
    /// Anti-fraud is still unavailable and the application already sits in suspicious hold.
    AwaitingRetry,
    /// No check fired; the caller enqueues tracking.
    Tracking,
}

impl Hold {
    pub const fn summary(self) -> &'static str {
        match self {
            Hold::SecondaryScoring => "no decision: routed to secondary scoring",
            Hold::AwaitingRetry => "no decision: awaiting anti fraud retry",
            Hold::Tracking => "no decision: pending tracking",
        }
    }
}
