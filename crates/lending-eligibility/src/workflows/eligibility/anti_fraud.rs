use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::domain::{AntiFraudStatus, ApplicationStatus, CustomerId};
use super::policy::{reasons, Decision, FollowUp, Hold, ReapplyLock, StatusTransition};

/// Pipeline action for each anti-fraud binary-check result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AntiFraudAction {
    Continue,
    RetryLater,
    SuspiciousHold,
    FlagFraud,
    DenyWithReapplyLock,
}

impl From<AntiFraudStatus> for AntiFraudAction {
    fn from(status: AntiFraudStatus) -> Self {
        match status {
            AntiFraudStatus::Allowed | AntiFraudStatus::Bypassed | AntiFraudStatus::DoNothing => {
                AntiFraudAction::Continue
            }
            AntiFraudStatus::Error | AntiFraudStatus::Retrying => AntiFraudAction::RetryLater,
            AntiFraudStatus::MoveTo115 => AntiFraudAction::SuspiciousHold,
            AntiFraudStatus::MoveTo133 => AntiFraudAction::FlagFraud,
            AntiFraudStatus::MoveTo135 => AntiFraudAction::DenyWithReapplyLock,
        }
    }
}

/// Inputs the anti-fraud mapping needs beyond the result code.
#[derive(Debug, Clone, Copy)]
pub struct AntiFraudContext {
    pub current_status: ApplicationStatus,
    pub customer_id: CustomerId,
    pub today: NaiveDate,
    pub reapply_lock_days: u64,
}

/// `None` lets the pipeline continue.
pub fn decide(status: AntiFraudStatus, context: &AntiFraudContext) -> Option<Decision> {
    match AntiFraudAction::from(status) {
        AntiFraudAction::Continue => None,
        AntiFraudAction::RetryLater => {
            if context.current_status == ApplicationStatus::SuspiciousHold {
                Some(Decision::hold(Hold::AwaitingRetry))
            } else {
                Some(Decision::Transition(StatusTransition {
                    status: ApplicationStatus::SuspiciousHold,
                    reason: reasons::ANTI_FRAUD_UNAVAILABLE.to_string(),
                    reapply_lock: None,
                    follow_up: Some(FollowUp::AntiFraudRetry),
                }))
            }
        }
        AntiFraudAction::SuspiciousHold => Some(Decision::transition(
            ApplicationStatus::SuspiciousHold,
            reasons::PROMPTED_BY_ANTI_FRAUD,
        )),
        AntiFraudAction::FlagFraud => Some(Decision::transition(
            ApplicationStatus::FlaggedForFraud,
            reasons::PROMPTED_BY_ANTI_FRAUD,
        )),
        AntiFraudAction::DenyWithReapplyLock => {
            let until = context
                .today
                .checked_add_days(Days::new(context.reapply_lock_days))
                .unwrap_or(NaiveDate::MAX);
            Some(Decision::Transition(StatusTransition {
                status: ApplicationStatus::Denied,
                reason: reasons::PROMPTED_BY_ANTI_FRAUD.to_string(),
                reapply_lock: Some(ReapplyLock {
                    customer_id: context.customer_id,
                    until,
                }),
                follow_up: None,
            }))
        }
    }
}
