use std::time::Duration;

use chrono::NaiveDate;

use super::audit::RuleCheckOutcome;
use super::config::ConfigSnapshot;
use super::domain::{
    ApplicationId, ApplicationSnapshot, ApplicationStatus, CustomerId, LivenessResult,
    RiskSignals, ScoreResult,
};
use super::holdout::HoldoutAssignment;

/// Read access to applications awaiting a post-ITI decision.
pub trait ApplicationRepository: Send + Sync {
    fn fetch(&self, id: ApplicationId) -> Result<Option<ApplicationSnapshot>, RepositoryError>;
}

/// Feature-flag and experiment configuration lookup.
pub trait FeatureFlagStore: Send + Sync {
    fn snapshot(&self) -> Result<ConfigSnapshot, RepositoryError>;
}

/// Latest credit model result for an application.
pub trait ScoreRepository: Send + Sync {
    fn credit_score(&self, id: ApplicationId) -> Result<Option<ScoreResult>, RepositoryError>;
}

/// Secondary fraud model (mycroft) pgood lookups. The score may not exist yet.
pub trait MycroftScoreSource: Send + Sync {
    fn latest_pgood(&self, id: ApplicationId) -> Result<Option<f64>, RepositoryError>;
}

pub trait LivenessProvider: Send + Sync {
    fn latest(&self, id: ApplicationId) -> Result<Option<LivenessResult>, RepositoryError>;
}

/// Anti-fraud, bureau, and bypass signal lookups.
pub trait RiskSignalProvider: Send + Sync {
    fn collect(&self, snapshot: &ApplicationSnapshot) -> Result<RiskSignals, RepositoryError>;
}

/// Immutable experiment assignments keyed by (experiment code, application id).
pub trait HoldoutStore: Send + Sync {
    fn find(
        &self,
        experiment_code: &str,
        id: ApplicationId,
    ) -> Result<Option<HoldoutAssignment>, RepositoryError>;

    /// Persist unless an assignment already exists, returning whichever is stored.
    fn insert_if_absent(
        &self,
        assignment: HoldoutAssignment,
    ) -> Result<HoldoutAssignment, RepositoryError>;
}

/// Append-only audit trail of rule check outcomes.
pub trait AuditLog: Send + Sync {
    /// Store every outcome of one run, or none of them.
    fn append(&self, outcomes: Vec<RuleCheckOutcome>) -> Result<(), RepositoryError>;
    fn history(&self, id: ApplicationId) -> Result<Vec<RuleCheckOutcome>, RepositoryError>;
}

/// Sole writer of application status. Implementations record status history.
pub trait StatusTransitionGateway: Send + Sync {
    /// Returns `false` when the transition was a no-op.
    fn apply(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
        reason: &str,
    ) -> Result<bool, GatewayError>;

    fn lock_reapply(&self, customer: CustomerId, until: NaiveDate) -> Result<(), GatewayError>;
}

/// Asynchronous follow-up scheduling (notifications, re-scoring, retries).
pub trait TaskDispatcher: Send + Sync {
    fn enqueue(
        &self,
        name: &str,
        payload: serde_json::Value,
        delay: Option<Duration>,
    ) -> Result<(), DispatchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("status transition rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("task transport unavailable: {0}")]
    Transport(String),
}
