//! Post-ITI eligibility pipeline for loan applications.
//!
//! An application that has cleared the credit model is evaluated once against an
//! ordered list of checks. The first check that reaches a decision ends the run;
//! the service then records the audit trail, applies the status transition through
//! the gateway, and schedules follow-up work.

pub mod anti_fraud;
pub mod audit;
pub mod clock;
pub mod config;
pub mod domain;
pub mod engine;
pub mod entry_level;
pub mod holdout;
pub mod mycroft;
pub mod policy;
pub mod repository;
pub mod router;
pub(crate) mod rules;
pub mod scoring;
pub mod service;
pub mod views;

#[cfg(test)]
mod tests;

pub use audit::{CheckVerdict, RuleCheckOutcome};
pub use clock::{Clock, Delay, FixedClock, SystemClock, ThreadDelay};
pub use config::{features, ConfigSnapshot, FeatureSetting, PipelineSettings};
pub use domain::{
    AntiFraudStatus, ApplicationId, ApplicationSnapshot, ApplicationStatus, CustomerId,
    EvaluationSignals, FdcStatus, LivenessResult, ProductLine, RiskSignals, ScoreResult,
    ScoreTier,
};
pub use engine::{EligibilityRuleEngine, EngineError, EvaluationEnvironment, EvaluationReport};
pub use holdout::{HoldoutAssignment, HoldoutCohort, HoldoutExperiment};
pub use mycroft::{MycroftOutcome, MycroftState, MycroftVerdict};
pub use policy::{reasons, Decision, FollowUp, Hold, ReapplyLock, StatusTransition};
pub use repository::{
    ApplicationRepository, AuditLog, DispatchError, FeatureFlagStore, GatewayError, HoldoutStore,
    LivenessProvider, MycroftScoreSource, RepositoryError, RiskSignalProvider, ScoreRepository,
    StatusTransitionGateway, TaskDispatcher,
};
pub use router::eligibility_router;
pub use rules::CheckName;
pub use scoring::{generate_credit_score, ScoreBands};
pub use service::{
    tasks, Collaborators, EligibilityRun, EligibilityService, EligibilityServiceError,
};
pub use views::{CheckView, EligibilityView};
