use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use super::audit::RuleCheckOutcome;
use super::clock::{Clock, Delay};
use super::config::PipelineSettings;
use super::domain::{ApplicationId, ApplicationSnapshot, ApplicationStatus, EvaluationSignals};
use super::engine::{EligibilityRuleEngine, EngineError, EvaluationEnvironment, EvaluationReport};
use super::policy::{Decision, FollowUp, Hold, StatusTransition};
use super::repository::{
    ApplicationRepository, AuditLog, DispatchError, FeatureFlagStore, GatewayError, HoldoutStore,
    LivenessProvider, MycroftScoreSource, RepositoryError, RiskSignalProvider, ScoreRepository,
    StatusTransitionGateway, TaskDispatcher,
};

/// Follow-up task names handed to the dispatcher.
pub mod tasks {
    pub const NOTIFY_STATUS_CHANGE: &str = "notify_status_change";
    pub const ANTI_FRAUD_RETRY: &str = "anti_fraud_retry";
    pub const SHADOW_SCORE: &str = "shadow_score";
    pub const TRACK_PENDING_APPLICATION: &str = "track_pending_application";
}

/// External collaborators the service reads from and writes to.
#[derive(Clone)]
pub struct Collaborators {
    pub applications: Arc<dyn ApplicationRepository>,
    pub features: Arc<dyn FeatureFlagStore>,
    pub scores: Arc<dyn ScoreRepository>,
    pub mycroft_scores: Arc<dyn MycroftScoreSource>,
    pub liveness: Arc<dyn LivenessProvider>,
    pub risk: Arc<dyn RiskSignalProvider>,
    pub holdouts: Arc<dyn HoldoutStore>,
    pub audit: Arc<dyn AuditLog>,
    pub gateway: Arc<dyn StatusTransitionGateway>,
    pub tasks: Arc<dyn TaskDispatcher>,
    pub clock: Arc<dyn Clock>,
    pub delay: Arc<dyn Delay>,
}

/// Outcome of processing one application end to end.
#[derive(Debug, Clone)]
pub struct EligibilityRun {
    pub report: EvaluationReport,
    /// `false` when the decision left the status untouched.
    pub status_changed: bool,
}

/// Runs the post-ITI pipeline for one application and applies its decision.
pub struct EligibilityService {
    collaborators: Collaborators,
    engine: EligibilityRuleEngine,
}

impl EligibilityService {
    pub fn new(collaborators: Collaborators, settings: PipelineSettings) -> Self {
        Self {
            collaborators,
            engine: EligibilityRuleEngine::new(settings),
        }
    }

    pub fn process(
        &self,
        application_id: ApplicationId,
    ) -> Result<EligibilityRun, EligibilityServiceError> {
        let c = &self.collaborators;
        let application = c
            .applications
            .fetch(application_id)?
            .ok_or(EligibilityServiceError::NotFound(application_id))?;

        if application.is_deleted {
            return Err(EligibilityServiceError::Deleted(application_id));
        }
        if !application.status.is_evaluable() {
            return Err(EligibilityServiceError::NotEvaluable {
                application_id,
                status: application.status,
            });
        }

        let config = c.features.snapshot()?;
        let signals = self.collect_signals(&application)?;
        let environment = EvaluationEnvironment {
            config: &config,
            clock: c.clock.as_ref(),
            delay: c.delay.as_ref(),
            mycroft_scores: c.mycroft_scores.as_ref(),
            holdouts: c.holdouts.as_ref(),
        };
        let report = self.engine.evaluate(&application, &signals, &environment)?;

        c.audit
            .append(report.outcomes.clone())
            .map_err(EligibilityServiceError::Audit)?;

        let status_changed = match &report.decision {
            Decision::Transition(transition) => self.apply(&application, transition)?,
            Decision::NoDecision { hold } => {
                self.route_hold(&application, *hold)?;
                false
            }
        };

        info!(
            application_id = %application_id,
            decision = %report.decision.summary(),
            status_changed,
            "eligibility decision processed"
        );

        Ok(EligibilityRun {
            report,
            status_changed,
        })
    }

    pub fn history(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<RuleCheckOutcome>, EligibilityServiceError> {
        Ok(self.collaborators.audit.history(application_id)?)
    }

    fn collect_signals(
        &self,
        application: &ApplicationSnapshot,
    ) -> Result<EvaluationSignals, EligibilityServiceError> {
        let c = &self.collaborators;
        let id = application.application_id;

        // The mycroft gate owns every score lookup so its attempt bound holds.
        Ok(EvaluationSignals {
            liveness: c.liveness.latest(id)?,
            credit_score: c.scores.credit_score(id)?,
            mycroft_score: None,
            risk: c.risk.collect(application)?,
        })
    }

    fn apply(
        &self,
        application: &ApplicationSnapshot,
        transition: &StatusTransition,
    ) -> Result<bool, EligibilityServiceError> {
        let c = &self.collaborators;
        let id = application.application_id;

        let changed = c.gateway.apply(id, transition.status, &transition.reason)?;
        if let Some(lock) = &transition.reapply_lock {
            c.gateway.lock_reapply(lock.customer_id, lock.until)?;
        }

        if !changed {
            warn!(
                application_id = %id,
                status = transition.status.label(),
                "status transition was a no-op"
            );
            return Ok(false);
        }

        c.tasks.enqueue(
            tasks::NOTIFY_STATUS_CHANGE,
            json!({
                "application_id": id,
                "status_code": transition.status.code(),
                "reason": transition.reason,
            }),
            None,
        )?;

        if let Some(FollowUp::AntiFraudRetry) = transition.follow_up {
            c.tasks.enqueue(
                tasks::ANTI_FRAUD_RETRY,
                json!({ "application_id": id }),
                Some(self.engine.settings().anti_fraud_retry_delay),
            )?;
        }

        Ok(true)
    }

    fn route_hold(
        &self,
        application: &ApplicationSnapshot,
        hold: Hold,
    ) -> Result<(), EligibilityServiceError> {
        let c = &self.collaborators;
        let id = application.application_id;
        let payload = json!({ "application_id": id });

        let task = match hold {
            Hold::SecondaryScoring => tasks::SHADOW_SCORE,
            Hold::Tracking => tasks::TRACK_PENDING_APPLICATION,
            Hold::AwaitingRetry => {
                info!(application_id = %id, "awaiting anti fraud retry in suspicious hold");
                return Ok(());
            }
        };
        c.tasks.enqueue(task, payload, None)?;
        Ok(())
    }
}

/// Error raised by the eligibility service.
#[derive(Debug, thiserror::Error)]
pub enum EligibilityServiceError {
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error("application {0} is soft-deleted")]
    Deleted(ApplicationId),
    #[error("application {application_id} cannot be evaluated in status {}", .status.code())]
    NotEvaluable {
        application_id: ApplicationId,
        status: ApplicationStatus,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("audit trail write failed: {0}")]
    Audit(RepositoryError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}
