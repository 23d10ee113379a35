use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::audit::{CheckVerdict, RuleCheckOutcome};
use super::clock::{Clock, Delay};
use super::config::{ConfigSnapshot, PipelineSettings};
use super::domain::{ApplicationId, ApplicationSnapshot, EvaluationSignals};
use super::holdout::{HoldoutAssignment, HoldoutError};
use super::mycroft::MycroftOutcome;
use super::policy::{Decision, Hold};
use super::repository::{HoldoutStore, MycroftScoreSource};
use super::rules::{RuleContext, RuleResult, PIPELINE};

/// Everything an evaluation reads besides the application and its signals.
pub struct EvaluationEnvironment<'a> {
    pub config: &'a ConfigSnapshot,
    pub clock: &'a dyn Clock,
    pub delay: &'a dyn Delay,
    pub mycroft_scores: &'a dyn MycroftScoreSource,
    pub holdouts: &'a dyn HoldoutStore,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Holdout(#[from] HoldoutError),
}

/// Result of one pipeline run with the audit trail that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub application_id: ApplicationId,
    pub decision: Decision,
    pub outcomes: Vec<RuleCheckOutcome>,
    pub mycroft: Option<MycroftOutcome>,
    pub holdout: Option<HoldoutAssignment>,
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationReport {
    pub fn is_mycroft_holdout(&self) -> bool {
        self.holdout
            .as_ref()
            .map(HoldoutAssignment::is_holdout)
            .unwrap_or(false)
    }
}

/// Short-circuiting runner over the ordered check list.
///
/// The engine never writes application status. Holdout assignments are the
/// only state it persists, through the injected store.
pub struct EligibilityRuleEngine {
    settings: PipelineSettings,
}

impl EligibilityRuleEngine {
    pub fn new(settings: PipelineSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn evaluate(
        &self,
        application: &ApplicationSnapshot,
        signals: &EvaluationSignals,
        environment: &EvaluationEnvironment<'_>,
    ) -> Result<EvaluationReport, EngineError> {
        let evaluated_at = environment.clock.now();
        let application_id = application.application_id;
        let mut ctx = RuleContext {
            application,
            signals,
            settings: &self.settings,
            environment,
            today: evaluated_at.date_naive(),
            mycroft: None,
            holdout: None,
        };

        let mut outcomes = Vec::with_capacity(PIPELINE.len());
        let mut decision = None;

        for rule in PIPELINE.iter() {
            let result = (rule.run)(&mut ctx)?;
            let (verdict, detail) = match result {
                RuleResult::Skip(detail) => (CheckVerdict::Skipped, detail),
                RuleResult::Continue(detail) => (CheckVerdict::Cleared, detail),
                RuleResult::Decide(reached) => {
                    let detail = reached.summary();
                    decision = Some(reached);
                    (CheckVerdict::Triggered, detail)
                }
            };
            debug!(
                application_id = %application_id,
                check = rule.name.label(),
                ?verdict,
                detail = %detail,
                "eligibility check evaluated"
            );
            outcomes.push(RuleCheckOutcome {
                application_id,
                check: rule.name,
                verdict,
                detail,
                is_mycroft_holdout: ctx.is_mycroft_holdout(),
                evaluated_at,
            });
            if decision.is_some() {
                break;
            }
        }

        let decision = decision.unwrap_or(Decision::hold(Hold::Tracking));
        info!(
            application_id = %application_id,
            checks = outcomes.len(),
            decision = %decision.summary(),
            "eligibility evaluation finished"
        );

        Ok(EvaluationReport {
            application_id,
            decision,
            outcomes,
            mycroft: ctx.mycroft,
            holdout: ctx.holdout,
            evaluated_at,
        })
    }
}
