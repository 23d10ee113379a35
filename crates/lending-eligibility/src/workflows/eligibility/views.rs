use serde::Serialize;

use super::audit::{CheckVerdict, RuleCheckOutcome};
use super::domain::ApplicationId;
use super::engine::EvaluationReport;
use super::service::EligibilityRun;

/// Sanitized representation of one evaluation for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct EligibilityView {
    pub application_id: ApplicationId,
    pub decision: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub status_changed: bool,
    pub is_mycroft_holdout: bool,
    pub checks: Vec<CheckView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckView {
    pub check: &'static str,
    pub verdict: CheckVerdict,
    pub detail: String,
}

impl From<&RuleCheckOutcome> for CheckView {
    fn from(outcome: &RuleCheckOutcome) -> Self {
        Self {
            check: outcome.check.label(),
            verdict: outcome.verdict,
            detail: outcome.detail.clone(),
        }
    }
}

impl EvaluationReport {
    pub fn view(&self, status_changed: bool) -> EligibilityView {
        let status = self.decision.status();
        EligibilityView {
            application_id: self.application_id,
            decision: self.decision.summary(),
            status: status.map(|status| status.label()),
            status_code: status.map(|status| status.code()),
            reason: self.decision.reason().map(str::to_string),
            status_changed,
            is_mycroft_holdout: self.is_mycroft_holdout(),
            checks: self.outcomes.iter().map(CheckView::from).collect(),
        }
    }
}

impl EligibilityRun {
    pub fn view(&self) -> EligibilityView {
        self.report.view(self.status_changed)
    }
}
