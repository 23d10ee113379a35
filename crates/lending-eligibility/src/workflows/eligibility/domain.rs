use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::scoring::binary_check_override;

/// Identifier wrapper for loan applications. Cohort bucketing reads its decimal digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub u64);

impl ApplicationId {
    pub const fn last_digit(self) -> u8 {
        (self.0 % 10) as u8
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the customer owning one or more applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub u64);

/// Application status codes the pipeline reads or produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    FormPartial,
    WaitingList,
    SuspiciousHold,
    DocumentsSubmitted,
    ScrapedDataVerified,
    FlaggedForFraud,
    SupervisorReview,
    Denied,
}

impl ApplicationStatus {
    pub const fn code(self) -> u16 {
        match self {
            ApplicationStatus::FormPartial => 105,
            ApplicationStatus::WaitingList => 109,
            ApplicationStatus::SuspiciousHold => 115,
            ApplicationStatus::DocumentsSubmitted => 120,
            ApplicationStatus::ScrapedDataVerified => 121,
            ApplicationStatus::FlaggedForFraud => 133,
            ApplicationStatus::SupervisorReview => 134,
            ApplicationStatus::Denied => 135,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::FormPartial => "form_partial",
            ApplicationStatus::WaitingList => "waiting_list",
            ApplicationStatus::SuspiciousHold => "suspicious_hold",
            ApplicationStatus::DocumentsSubmitted => "documents_submitted",
            ApplicationStatus::ScrapedDataVerified => "scraped_data_verified",
            ApplicationStatus::FlaggedForFraud => "flagged_for_fraud",
            ApplicationStatus::SupervisorReview => "supervisor_review",
            ApplicationStatus::Denied => "denied",
        }
    }

    /// Statuses from which the post-ITI pipeline may run.
    pub const fn is_evaluable(self) -> bool {
        matches!(
            self,
            ApplicationStatus::FormPartial | ApplicationStatus::SuspiciousHold
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductLine {
    J1,
    JuloTurbo,
    Partnership,
}

/// Read-only view of an application taken at the start of an evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSnapshot {
    pub application_id: ApplicationId,
    pub customer_id: CustomerId,
    pub status: ApplicationStatus,
    pub product_line: ProductLine,
    #[serde(default)]
    pub partner: Option<String>,
    #[serde(default)]
    pub referral_code: Option<String>,
    /// Set when the device already submitted an application flagged as suspicious.
    #[serde(default)]
    pub device_has_suspicious_application: bool,
    #[serde(default)]
    pub experiment_cohorts: BTreeSet<String>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl ApplicationSnapshot {
    pub fn in_cohort(&self, cohort: &str) -> bool {
        self.experiment_cohorts.contains(cohort)
    }
}

/// Credit score tiers ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScoreTier {
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "C")]
    C,
}

impl ScoreTier {
    pub const fn label(self) -> &'static str {
        match self {
            ScoreTier::A => "A",
            ScoreTier::AMinus => "A-",
            ScoreTier::BPlus => "B+",
            ScoreTier::B => "B",
            ScoreTier::BMinus => "B-",
            ScoreTier::C => "C",
        }
    }

    pub const fn is_high(self) -> bool {
        matches!(self, ScoreTier::A | ScoreTier::AMinus | ScoreTier::BPlus)
    }
}

/// Output of one credit model run. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub tier: ScoreTier,
    pub pgood: f64,
    pub model_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessResult {
    pub passed: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

impl LivenessResult {
    pub fn failed(&self) -> bool {
        !self.passed
    }

    pub fn is_video_injection(&self) -> bool {
        self.failed()
            && self
                .reason
                .as_deref()
                .map(|reason| reason.to_ascii_lowercase().contains("video injection"))
                .unwrap_or(false)
    }
}

/// Result codes returned by the anti-fraud binary-check service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AntiFraudStatus {
    Allowed,
    Bypassed,
    DoNothing,
    Error,
    Retrying,
    #[serde(rename = "move_to_115")]
    MoveTo115,
    #[serde(rename = "move_to_133")]
    MoveTo133,
    #[serde(rename = "move_to_135")]
    MoveTo135,
}

/// Financial data collection bureau inquiry outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FdcStatus {
    Good,
    Bad,
    NotFound,
}

/// Fraud and bypass signals supplied by the risk providers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSignals {
    #[serde(default)]
    pub binary_check_failures: BTreeSet<String>,
    #[serde(default)]
    pub anti_fraud: Option<AntiFraudStatus>,
    #[serde(default)]
    pub bpjs_verified: bool,
    #[serde(default)]
    pub bank_scrape_present: bool,
    #[serde(default)]
    pub face_similarity_passed: Option<bool>,
    #[serde(default)]
    pub revived_by_alternate_score: bool,
    #[serde(default)]
    pub high_risk_asn: Option<bool>,
    #[serde(default)]
    pub fdc: Option<FdcStatus>,
    #[serde(default)]
    pub telco_swap_in_passed: Option<bool>,
}

/// External signals gathered once per evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSignals {
    #[serde(default)]
    pub liveness: Option<LivenessResult>,
    #[serde(default)]
    pub credit_score: Option<ScoreResult>,
    /// Secondary fraud model pgood when it had already materialised at snapshot time.
    #[serde(default)]
    pub mycroft_score: Option<f64>,
    #[serde(flatten)]
    pub risk: RiskSignals,
}

impl EvaluationSignals {
    /// Liveness is treated as passing when no result exists.
    pub fn liveness_failed(&self) -> bool {
        self.liveness
            .as_ref()
            .map(LivenessResult::failed)
            .unwrap_or(false)
    }

    /// Tier after binary-check failures force the lowest band.
    pub fn effective_tier(&self) -> Option<ScoreTier> {
        binary_check_override(&self.risk.binary_check_failures)
            .or_else(|| self.credit_score.as_ref().map(|score| score.tier))
    }
}
