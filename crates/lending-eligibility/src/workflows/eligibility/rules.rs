use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::anti_fraud::{self, AntiFraudContext};
use super::config::{features, ConfigSnapshot, PipelineSettings, UW_OVERHAUL_COHORT};
use super::domain::{
    ApplicationSnapshot, ApplicationStatus, EvaluationSignals, FdcStatus, ScoreTier,
};
use super::engine::{EngineError, EvaluationEnvironment};
use super::entry_level::{self, EntryLevelConfig};
use super::holdout::{HoldoutAssignment, HoldoutAssignmentResolver, HoldoutExperiment};
use super::mycroft::{MycroftGate, MycroftOutcome, MycroftThreshold, MycroftVerdict, RetryPolicy};
use super::policy::{reasons, Decision, Hold};

/// Checks in pipeline priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckName {
    VideoInjection,
    CreditScoreC,
    HighScoreFullBypass,
    VerifiedDataBypass,
    UwOverhaul,
    Mycroft,
    AntiFraudBinary,
    HighRiskAsn,
    OfflineActivation,
    EntryLevelWaitlist,
    BpjsNoFdcBypass,
    GoodFdcBypass,
    TelcoSwapInBypass,
    Fallback,
}

impl CheckName {
    pub const fn label(self) -> &'static str {
        match self {
            CheckName::VideoInjection => "video_injection",
            CheckName::CreditScoreC => "credit_score_c",
            CheckName::HighScoreFullBypass => "high_score_full_bypass",
            CheckName::VerifiedDataBypass => "verified_data_bypass",
            CheckName::UwOverhaul => "uw_overhaul",
            CheckName::Mycroft => "mycroft",
            CheckName::AntiFraudBinary => "anti_fraud_binary",
            CheckName::HighRiskAsn => "high_risk_asn",
            CheckName::OfflineActivation => "offline_activation",
            CheckName::EntryLevelWaitlist => "entry_level_waitlist",
            CheckName::BpjsNoFdcBypass => "bpjs_no_fdc_bypass",
            CheckName::GoodFdcBypass => "good_fdc_bypass",
            CheckName::TelcoSwapInBypass => "telco_swap_in_bypass",
            CheckName::Fallback => "fallback",
        }
    }
}

/// What a single check concluded.
pub(crate) enum RuleResult {
    Skip(String),
    Continue(String),
    Decide(Decision),
}

fn skip(detail: &str) -> Result<RuleResult, EngineError> {
    Ok(RuleResult::Skip(detail.to_string()))
}

fn clear(detail: impl Into<String>) -> Result<RuleResult, EngineError> {
    Ok(RuleResult::Continue(detail.into()))
}

fn decide(decision: Decision) -> Result<RuleResult, EngineError> {
    Ok(RuleResult::Decide(decision))
}

fn allow(reason: &str) -> Result<RuleResult, EngineError> {
    decide(Decision::transition(
        ApplicationStatus::ScrapedDataVerified,
        reason,
    ))
}

/// Per-run state shared by the checks. Inputs are read-only snapshots.
pub(crate) struct RuleContext<'a> {
    pub(crate) application: &'a ApplicationSnapshot,
    pub(crate) signals: &'a EvaluationSignals,
    pub(crate) settings: &'a PipelineSettings,
    pub(crate) environment: &'a EvaluationEnvironment<'a>,
    pub(crate) today: NaiveDate,
    pub(crate) mycroft: Option<MycroftOutcome>,
    pub(crate) holdout: Option<HoldoutAssignment>,
}

impl<'a> RuleContext<'a> {
    fn config(&self) -> &'a ConfigSnapshot {
        self.environment.config
    }

    pub(crate) fn is_mycroft_holdout(&self) -> bool {
        self.holdout
            .as_ref()
            .map(HoldoutAssignment::is_holdout)
            .unwrap_or(false)
    }
}

pub(crate) type RuleFn = fn(&mut RuleContext<'_>) -> Result<RuleResult, EngineError>;

pub(crate) struct Rule {
    pub(crate) name: CheckName,
    pub(crate) run: RuleFn,
}

const fn rule(name: CheckName, run: RuleFn) -> Rule {
    Rule { name, run }
}

/// The first check returning a decision ends the run; `Fallback` always decides.
pub(crate) const PIPELINE: [Rule; 14] = [
    rule(CheckName::VideoInjection, video_injection),
    rule(CheckName::CreditScoreC, credit_score_c),
    rule(CheckName::HighScoreFullBypass, high_score_full_bypass),
    rule(CheckName::VerifiedDataBypass, verified_data_bypass),
    rule(CheckName::UwOverhaul, uw_overhaul),
    rule(CheckName::Mycroft, mycroft),
    rule(CheckName::AntiFraudBinary, anti_fraud_binary),
    rule(CheckName::HighRiskAsn, high_risk_asn),
    rule(CheckName::OfflineActivation, offline_activation),
    rule(CheckName::EntryLevelWaitlist, entry_level_waitlist),
    rule(CheckName::BpjsNoFdcBypass, bpjs_no_fdc_bypass),
    rule(CheckName::GoodFdcBypass, good_fdc_bypass),
    rule(CheckName::TelcoSwapInBypass, telco_swap_in_bypass),
    rule(CheckName::Fallback, fallback),
];

fn video_injection(ctx: &mut RuleContext<'_>) -> Result<RuleResult, EngineError> {
    match &ctx.signals.liveness {
        None => skip("no liveness result"),
        Some(liveness) if liveness.is_video_injection() => decide(Decision::transition(
            ApplicationStatus::FlaggedForFraud,
            reasons::VIDEO_INJECTION,
        )),
        Some(_) => clear("no video injection"),
    }
}

fn credit_score_c(ctx: &mut RuleContext<'_>) -> Result<RuleResult, EngineError> {
    match ctx.signals.effective_tier() {
        None => skip("no credit score"),
        Some(ScoreTier::C) => decide(Decision::hold(Hold::SecondaryScoring)),
        Some(tier) => clear(format!("tier {}", tier.label())),
    }
}

#[derive(Debug, Deserialize)]
struct HighScoreBypassParameters {
    #[serde(default)]
    minimum_pgood: Option<f64>,
}

fn high_score_full_bypass(ctx: &mut RuleContext<'_>) -> Result<RuleResult, EngineError> {
    let Some(parameters) = ctx
        .config()
        .parameters::<HighScoreBypassParameters>(features::HIGH_SCORE_FULL_BYPASS)
    else {
        return skip("feature inactive");
    };
    if ctx.signals.liveness_failed() {
        return clear("liveness failed");
    }
    if let Some(minimum) = parameters.minimum_pgood {
        let pgood = ctx.signals.credit_score.as_ref().map(|score| score.pgood);
        let below = pgood
            .map(|pgood| !pgood.is_finite() || pgood < minimum)
            .unwrap_or(true);
        if below {
            return clear(format!("pgood below {minimum:.2}"));
        }
    }
    allow(features::HIGH_SCORE_FULL_BYPASS)
}

fn verified_data_bypass(ctx: &mut RuleContext<'_>) -> Result<RuleResult, EngineError> {
    if ctx.application.device_has_suspicious_application {
        return clear("device has a suspicious application");
    }
    let risk = &ctx.signals.risk;
    if !(risk.bpjs_verified || risk.bank_scrape_present) {
        return clear("no verified BPJS or bank scrape data");
    }
    let Some(tier) = ctx.signals.effective_tier() else {
        return skip("no credit score");
    };
    if tier.is_high() {
        allow(reasons::HIGH_SCORE_BYPASS)
    } else {
        allow(reasons::MEDIUM_SCORE_BYPASS)
    }
}

fn uw_overhaul(ctx: &mut RuleContext<'_>) -> Result<RuleResult, EngineError> {
    if !ctx.application.in_cohort(UW_OVERHAUL_COHORT) {
        return skip("not in experiment cohort");
    }
    if ctx.signals.risk.face_similarity_passed == Some(false) {
        return clear("face similarity failed");
    }
    if ctx.signals.risk.revived_by_alternate_score {
        allow(reasons::REVIVED_BY_ALTERNATE_SCORE)
    } else {
        allow(reasons::PASS_BINARY_AND_DECISION)
    }
}

fn mycroft(ctx: &mut RuleContext<'_>) -> Result<RuleResult, EngineError> {
    let Some(threshold) = MycroftThreshold::from_config(ctx.config()) else {
        return skip("threshold not configured");
    };
    let environment = ctx.environment;
    let id = ctx.application.application_id;
    let gate = MycroftGate::new(threshold, RetryPolicy::from(ctx.settings));
    let outcome = gate.check(
        id,
        ctx.signals.mycroft_score,
        environment.mycroft_scores,
        environment.delay,
    );
    ctx.mycroft = Some(outcome);

    if outcome.verdict() == MycroftVerdict::Passed {
        return clear(format!(
            "{:?} after {} attempt(s), score {:?}",
            outcome.state, outcome.attempts, outcome.score
        ));
    }

    if let Some(experiment) =
        HoldoutExperiment::from_config(ctx.config(), features::MYCROFT_HOLDOUT)
    {
        let resolver = HoldoutAssignmentResolver::new(environment.holdouts);
        ctx.holdout = resolver.resolve(&experiment, id, ctx.today)?;
    }

    if ctx.is_mycroft_holdout() {
        clear(format!("failed with score {:?}, held out", outcome.score))
    } else {
        decide(Decision::transition(
            ApplicationStatus::Denied,
            reasons::MYCROFT_FAIL,
        ))
    }
}

fn anti_fraud_binary(ctx: &mut RuleContext<'_>) -> Result<RuleResult, EngineError> {
    let Some(status) = ctx.signals.risk.anti_fraud else {
        return skip("no anti fraud result");
    };
    let context = AntiFraudContext {
        current_status: ctx.application.status,
        customer_id: ctx.application.customer_id,
        today: ctx.today,
        reapply_lock_days: ctx.settings.reapply_lock_days,
    };
    match anti_fraud::decide(status, &context) {
        Some(decision) => decide(decision),
        None => clear(format!("{status:?}")),
    }
}

fn high_risk_asn(ctx: &mut RuleContext<'_>) -> Result<RuleResult, EngineError> {
    if !ctx.config().is_active(features::HIGH_RISK_ASN) {
        return skip("feature inactive");
    }
    match ctx.signals.risk.high_risk_asn {
        None => skip("no ASN data"),
        Some(true) => decide(Decision::transition(
            ApplicationStatus::DocumentsSubmitted,
            reasons::HIGH_RISK_ASN,
        )),
        Some(false) => clear("ASN not high risk"),
    }
}

#[derive(Debug, Deserialize)]
struct OfflineActivationParameters {
    referral_codes: BTreeSet<String>,
}

fn offline_activation(ctx: &mut RuleContext<'_>) -> Result<RuleResult, EngineError> {
    let Some(parameters) = ctx
        .config()
        .parameters::<OfflineActivationParameters>(features::OFFLINE_ACTIVATION)
    else {
        return skip("feature inactive");
    };
    let Some(code) = ctx.application.referral_code.as_deref() else {
        return clear("no referral code");
    };
    let matched = parameters
        .referral_codes
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(code.trim()));
    if matched {
        allow(reasons::OFFLINE_ACTIVATION)
    } else {
        clear("referral code not an activation booth")
    }
}

fn entry_level_waitlist(ctx: &mut RuleContext<'_>) -> Result<RuleResult, EngineError> {
    let Some(config) = EntryLevelConfig::from_config(ctx.config()) else {
        return skip("feature inactive");
    };
    match entry_level::assess(ctx.application, ctx.signals.credit_score.as_ref(), &config) {
        Some(offer) if offer.waitlisted => decide(Decision::transition(
            ApplicationStatus::WaitingList,
            reasons::ENTRY_LEVEL_WAITLIST,
        )),
        Some(offer) => clear(format!(
            "entry level limit {} without waitlist",
            offer.limit_amount
        )),
        None => clear("not entry level eligible"),
    }
}

fn bpjs_no_fdc_bypass(ctx: &mut RuleContext<'_>) -> Result<RuleResult, EngineError> {
    if !ctx.config().is_active(features::BPJS_NO_FDC_BYPASS) {
        return skip("feature inactive");
    }
    let risk = &ctx.signals.risk;
    if risk.bpjs_verified && risk.fdc == Some(FdcStatus::NotFound) {
        allow(reasons::BPJS_NO_FDC_BYPASS)
    } else {
        clear("requires verified BPJS without FDC data")
    }
}

fn good_fdc_bypass(ctx: &mut RuleContext<'_>) -> Result<RuleResult, EngineError> {
    if !ctx.config().is_active(features::GOOD_FDC_BYPASS) {
        return skip("feature inactive");
    }
    match ctx.signals.risk.fdc {
        None => skip("no FDC inquiry"),
        Some(FdcStatus::Good) => allow(reasons::GOOD_FDC_BYPASS),
        Some(status) => clear(format!("FDC {status:?}")),
    }
}

fn telco_swap_in_bypass(ctx: &mut RuleContext<'_>) -> Result<RuleResult, EngineError> {
    if !ctx.config().is_active(features::TELCO_SWAP_IN) {
        return skip("feature inactive");
    }
    match ctx.signals.risk.telco_swap_in_passed {
        None => skip("no telco score"),
        Some(true) => allow(reasons::TELCO_SWAP_IN_BYPASS),
        Some(false) => clear("telco swap in not passed"),
    }
}

fn fallback(ctx: &mut RuleContext<'_>) -> Result<RuleResult, EngineError> {
    if ctx.signals.liveness_failed() {
        return decide(Decision::transition(
            ApplicationStatus::SupervisorReview,
            reasons::FAILED_LIVENESS,
        ));
    }
    if ctx.is_mycroft_holdout() {
        return decide(Decision::transition(
            ApplicationStatus::DocumentsSubmitted,
            reasons::MYCROFT_HOLDOUT,
        ));
    }
    decide(Decision::hold(Hold::Tracking))
}
