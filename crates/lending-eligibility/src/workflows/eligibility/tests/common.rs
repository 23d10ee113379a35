use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::{json, Value};

use crate::workflows::eligibility::audit::RuleCheckOutcome;
use crate::workflows::eligibility::clock::{Delay, FixedClock};
use crate::workflows::eligibility::config::{
    features, ConfigSnapshot, FeatureSetting, PipelineSettings,
};
use crate::workflows::eligibility::domain::{
    ApplicationId, ApplicationSnapshot, ApplicationStatus, CustomerId, EvaluationSignals,
    LivenessResult, ProductLine, RiskSignals, ScoreResult, ScoreTier,
};
use crate::workflows::eligibility::engine::{
    EligibilityRuleEngine, EvaluationEnvironment, EvaluationReport,
};
use crate::workflows::eligibility::holdout::HoldoutAssignment;
use crate::workflows::eligibility::repository::{
    ApplicationRepository, AuditLog, DispatchError, FeatureFlagStore, GatewayError, HoldoutStore,
    LivenessProvider, MycroftScoreSource, RepositoryError, RiskSignalProvider, ScoreRepository,
    StatusTransitionGateway, TaskDispatcher,
};
use crate::workflows::eligibility::service::{Collaborators, EligibilityService};

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 10).expect("valid date")
}

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn application(id: u64) -> ApplicationSnapshot {
    ApplicationSnapshot {
        application_id: ApplicationId(id),
        customer_id: CustomerId(500 + id),
        status: ApplicationStatus::FormPartial,
        product_line: ProductLine::J1,
        partner: None,
        referral_code: None,
        device_has_suspicious_application: false,
        experiment_cohorts: BTreeSet::new(),
        is_deleted: false,
    }
}

pub(super) fn score(tier: ScoreTier, pgood: f64) -> ScoreResult {
    ScoreResult {
        tier,
        pgood,
        model_version: "j1-v7".to_string(),
    }
}

/// Liveness passed, tier B, no mycroft score yet, no risk signals.
pub(super) fn signals() -> EvaluationSignals {
    EvaluationSignals {
        liveness: Some(LivenessResult {
            passed: true,
            reason: None,
        }),
        credit_score: Some(score(ScoreTier::B, 0.82)),
        mycroft_score: None,
        risk: RiskSignals::default(),
    }
}

pub(super) fn failed_liveness(reason: &str) -> Option<LivenessResult> {
    Some(LivenessResult {
        passed: false,
        reason: Some(reason.to_string()),
    })
}

pub(super) fn active(parameters: Value) -> FeatureSetting {
    FeatureSetting::active(parameters)
}

pub(super) fn mycroft_config(operator: &str, threshold: f64) -> ConfigSnapshot {
    ConfigSnapshot::default().with_feature(
        features::MYCROFT_THRESHOLD,
        active(json!({ "operator": operator, "threshold": threshold })),
    )
}

pub(super) fn with_holdout(config: ConfigSnapshot, last_digits: &[u8]) -> ConfigSnapshot {
    config.with_feature(
        features::MYCROFT_HOLDOUT,
        active(json!({
            "last_digits": last_digits,
            "start_date": "2026-03-01",
            "end_date": "2026-03-31",
        })),
    )
}

pub(super) fn with_entry_level(config: ConfigSnapshot, waitlist: bool) -> ConfigSnapshot {
    config.with_feature(
        features::ENTRY_LEVEL_LIMIT,
        active(json!({
            "eligible_tiers": ["B", "B-"],
            "min_pgood": 0.75,
            "max_pgood": 0.83,
            "limit_amount": 300_000,
            "waitlist": waitlist,
        })),
    )
}

pub(super) fn with_switch(config: ConfigSnapshot, name: &str) -> ConfigSnapshot {
    config.with_feature(name, active(json!({})))
}

pub(super) fn fast_settings() -> PipelineSettings {
    PipelineSettings {
        mycroft_retry_delay: Duration::from_millis(5),
        ..PipelineSettings::default()
    }
}

/// Scripted mycroft lookups. Once the script runs out every call returns `fallback`.
#[derive(Default)]
pub(super) struct CountingMycroftSource {
    script: Mutex<VecDeque<Result<Option<f64>, RepositoryError>>>,
    fallback: Option<f64>,
    calls: AtomicUsize,
}

impl CountingMycroftSource {
    pub(super) fn never() -> Self {
        Self::default()
    }

    pub(super) fn always(score: f64) -> Self {
        Self {
            fallback: Some(score),
            ..Self::default()
        }
    }

    pub(super) fn scripted(script: Vec<Result<Option<f64>, RepositoryError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MycroftScoreSource for CountingMycroftSource {
    fn latest_pgood(&self, _id: ApplicationId) -> Result<Option<f64>, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.script.lock().expect("mycroft mutex poisoned");
        guard.pop_front().unwrap_or(Ok(self.fallback))
    }
}

#[derive(Default)]
pub(super) struct CountingDelay {
    pauses: Mutex<Vec<Duration>>,
}

impl CountingDelay {
    pub(super) fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().expect("delay mutex poisoned").clone()
    }
}

impl Delay for CountingDelay {
    fn pause(&self, duration: Duration) {
        self.pauses
            .lock()
            .expect("delay mutex poisoned")
            .push(duration);
    }
}

#[derive(Default)]
pub(super) struct MemoryHoldoutStore {
    assignments: Mutex<HashMap<(String, ApplicationId), HoldoutAssignment>>,
    inserts: AtomicUsize,
}

impl MemoryHoldoutStore {
    pub(super) fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub(super) fn stored(&self) -> Vec<HoldoutAssignment> {
        self.assignments
            .lock()
            .expect("holdout mutex poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub(super) fn preload(&self, assignment: HoldoutAssignment) {
        let key = (assignment.experiment_code.clone(), assignment.application_id);
        self.assignments
            .lock()
            .expect("holdout mutex poisoned")
            .insert(key, assignment);
    }
}

impl HoldoutStore for MemoryHoldoutStore {
    fn find(
        &self,
        experiment_code: &str,
        id: ApplicationId,
    ) -> Result<Option<HoldoutAssignment>, RepositoryError> {
        let guard = self.assignments.lock().expect("holdout mutex poisoned");
        Ok(guard.get(&(experiment_code.to_string(), id)).cloned())
    }

    fn insert_if_absent(
        &self,
        assignment: HoldoutAssignment,
    ) -> Result<HoldoutAssignment, RepositoryError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.assignments.lock().expect("holdout mutex poisoned");
        let key = (assignment.experiment_code.clone(), assignment.application_id);
        Ok(guard.entry(key).or_insert(assignment).clone())
    }
}

/// Holdout store whose backend is down.
pub(super) struct UnavailableHoldoutStore;

impl HoldoutStore for UnavailableHoldoutStore {
    fn find(
        &self,
        _experiment_code: &str,
        _id: ApplicationId,
    ) -> Result<Option<HoldoutAssignment>, RepositoryError> {
        Err(RepositoryError::Unavailable("holdout table offline".to_string()))
    }

    fn insert_if_absent(
        &self,
        _assignment: HoldoutAssignment,
    ) -> Result<HoldoutAssignment, RepositoryError> {
        Err(RepositoryError::Unavailable("holdout table offline".to_string()))
    }
}

/// Engine wired to in-memory doubles with a pinned clock.
pub(super) struct EngineHarness {
    pub(super) config: ConfigSnapshot,
    pub(super) settings: PipelineSettings,
    pub(super) mycroft: CountingMycroftSource,
    pub(super) delay: CountingDelay,
    pub(super) holdouts: MemoryHoldoutStore,
}

impl EngineHarness {
    pub(super) fn new(config: ConfigSnapshot) -> Self {
        Self {
            config,
            settings: fast_settings(),
            mycroft: CountingMycroftSource::never(),
            delay: CountingDelay::default(),
            holdouts: MemoryHoldoutStore::default(),
        }
    }

    pub(super) fn with_mycroft(mut self, source: CountingMycroftSource) -> Self {
        self.mycroft = source;
        self
    }

    pub(super) fn evaluate(
        &self,
        application: &ApplicationSnapshot,
        signals: &EvaluationSignals,
    ) -> EvaluationReport {
        let clock = FixedClock(now());
        let environment = EvaluationEnvironment {
            config: &self.config,
            clock: &clock,
            delay: &self.delay,
            mycroft_scores: &self.mycroft,
            holdouts: &self.holdouts,
        };
        EligibilityRuleEngine::new(self.settings.clone())
            .evaluate(application, signals, &environment)
            .expect("evaluation succeeds")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct AppliedTransition {
    pub(super) application_id: ApplicationId,
    pub(super) status: ApplicationStatus,
    pub(super) reason: String,
}

/// Application store that also acts as the status gateway.
#[derive(Default)]
pub(super) struct MemoryApplications {
    records: Mutex<HashMap<ApplicationId, ApplicationSnapshot>>,
    transitions: Mutex<Vec<AppliedTransition>>,
    locks: Mutex<Vec<(CustomerId, NaiveDate)>>,
}

impl MemoryApplications {
    pub(super) fn insert(&self, snapshot: ApplicationSnapshot) {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .insert(snapshot.application_id, snapshot);
    }

    pub(super) fn status(&self, id: ApplicationId) -> Option<ApplicationStatus> {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .get(&id)
            .map(|record| record.status)
    }

    pub(super) fn transitions(&self) -> Vec<AppliedTransition> {
        self.transitions
            .lock()
            .expect("transition mutex poisoned")
            .clone()
    }

    pub(super) fn locks(&self) -> Vec<(CustomerId, NaiveDate)> {
        self.locks.lock().expect("lock mutex poisoned").clone()
    }
}

impl ApplicationRepository for MemoryApplications {
    fn fetch(&self, id: ApplicationId) -> Result<Option<ApplicationSnapshot>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(&id).cloned())
    }
}

impl StatusTransitionGateway for MemoryApplications {
    fn apply(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
        reason: &str,
    ) -> Result<bool, GatewayError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let record = guard
            .get_mut(&id)
            .ok_or_else(|| GatewayError::Rejected(format!("unknown application {id}")))?;
        if record.status == status {
            return Ok(false);
        }
        record.status = status;
        self.transitions
            .lock()
            .expect("transition mutex poisoned")
            .push(AppliedTransition {
                application_id: id,
                status,
                reason: reason.to_string(),
            });
        Ok(true)
    }

    fn lock_reapply(&self, customer: CustomerId, until: NaiveDate) -> Result<(), GatewayError> {
        self.locks
            .lock()
            .expect("lock mutex poisoned")
            .push((customer, until));
        Ok(())
    }
}

pub(super) struct StaticFeatures(pub(super) ConfigSnapshot);

impl FeatureFlagStore for StaticFeatures {
    fn snapshot(&self) -> Result<ConfigSnapshot, RepositoryError> {
        Ok(self.0.clone())
    }
}

/// Credit score, liveness, and risk signals keyed by application.
#[derive(Default)]
pub(super) struct MemorySignals {
    signals: Mutex<HashMap<ApplicationId, EvaluationSignals>>,
}

impl MemorySignals {
    pub(super) fn insert(&self, id: ApplicationId, signals: EvaluationSignals) {
        self.signals
            .lock()
            .expect("signal mutex poisoned")
            .insert(id, signals);
    }

    fn get(&self, id: ApplicationId) -> Option<EvaluationSignals> {
        self.signals
            .lock()
            .expect("signal mutex poisoned")
            .get(&id)
            .cloned()
    }
}

impl ScoreRepository for MemorySignals {
    fn credit_score(&self, id: ApplicationId) -> Result<Option<ScoreResult>, RepositoryError> {
        Ok(self.get(id).and_then(|signals| signals.credit_score))
    }
}

impl LivenessProvider for MemorySignals {
    fn latest(&self, id: ApplicationId) -> Result<Option<LivenessResult>, RepositoryError> {
        Ok(self.get(id).and_then(|signals| signals.liveness))
    }
}

impl RiskSignalProvider for MemorySignals {
    fn collect(&self, snapshot: &ApplicationSnapshot) -> Result<RiskSignals, RepositoryError> {
        Ok(self
            .get(snapshot.application_id)
            .map(|signals| signals.risk)
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub(super) struct MemoryAudit {
    outcomes: Mutex<Vec<RuleCheckOutcome>>,
    pub(super) unavailable: bool,
}

impl MemoryAudit {
    pub(super) fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub(super) fn outcomes(&self) -> Vec<RuleCheckOutcome> {
        self.outcomes.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditLog for MemoryAudit {
    fn append(&self, outcomes: Vec<RuleCheckOutcome>) -> Result<(), RepositoryError> {
        if self.unavailable {
            return Err(RepositoryError::Unavailable("audit table offline".to_string()));
        }
        self.outcomes
            .lock()
            .expect("audit mutex poisoned")
            .extend(outcomes);
        Ok(())
    }

    fn history(&self, id: ApplicationId) -> Result<Vec<RuleCheckOutcome>, RepositoryError> {
        Ok(self
            .outcomes()
            .into_iter()
            .filter(|outcome| outcome.application_id == id)
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct QueuedTask {
    pub(super) name: String,
    pub(super) payload: Value,
    pub(super) delay: Option<Duration>,
}

#[derive(Default)]
pub(super) struct MemoryTasks {
    tasks: Mutex<Vec<QueuedTask>>,
    pub(super) unavailable: bool,
}

impl MemoryTasks {
    pub(super) fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub(super) fn tasks(&self) -> Vec<QueuedTask> {
        self.tasks.lock().expect("task mutex poisoned").clone()
    }

    pub(super) fn names(&self) -> Vec<String> {
        self.tasks().into_iter().map(|task| task.name).collect()
    }
}

impl TaskDispatcher for MemoryTasks {
    fn enqueue(
        &self,
        name: &str,
        payload: Value,
        delay: Option<Duration>,
    ) -> Result<(), DispatchError> {
        if self.unavailable {
            return Err(DispatchError::Transport("broker offline".to_string()));
        }
        self.tasks
            .lock()
            .expect("task mutex poisoned")
            .push(QueuedTask {
                name: name.to_string(),
                payload,
                delay,
            });
        Ok(())
    }
}

/// Service wired to in-memory collaborators; keeps handles for assertions.
pub(super) struct ServiceHarness {
    pub(super) applications: Arc<MemoryApplications>,
    pub(super) signals: Arc<MemorySignals>,
    pub(super) mycroft: Arc<CountingMycroftSource>,
    pub(super) holdouts: Arc<MemoryHoldoutStore>,
    pub(super) audit: Arc<MemoryAudit>,
    pub(super) tasks: Arc<MemoryTasks>,
    pub(super) delay: Arc<CountingDelay>,
    pub(super) config: ConfigSnapshot,
}

impl ServiceHarness {
    pub(super) fn new(config: ConfigSnapshot) -> Self {
        Self {
            applications: Arc::new(MemoryApplications::default()),
            signals: Arc::new(MemorySignals::default()),
            mycroft: Arc::new(CountingMycroftSource::never()),
            holdouts: Arc::new(MemoryHoldoutStore::default()),
            audit: Arc::new(MemoryAudit::default()),
            tasks: Arc::new(MemoryTasks::default()),
            delay: Arc::new(CountingDelay::default()),
            config,
        }
    }

    pub(super) fn with_mycroft(mut self, source: CountingMycroftSource) -> Self {
        self.mycroft = Arc::new(source);
        self
    }

    pub(super) fn with_audit(mut self, audit: MemoryAudit) -> Self {
        self.audit = Arc::new(audit);
        self
    }

    pub(super) fn with_tasks(mut self, tasks: MemoryTasks) -> Self {
        self.tasks = Arc::new(tasks);
        self
    }

    pub(super) fn seed(&self, snapshot: ApplicationSnapshot, signals: EvaluationSignals) {
        self.signals.insert(snapshot.application_id, signals);
        self.applications.insert(snapshot);
    }

    pub(super) fn service(&self) -> EligibilityService {
        let collaborators = Collaborators {
            applications: self.applications.clone(),
            features: Arc::new(StaticFeatures(self.config.clone())),
            scores: self.signals.clone(),
            mycroft_scores: self.mycroft.clone(),
            liveness: self.signals.clone(),
            risk: self.signals.clone(),
            holdouts: self.holdouts.clone(),
            audit: self.audit.clone(),
            gateway: self.applications.clone(),
            tasks: self.tasks.clone(),
            clock: Arc::new(FixedClock(now())),
            delay: self.delay.clone(),
        };
        EligibilityService::new(collaborators, fast_settings())
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}

pub(super) fn empty_body() -> Body {
    Body::empty()
}
