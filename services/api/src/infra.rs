use chrono::NaiveDate;
use lending_eligibility::error::AppError;
use lending_eligibility::workflows::eligibility::{
    ApplicationId, ApplicationRepository, ApplicationSnapshot, ApplicationStatus, AuditLog,
    Clock, Collaborators, ConfigSnapshot, CustomerId, Delay, DispatchError, EvaluationSignals,
    FeatureFlagStore, GatewayError, HoldoutAssignment, HoldoutStore, LivenessProvider,
    LivenessResult, MycroftScoreSource, RepositoryError, RiskSignalProvider, RiskSignals,
    RuleCheckOutcome, ScoreRepository, ScoreResult, StatusTransitionGateway, TaskDispatcher,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// One status change written through the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct StatusHistoryEntry {
    pub(crate) application_id: ApplicationId,
    pub(crate) from: ApplicationStatus,
    pub(crate) to: ApplicationStatus,
    pub(crate) reason: String,
}

/// Application store that doubles as the status gateway so transitions are visible to reads.
#[derive(Default, Clone)]
pub(crate) struct InMemoryApplicationRepository {
    records: Arc<Mutex<HashMap<ApplicationId, ApplicationSnapshot>>>,
    history: Arc<Mutex<Vec<StatusHistoryEntry>>>,
    reapply_locks: Arc<Mutex<HashMap<CustomerId, NaiveDate>>>,
}

impl InMemoryApplicationRepository {
    pub(crate) fn insert(&self, snapshot: ApplicationSnapshot) {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.insert(snapshot.application_id, snapshot);
    }

    pub(crate) fn history(&self) -> Vec<StatusHistoryEntry> {
        self.history.lock().expect("history mutex poisoned").clone()
    }

    pub(crate) fn reapply_lock(&self, customer: CustomerId) -> Option<NaiveDate> {
        self.reapply_locks
            .lock()
            .expect("lock mutex poisoned")
            .get(&customer)
            .copied()
    }
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn fetch(&self, id: ApplicationId) -> Result<Option<ApplicationSnapshot>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(&id).cloned())
    }
}

impl StatusTransitionGateway for InMemoryApplicationRepository {
    fn apply(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
        reason: &str,
    ) -> Result<bool, GatewayError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let record = guard
            .get_mut(&id)
            .ok_or_else(|| GatewayError::Rejected(format!("application {id} not found")))?;
        if record.status == status {
            return Ok(false);
        }

        let from = record.status;
        record.status = status;
        self.history
            .lock()
            .expect("history mutex poisoned")
            .push(StatusHistoryEntry {
                application_id: id,
                from,
                to: status,
                reason: reason.to_string(),
            });
        Ok(true)
    }

    fn lock_reapply(&self, customer: CustomerId, until: NaiveDate) -> Result<(), GatewayError> {
        let mut guard = self.reapply_locks.lock().expect("lock mutex poisoned");
        guard.insert(customer, until);
        Ok(())
    }
}

/// Feature flags loaded once from JSON, or empty when no file is configured.
#[derive(Default, Clone)]
pub(crate) struct StaticFeatureFlagStore {
    snapshot: ConfigSnapshot,
}

impl StaticFeatureFlagStore {
    pub(crate) fn new(snapshot: ConfigSnapshot) -> Self {
        Self { snapshot }
    }

    pub(crate) fn from_path(path: Option<&Path>) -> Result<Self, AppError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)?;
        let snapshot: ConfigSnapshot = serde_json::from_str(&raw)?;
        info!(
            path = %path.display(),
            features = snapshot.features.len(),
            "loaded feature flags"
        );
        Ok(Self::new(snapshot))
    }
}

impl FeatureFlagStore for StaticFeatureFlagStore {
    fn snapshot(&self) -> Result<ConfigSnapshot, RepositoryError> {
        Ok(self.snapshot.clone())
    }
}

/// Scores, liveness, and risk signals keyed by application.
#[derive(Default, Clone)]
pub(crate) struct InMemorySignalStore {
    signals: Arc<Mutex<HashMap<ApplicationId, EvaluationSignals>>>,
}

impl InMemorySignalStore {
    pub(crate) fn insert(&self, id: ApplicationId, signals: EvaluationSignals) {
        let mut guard = self.signals.lock().expect("signal mutex poisoned");
        guard.insert(id, signals);
    }

    fn read<T>(&self, id: ApplicationId, pick: impl FnOnce(&EvaluationSignals) -> T) -> Option<T> {
        let guard = self.signals.lock().expect("signal mutex poisoned");
        guard.get(&id).map(pick)
    }
}

impl ScoreRepository for InMemorySignalStore {
    fn credit_score(&self, id: ApplicationId) -> Result<Option<ScoreResult>, RepositoryError> {
        Ok(self
            .read(id, |signals| signals.credit_score.clone())
            .flatten())
    }
}

impl MycroftScoreSource for InMemorySignalStore {
    fn latest_pgood(&self, id: ApplicationId) -> Result<Option<f64>, RepositoryError> {
        Ok(self.read(id, |signals| signals.mycroft_score).flatten())
    }
}

impl LivenessProvider for InMemorySignalStore {
    fn latest(&self, id: ApplicationId) -> Result<Option<LivenessResult>, RepositoryError> {
        Ok(self.read(id, |signals| signals.liveness.clone()).flatten())
    }
}

impl RiskSignalProvider for InMemorySignalStore {
    fn collect(&self, snapshot: &ApplicationSnapshot) -> Result<RiskSignals, RepositoryError> {
        Ok(self
            .read(snapshot.application_id, |signals| signals.risk.clone())
            .unwrap_or_default())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryHoldoutStore {
    assignments: Arc<Mutex<HashMap<(String, ApplicationId), HoldoutAssignment>>>,
}

impl HoldoutStore for InMemoryHoldoutStore {
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
        let mut guard = self.assignments.lock().expect("holdout mutex poisoned");
        let key = (assignment.experiment_code.clone(), assignment.application_id);
        Ok(guard.entry(key).or_insert(assignment).clone())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryAuditLog {
    outcomes: Arc<Mutex<Vec<RuleCheckOutcome>>>,
}

impl AuditLog for InMemoryAuditLog {
    fn append(&self, outcomes: Vec<RuleCheckOutcome>) -> Result<(), RepositoryError> {
        let mut guard = self.outcomes.lock().expect("audit mutex poisoned");
        guard.extend(outcomes);
        Ok(())
    }

    fn history(&self, id: ApplicationId) -> Result<Vec<RuleCheckOutcome>, RepositoryError> {
        let guard = self.outcomes.lock().expect("audit mutex poisoned");
        Ok(guard
            .iter()
            .filter(|outcome| outcome.application_id == id)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct DispatchedTask {
    pub(crate) name: String,
    pub(crate) payload: serde_json::Value,
    pub(crate) delay_secs: Option<u64>,
}

/// Records follow-up tasks instead of handing them to a queue.
#[derive(Default, Clone)]
pub(crate) struct RecordingTaskDispatcher {
    tasks: Arc<Mutex<Vec<DispatchedTask>>>,
}

impl RecordingTaskDispatcher {
    pub(crate) fn tasks(&self) -> Vec<DispatchedTask> {
        self.tasks.lock().expect("task mutex poisoned").clone()
    }
}

impl TaskDispatcher for RecordingTaskDispatcher {
    fn enqueue(
        &self,
        name: &str,
        payload: serde_json::Value,
        delay: Option<Duration>,
    ) -> Result<(), DispatchError> {
        info!(task = name, ?delay, "follow-up task enqueued");
        let mut guard = self.tasks.lock().expect("task mutex poisoned");
        guard.push(DispatchedTask {
            name: name.to_string(),
            payload,
            delay_secs: delay.map(|delay| delay.as_secs()),
        });
        Ok(())
    }
}

/// Every in-memory collaborator behind one handle for the server, CLI, and demo.
#[derive(Clone)]
pub(crate) struct InMemoryBackend {
    pub(crate) applications: InMemoryApplicationRepository,
    pub(crate) features: StaticFeatureFlagStore,
    pub(crate) signals: InMemorySignalStore,
    pub(crate) holdouts: InMemoryHoldoutStore,
    pub(crate) audit: InMemoryAuditLog,
    pub(crate) tasks: RecordingTaskDispatcher,
}

impl InMemoryBackend {
    pub(crate) fn new(features: StaticFeatureFlagStore) -> Self {
        Self {
            applications: InMemoryApplicationRepository::default(),
            features,
            signals: InMemorySignalStore::default(),
            holdouts: InMemoryHoldoutStore::default(),
            audit: InMemoryAuditLog::default(),
            tasks: RecordingTaskDispatcher::default(),
        }
    }

    pub(crate) fn seed(&self, snapshot: ApplicationSnapshot, signals: EvaluationSignals) {
        self.signals.insert(snapshot.application_id, signals);
        self.applications.insert(snapshot);
    }

    pub(crate) fn collaborators(
        &self,
        clock: Arc<dyn Clock>,
        delay: Arc<dyn Delay>,
    ) -> Collaborators {
        let applications = Arc::new(self.applications.clone());
        let signals = Arc::new(self.signals.clone());
        Collaborators {
            applications: applications.clone(),
            features: Arc::new(self.features.clone()),
            scores: signals.clone(),
            mycroft_scores: signals.clone(),
            liveness: signals.clone(),
            risk: signals,
            holdouts: Arc::new(self.holdouts.clone()),
            audit: Arc::new(self.audit.clone()),
            gateway: applications,
            tasks: Arc::new(self.tasks.clone()),
            clock,
            delay,
        }
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
