use super::common::*;
use std::time::Duration;

use crate::workflows::eligibility::config::{features, ConfigSnapshot};
use crate::workflows::eligibility::domain::{
    AntiFraudStatus, ApplicationId, ApplicationStatus, FdcStatus, ScoreTier,
};
use crate::workflows::eligibility::mycroft::MycroftState;
use crate::workflows::eligibility::policy::reasons;
use crate::workflows::eligibility::repository::{DispatchError, RepositoryError};
use crate::workflows::eligibility::rules::CheckName;
use crate::workflows::eligibility::service::{tasks, EligibilityServiceError};

#[test]
fn process_applies_transition_and_notifies() {
    let harness = ServiceHarness::new(with_switch(
        mycroft_config(">=", 0.8),
        features::GOOD_FDC_BYPASS,
    ))
    .with_mycroft(CountingMycroftSource::always(0.9));
    let mut signals = signals();
    signals.risk.fdc = Some(FdcStatus::Good);
    harness.seed(application(301), signals);

    let run = harness
        .service()
        .process(ApplicationId(301))
        .expect("evaluation succeeds");

    assert!(run.status_changed);
    assert_eq!(run.report.decision.reason(), Some(reasons::GOOD_FDC_BYPASS));
    assert_eq!(
        harness.applications.status(ApplicationId(301)),
        Some(ApplicationStatus::ScrapedDataVerified)
    );
    assert_eq!(harness.tasks.names(), vec![tasks::NOTIFY_STATUS_CHANGE]);
    assert_eq!(harness.audit.outcomes().len(), run.report.outcomes.len());
    assert_eq!(harness.mycroft.calls(), 1, "known score needs a single lookup");
}

#[test]
fn process_rejects_unknown_applications() {
    let harness = ServiceHarness::new(ConfigSnapshot::default());

    match harness.service().process(ApplicationId(999)) {
        Err(EligibilityServiceError::NotFound(id)) => assert_eq!(id, ApplicationId(999)),
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn process_rejects_soft_deleted_applications() {
    let harness = ServiceHarness::new(ConfigSnapshot::default());
    let mut application = application(302);
    application.is_deleted = true;
    harness.seed(application, signals());

    match harness.service().process(ApplicationId(302)) {
        Err(EligibilityServiceError::Deleted(_)) => {}
        other => panic!("expected deleted error, got {other:?}"),
    }
    assert!(harness.audit.outcomes().is_empty());
}

#[test]
fn process_rejects_applications_past_the_decision_point() {
    let harness = ServiceHarness::new(ConfigSnapshot::default());
    let mut application = application(303);
    application.status = ApplicationStatus::Denied;
    harness.seed(application, signals());

    let err = harness
        .service()
        .process(ApplicationId(303))
        .expect_err("denied applications are not evaluable");
    assert!(matches!(
        err,
        EligibilityServiceError::NotEvaluable {
            status: ApplicationStatus::Denied,
            ..
        }
    ));
    assert_eq!(
        err.to_string(),
        "application 303 cannot be evaluated in status 135"
    );
}

#[test]
fn audit_failure_prevents_the_decision_from_being_applied() {
    let harness =
        ServiceHarness::new(ConfigSnapshot::default()).with_audit(MemoryAudit::unavailable());
    let mut signals = signals();
    signals.risk.anti_fraud = Some(AntiFraudStatus::MoveTo133);
    harness.seed(application(304), signals);

    match harness.service().process(ApplicationId(304)) {
        Err(EligibilityServiceError::Audit(RepositoryError::Unavailable(_))) => {}
        other => panic!("expected audit error, got {other:?}"),
    }
    assert_eq!(
        harness.applications.status(ApplicationId(304)),
        Some(ApplicationStatus::FormPartial)
    );
    assert!(harness.applications.transitions().is_empty());
    assert!(harness.tasks.tasks().is_empty());
}

#[test]
fn anti_fraud_outage_schedules_a_delayed_retry() {
    let harness = ServiceHarness::new(ConfigSnapshot::default());
    let mut signals = signals();
    signals.risk.anti_fraud = Some(AntiFraudStatus::Error);
    harness.seed(application(305), signals);

    let run = harness
        .service()
        .process(ApplicationId(305))
        .expect("evaluation succeeds");

    assert_eq!(
        run.report.decision.status(),
        Some(ApplicationStatus::SuspiciousHold)
    );
    let queued = harness.tasks.tasks();
    assert_eq!(queued.len(), 2);
    assert_eq!(queued[0].name, tasks::NOTIFY_STATUS_CHANGE);
    assert_eq!(queued[1].name, tasks::ANTI_FRAUD_RETRY);
    assert_eq!(queued[1].delay, Some(Duration::from_secs(3_600)));
}

#[test]
fn retry_from_suspicious_hold_leaves_status_untouched() {
    let harness = ServiceHarness::new(ConfigSnapshot::default());
    let mut application = application(306);
    application.status = ApplicationStatus::SuspiciousHold;
    let mut signals = signals();
    signals.risk.anti_fraud = Some(AntiFraudStatus::Retrying);
    harness.seed(application, signals);

    let run = harness
        .service()
        .process(ApplicationId(306))
        .expect("evaluation succeeds");

    assert!(!run.status_changed);
    assert!(harness.applications.transitions().is_empty());
    assert!(harness.tasks.tasks().is_empty());
}

#[test]
fn anti_fraud_denial_sets_the_reapply_lock() {
    let harness = ServiceHarness::new(ConfigSnapshot::default());
    let mut signals = signals();
    signals.risk.anti_fraud = Some(AntiFraudStatus::MoveTo135);
    let application = application(307);
    let customer = application.customer_id;
    harness.seed(application, signals);

    harness
        .service()
        .process(ApplicationId(307))
        .expect("evaluation succeeds");

    assert_eq!(harness.applications.locks(), vec![(customer, date(2026, 6, 8))]);
    assert_eq!(
        harness.applications.status(ApplicationId(307)),
        Some(ApplicationStatus::Denied)
    );
}

#[test]
fn lowest_tier_is_routed_to_shadow_scoring() {
    let harness = ServiceHarness::new(ConfigSnapshot::default());
    let mut signals = signals();
    signals.credit_score = Some(score(ScoreTier::C, 0.31));
    harness.seed(application(308), signals);

    let run = harness
        .service()
        .process(ApplicationId(308))
        .expect("evaluation succeeds");

    assert!(!run.status_changed);
    assert_eq!(harness.tasks.names(), vec![tasks::SHADOW_SCORE]);
    assert_eq!(harness.tasks.tasks()[0].payload["application_id"], 308);
}

#[test]
fn unmatched_application_is_tracked() {
    let harness = ServiceHarness::new(ConfigSnapshot::default());
    harness.seed(application(309), signals());

    harness
        .service()
        .process(ApplicationId(309))
        .expect("evaluation succeeds");

    assert_eq!(harness.tasks.names(), vec![tasks::TRACK_PENDING_APPLICATION]);
}

#[test]
fn missing_mycroft_score_is_polled_with_injected_delay() {
    let harness = ServiceHarness::new(mycroft_config(">=", 0.8)).with_mycroft(
        CountingMycroftSource::scripted(vec![Ok(None), Ok(None), Ok(Some(0.95))]),
    );
    harness.seed(application(310), signals());

    let run = harness
        .service()
        .process(ApplicationId(310))
        .expect("evaluation succeeds");

    let mycroft = run.report.mycroft.expect("mycroft evaluated");
    assert_eq!(mycroft.attempts, 3);
    assert_eq!(mycroft.score, Some(0.95));
    assert_eq!(harness.mycroft.calls(), 3);
    assert_eq!(harness.delay.pauses(), vec![Duration::from_millis(5); 2]);
}

#[test]
fn absent_mycroft_score_is_looked_up_at_most_six_times() {
    let harness = ServiceHarness::new(mycroft_config(">=", 0.8))
        .with_mycroft(CountingMycroftSource::never());
    harness.seed(application(311), signals());

    let run = harness
        .service()
        .process(ApplicationId(311))
        .expect("evaluation succeeds");

    let mycroft = run.report.mycroft.expect("mycroft evaluated");
    assert_eq!(mycroft.state, MycroftState::Indeterminate);
    assert_eq!(mycroft.attempts, 6);
    assert_eq!(harness.mycroft.calls(), 6);
    assert_eq!(harness.delay.pauses().len(), 5);
}

#[test]
fn explicit_move_to_suspicious_hold_schedules_no_retry() {
    let harness = ServiceHarness::new(ConfigSnapshot::default());
    let mut signals = signals();
    signals.risk.anti_fraud = Some(AntiFraudStatus::MoveTo115);
    harness.seed(application(312), signals);

    let run = harness
        .service()
        .process(ApplicationId(312))
        .expect("evaluation succeeds");

    assert_eq!(
        run.report.decision.status(),
        Some(ApplicationStatus::SuspiciousHold)
    );
    assert_eq!(harness.tasks.names(), vec![tasks::NOTIFY_STATUS_CHANGE]);
}

#[test]
fn dispatch_failure_surfaces_after_the_transition_is_applied() {
    let harness = ServiceHarness::new(ConfigSnapshot::default())
        .with_tasks(MemoryTasks::unavailable());
    let mut signals = signals();
    signals.risk.anti_fraud = Some(AntiFraudStatus::MoveTo133);
    harness.seed(application(313), signals);

    match harness.service().process(ApplicationId(313)) {
        Err(EligibilityServiceError::Dispatch(DispatchError::Transport(_))) => {}
        other => panic!("expected dispatch error, got {other:?}"),
    }
    assert_eq!(
        harness.applications.status(ApplicationId(313)),
        Some(ApplicationStatus::FlaggedForFraud)
    );
}

#[test]
fn history_returns_audit_trail_with_holdout_flags() {
    let harness = ServiceHarness::new(with_entry_level(
        with_holdout(mycroft_config(">=", 0.8), &[7]),
        true,
    ))
    .with_mycroft(CountingMycroftSource::always(0.2));
    harness.seed(application(1007), signals());

    harness
        .service()
        .process(ApplicationId(1007))
        .expect("evaluation succeeds");
    let history = harness
        .service()
        .history(ApplicationId(1007))
        .expect("history available");

    let mycroft = history
        .iter()
        .find(|outcome| outcome.check == CheckName::Mycroft)
        .expect("mycroft recorded");
    assert!(mycroft.is_mycroft_holdout);
    assert_eq!(
        harness.applications.status(ApplicationId(1007)),
        Some(ApplicationStatus::WaitingList)
    );
    assert_eq!(harness.holdouts.stored().len(), 1);
}
