use crate::infra::{InMemoryBackend, StaticFeatureFlagStore};
use chrono::{Local, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::Args;
use lending_eligibility::config::AppConfig;
use lending_eligibility::error::AppError;
use lending_eligibility::workflows::eligibility::{
    features, generate_credit_score, ApplicationId, ApplicationSnapshot, ApplicationStatus,
    ConfigSnapshot, CustomerId, EligibilityRun, EligibilityService, EvaluationSignals, FdcStatus,
    FeatureSetting, FixedClock, LivenessResult, PipelineSettings, ProductLine, RiskSignals,
    ScoreBands, ThreadDelay,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Evaluation date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub(crate) struct EvaluateArgs {
    /// JSON file holding `application`, optional `signals`, and optional `config`
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Evaluation date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

/// Everything one offline evaluation reads.
#[derive(Debug, Deserialize)]
pub(crate) struct EvaluationInput {
    pub(crate) application: ApplicationSnapshot,
    #[serde(default)]
    pub(crate) signals: EvaluationSignals,
    #[serde(default)]
    pub(crate) config: ConfigSnapshot,
}

pub(crate) fn run_evaluate(args: EvaluateArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let raw = std::fs::read_to_string(&args.input)?;
    let input: EvaluationInput = serde_json::from_str(&raw)?;
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());

    let id = input.application.application_id;
    let backend = InMemoryBackend::new(StaticFeatureFlagStore::new(input.config));
    backend.seed(input.application, input.signals);

    let run = service_for(&backend, config.eligibility.pipeline, today).process(id)?;
    let output = json!({
        "evaluation": run.view(),
        "report": run.report,
        "tasks": backend.tasks.tasks(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let backend = InMemoryBackend::new(StaticFeatureFlagStore::new(demo_config(today)));
    let service = service_for(&backend, PipelineSettings::default(), today);

    println!("Post-ITI eligibility demo ({today})");

    let scenarios = [
        (
            "Mycroft passes, good FDC bypass",
            demo_application(1001),
            demo_signals(0.83, 0.9, Some(FdcStatus::Good)),
        ),
        (
            "Mycroft fails inside the holdout cohort",
            demo_application(1007),
            demo_signals(0.805, 0.5, None),
        ),
    ];

    for (title, application, signals) in scenarios {
        let id = application.application_id;
        backend.seed(application, signals);
        println!("\n{title} (application {id})");
        match service.process(id) {
            Ok(run) => render_run(&run),
            Err(err) => println!("  Evaluation failed: {err}"),
        }
    }

    let history = backend.applications.history();
    if !history.is_empty() {
        println!("\nStatus history");
        for entry in history {
            println!(
                "- {}: {} -> {} ({})",
                entry.application_id,
                entry.from.code(),
                entry.to.code(),
                entry.reason
            );
        }
    }

    let tasks = backend.tasks.tasks();
    if tasks.is_empty() {
        println!("\nFollow-up tasks: none dispatched");
    } else {
        println!("\nFollow-up tasks");
        for task in tasks {
            println!("- {} {}", task.name, task.payload);
        }
    }

    if let Some(until) = backend.applications.reapply_lock(CustomerId(42)) {
        println!("\nReapply locked until {until}");
    }

    Ok(())
}

fn service_for(
    backend: &InMemoryBackend,
    settings: PipelineSettings,
    today: NaiveDate,
) -> EligibilityService {
    let now = Utc.from_utc_datetime(&today.and_time(NaiveTime::MIN));
    let collaborators = backend.collaborators(Arc::new(FixedClock(now)), Arc::new(ThreadDelay));
    EligibilityService::new(collaborators, settings)
}

fn render_run(run: &EligibilityRun) {
    let view = run.view();
    println!("  Decision: {}", view.decision);
    println!(
        "  Status changed: {} | mycroft holdout: {}",
        view.status_changed, view.is_mycroft_holdout
    );
    if let Some(mycroft) = &run.report.mycroft {
        println!(
            "  Mycroft: {:?} after {} poll(s), score {:?}",
            mycroft.state, mycroft.attempts, mycroft.score
        );
    }
    println!("  Checks:");
    for check in view.checks {
        println!("    {:<22} {:?}: {}", check.check, check.verdict, check.detail);
    }
}

fn demo_config(today: NaiveDate) -> ConfigSnapshot {
    let window_start = today - chrono::Duration::days(30);
    let window_end = today + chrono::Duration::days(30);

    ConfigSnapshot::default()
        .with_feature(
            features::MYCROFT_THRESHOLD,
            FeatureSetting::active(json!({ "operator": ">=", "threshold": 0.8 })),
        )
        .with_feature(
            features::MYCROFT_HOLDOUT,
            FeatureSetting::active(json!({
                "last_digits": [7],
                "start_date": window_start,
                "end_date": window_end,
            })),
        )
        .with_feature(
            features::ENTRY_LEVEL_LIMIT,
            FeatureSetting::active(json!({
                "eligible_tiers": ["B"],
                "min_pgood": 0.80,
                "max_pgood": 0.81,
                "limit_amount": 500_000,
                "waitlist": true,
            })),
        )
        .with_feature(features::GOOD_FDC_BYPASS, FeatureSetting::active(json!({})))
}

fn demo_application(id: u64) -> ApplicationSnapshot {
    ApplicationSnapshot {
        application_id: ApplicationId(id),
        customer_id: CustomerId(42),
        status: ApplicationStatus::FormPartial,
        product_line: ProductLine::J1,
        partner: None,
        referral_code: None,
        device_has_suspicious_application: false,
        experiment_cohorts: Default::default(),
        is_deleted: false,
    }
}

fn demo_signals(pgood: f64, mycroft: f64, fdc: Option<FdcStatus>) -> EvaluationSignals {
    EvaluationSignals {
        liveness: Some(LivenessResult {
            passed: true,
            reason: None,
        }),
        credit_score: Some(generate_credit_score(
            pgood,
            &BTreeSet::new(),
            &ScoreBands::default(),
            "demo-v1",
        )),
        mycroft_score: Some(mycroft),
        risk: RiskSignals {
            fdc,
            ..RiskSignals::default()
        },
    }
}
