use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::clock::Delay;
use super::config::{features, ConfigSnapshot, PipelineSettings};
use super::domain::ApplicationId;
use super::repository::MycroftScoreSource;

/// Comparison applied as `operator(score, threshold)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOperator {
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = ">")]
    Greater,
}

impl ComparisonOperator {
    pub fn apply(self, score: f64, threshold: f64) -> bool {
        match self {
            ComparisonOperator::LessOrEqual => score <= threshold,
            ComparisonOperator::Less => score < threshold,
            ComparisonOperator::GreaterOrEqual => score >= threshold,
            ComparisonOperator::Greater => score > threshold,
        }
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            ComparisonOperator::LessOrEqual => "<=",
            ComparisonOperator::Less => "<",
            ComparisonOperator::GreaterOrEqual => ">=",
            ComparisonOperator::Greater => ">",
        }
    }
}

/// Active threshold configuration for the secondary fraud model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MycroftThreshold {
    pub operator: ComparisonOperator,
    pub threshold: f64,
}

impl MycroftThreshold {
    pub fn from_config(config: &ConfigSnapshot) -> Option<Self> {
        config.parameters(features::MYCROFT_THRESHOLD)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub delay: Duration,
}

impl From<&PipelineSettings> for RetryPolicy {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            max_attempts: settings.mycroft_max_attempts.max(1),
            delay: settings.mycroft_retry_delay,
        }
    }
}

/// Lifecycle of one threshold check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MycroftState {
    NotEvaluated,
    Evaluating { attempt: u8 },
    Passed,
    Failed,
    /// No score materialised before the poll attempts ran out.
    Indeterminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MycroftVerdict {
    Passed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MycroftOutcome {
    pub state: MycroftState,
    pub score: Option<f64>,
    pub attempts: u8,
}

impl MycroftOutcome {
    /// Indeterminate results fail open.
    pub fn verdict(&self) -> MycroftVerdict {
        match self.state {
            MycroftState::Failed => MycroftVerdict::Failed,
            _ => MycroftVerdict::Passed,
        }
    }
}

/// Threshold gate over the secondary fraud score with a bounded wait for the score.
pub struct MycroftGate {
    threshold: MycroftThreshold,
    policy: RetryPolicy,
}

impl MycroftGate {
    pub fn new(threshold: MycroftThreshold, policy: RetryPolicy) -> Self {
        Self { threshold, policy }
    }

    pub fn check(
        &self,
        id: ApplicationId,
        known_score: Option<f64>,
        source: &dyn MycroftScoreSource,
        delay: &dyn Delay,
    ) -> MycroftOutcome {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut state = MycroftState::NotEvaluated;
        let mut score = known_score;
        let mut attempts = 0;

        loop {
            state = match state {
                MycroftState::NotEvaluated => match score {
                    Some(value) => self.judge(value),
                    None => MycroftState::Evaluating { attempt: 1 },
                },
                MycroftState::Evaluating { attempt } => {
                    attempts = attempt;
                    match poll(source, id, attempt) {
                        Some(value) => {
                            score = Some(value);
                            self.judge(value)
                        }
                        None if attempt >= max_attempts => {
                            warn!(
                                application_id = %id,
                                attempts = attempt,
                                "mycroft score unavailable, failing open"
                            );
                            MycroftState::Indeterminate
                        }
                        None => {
                            delay.pause(self.policy.delay);
                            MycroftState::Evaluating {
                                attempt: attempt + 1,
                            }
                        }
                    }
                }
                terminal => {
                    return MycroftOutcome {
                        state: terminal,
                        score,
                        attempts,
                    }
                }
            };
        }
    }

    fn judge(&self, score: f64) -> MycroftState {
        let MycroftThreshold {
            operator,
            threshold,
        } = self.threshold;
        if operator.apply(score, threshold) {
            MycroftState::Passed
        } else {
            debug!(
                score,
                threshold,
                operator = operator.symbol(),
                "mycroft threshold not met"
            );
            MycroftState::Failed
        }
    }
}

fn poll(source: &dyn MycroftScoreSource, id: ApplicationId, attempt: u8) -> Option<f64> {
    match source.latest_pgood(id) {
        Ok(score) => score,
        Err(error) => {
            warn!(application_id = %id, attempt, %error, "mycroft score lookup failed");
            None
        }
    }
}
