use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::ConfigSnapshot;
use super::domain::ApplicationId;
use super::repository::{HoldoutStore, RepositoryError};

/// Experiment definition read from an active feature flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldoutExperiment {
    pub code: String,
    pub last_digits: BTreeSet<u8>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct HoldoutParameters {
    last_digits: BTreeSet<u8>,
    start_date: NaiveDate,
    end_date: NaiveDate,
}

impl HoldoutExperiment {
    /// `None` when the experiment flag is missing, inactive, or malformed.
    pub fn from_config(config: &ConfigSnapshot, code: &str) -> Option<Self> {
        let parameters: HoldoutParameters = config.parameters(code)?;
        Some(Self {
            code: code.to_string(),
            last_digits: parameters.last_digits,
            start_date: parameters.start_date,
            end_date: parameters.end_date,
        })
    }

    pub fn is_running_on(&self, day: NaiveDate) -> bool {
        self.start_date <= day && day <= self.end_date
    }

    /// Pure bucketing by the last decimal digit of the application id.
    pub fn cohort_for(&self, id: ApplicationId, today: NaiveDate) -> Option<HoldoutCohort> {
        if !self.is_running_on(today) {
            return None;
        }
        if self.last_digits.contains(&id.last_digit()) {
            Some(HoldoutCohort::Holdout)
        } else {
            Some(HoldoutCohort::Treatment)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldoutCohort {
    /// Excluded from the rule's effect.
    Holdout,
    Treatment,
}

/// Immutable record of an application's cohort within one experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldoutAssignment {
    pub experiment_code: String,
    pub application_id: ApplicationId,
    pub cohort: HoldoutCohort,
    pub assigned_on: NaiveDate,
}

impl HoldoutAssignment {
    pub fn is_holdout(&self) -> bool {
        self.cohort == HoldoutCohort::Holdout
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HoldoutError {
    #[error("holdout store failure: {0}")]
    Store(#[from] RepositoryError),
}

/// Reads a prior assignment before computing a new one, so re-runs never re-bucket.
pub struct HoldoutAssignmentResolver<'a> {
    store: &'a dyn HoldoutStore,
}

impl<'a> HoldoutAssignmentResolver<'a> {
    pub fn new(store: &'a dyn HoldoutStore) -> Self {
        Self { store }
    }

    pub fn resolve(
        &self,
        experiment: &HoldoutExperiment,
        id: ApplicationId,
        today: NaiveDate,
    ) -> Result<Option<HoldoutAssignment>, HoldoutError> {
        if let Some(existing) = self.store.find(&experiment.code, id)? {
            debug!(
                application_id = %id,
                experiment = %experiment.code,
                cohort = ?existing.cohort,
                "reusing holdout assignment"
            );
            return Ok(Some(existing));
        }

        let Some(cohort) = experiment.cohort_for(id, today) else {
            return Ok(None);
        };

        let stored = self.store.insert_if_absent(HoldoutAssignment {
            experiment_code: experiment.code.clone(),
            application_id: id,
            cohort,
            assigned_on: today,
        })?;
        Ok(Some(stored))
    }
}
