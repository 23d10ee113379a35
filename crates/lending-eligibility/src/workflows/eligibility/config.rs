use std::collections::BTreeMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Feature and experiment names read by the pipeline.
pub mod features {
    pub const HIGH_SCORE_FULL_BYPASS: &str = "high_score_full_bypass";
    pub const MYCROFT_THRESHOLD: &str = "mycroft_threshold";
    pub const MYCROFT_HOLDOUT: &str = "mycroft_holdout";
    pub const HIGH_RISK_ASN: &str = "high_risk_asn_tower_check";
    pub const OFFLINE_ACTIVATION: &str = "offline_activation_booth";
    pub const ENTRY_LEVEL_LIMIT: &str = "entry_level_limit";
    pub const BPJS_NO_FDC_BYPASS: &str = "bpjs_no_fdc_bypass";
    pub const GOOD_FDC_BYPASS: &str = "good_fdc_bypass";
    pub const TELCO_SWAP_IN: &str = "telco_swap_in";
}

/// Experiment cohort routed through the underwriting overhaul decision check.
pub const UW_OVERHAUL_COHORT: &str = "UwOverhaul";

/// One toggle as stored by the feature-flag service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSetting {
    pub is_active: bool,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl FeatureSetting {
    pub fn active(parameters: serde_json::Value) -> Self {
        Self {
            is_active: true,
            parameters,
        }
    }

    pub fn inactive() -> Self {
        Self {
            is_active: false,
            parameters: serde_json::Value::Null,
        }
    }
}

/// Feature flags captured once at the start of an evaluation.
///
/// Missing, inactive, and malformed entries all read as "disabled" so a bad
/// configuration row can never fail an evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    #[serde(default)]
    pub features: BTreeMap<String, FeatureSetting>,
}

impl ConfigSnapshot {
    pub fn with_feature(mut self, name: &str, setting: FeatureSetting) -> Self {
        self.features.insert(name.to_string(), setting);
        self
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.features
            .get(name)
            .map(|setting| setting.is_active)
            .unwrap_or(false)
    }

    /// Typed parameters of an active feature.
    pub fn parameters<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let setting = self.features.get(name).filter(|setting| setting.is_active)?;
        let parameters = match &setting.parameters {
            serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
            other => other.clone(),
        };
        match serde_json::from_value(parameters) {
            Ok(parameters) => Some(parameters),
            Err(error) => {
                warn!(feature = name, %error, "ignoring feature with malformed parameters");
                None
            }
        }
    }
}

/// Host-level knobs for the pipeline that do not live in feature flags.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub mycroft_max_attempts: u8,
    pub mycroft_retry_delay: Duration,
    pub reapply_lock_days: u64,
    pub anti_fraud_retry_delay: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            mycroft_max_attempts: 6,
            mycroft_retry_delay: Duration::from_millis(3_000),
            reapply_lock_days: 90,
            anti_fraud_retry_delay: Duration::from_secs(3_600),
        }
    }
}
