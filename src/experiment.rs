use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::target::Target;

/// Key of the variation every experiment falls back to, and the "off" state of a feature flag.
pub const DEFAULT_VARIATION_KEY: &str = "A";

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExperimentType {
    AbTest,
    FeatureFlag,
}

/// Lifecycle status of an experiment. Only a completed experiment carries a winner.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExperimentStatus {
    Draft,
    Running,
    Paused,
    #[serde(rename_all = "camelCase")]
    Completed {
        #[serde(default)]
        winner_variation_id: Option<i64>,
    },
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Variation {
    pub id: i64,
    pub key: String,
    #[serde(default)]
    pub is_dropped: bool,
    #[serde(default)]
    pub parameter_configuration_id: Option<i64>,
}

/// Where a rule sends the user: straight to a variation, or through a bucket.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    #[serde(rename_all = "camelCase")]
    Variation { variation_id: i64 },
    #[serde(rename_all = "camelCase")]
    Bucket { bucket_id: i64 },
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TargetRule {
    pub target: Target,
    pub action: Action,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub id: i64,
    pub key: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub experiment_type: ExperimentType,
    pub identifier_type: String,
    #[serde(flatten)]
    pub status: ExperimentStatus,
    #[serde(default)]
    pub version: i32,
    #[serde(default)]
    pub execution_version: i32,
    pub variations: Vec<Variation>,
    #[serde(default)]
    pub user_overrides: HashMap<String, i64>,
    #[serde(default)]
    pub segment_overrides: Vec<TargetRule>,
    #[serde(default)]
    pub target_audiences: Vec<Target>,
    #[serde(default)]
    pub target_rules: Vec<TargetRule>,
    pub default_rule: Action,
    #[serde(default)]
    pub container_id: Option<i64>,
}

impl Experiment {
    pub fn variation(&self, variation_id: i64) -> Option<&Variation> {
        self.variations.iter().find(|v| v.id == variation_id)
    }

    pub fn variation_by_key(&self, variation_key: &str) -> Option<&Variation> {
        self.variations.iter().find(|v| v.key == variation_key)
    }

    /// The winner of a completed experiment. None for any other status, or when the winner id
    /// does not name one of the experiment's variations.
    pub fn winner_variation(&self) -> Option<&Variation> {
        match self.status {
            ExperimentStatus::Completed {
                winner_variation_id: Some(id),
            } => self.variation(id),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == ExperimentStatus::Running
    }
}
