use std::collections::HashMap;

use log::warn;
use serde::Deserialize;

use crate::context::EvaluatorContext;
use crate::error::{Error, Result};
use crate::evaluation::{DecisionReason, RemoteConfigEvaluation};
use crate::evaluator::Evaluator;
use crate::matcher;
use crate::request::RemoteConfigRequest;
use crate::target::Target;
use crate::value::{Value, ValueType};

/// The parameter payload attached to an experiment variation.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ParameterConfiguration {
    pub id: i64,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
}

impl ParameterConfiguration {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }

    /// The string parameter `key`, or `default` when it is absent or not a string.
    pub fn get_str<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).and_then(Value::as_str).unwrap_or(default)
    }

    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.get(key).and_then(Value::as_f64).unwrap_or(default)
    }

    /// Truncates non-integral numbers.
    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.get(key)
            .and_then(Value::as_f64)
            .and_then(crate::util::f64_to_i64_safe)
            .unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(default)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfigValue {
    pub id: i64,
    pub raw_value: Value,
}

/// Serves `value` to users matching `target`, provided the parameter's bucket has a slot for
/// them.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfigTargetRule {
    pub key: String,
    pub name: String,
    pub target: Target,
    pub bucket_id: i64,
    pub value: RemoteConfigValue,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfigParameter {
    pub id: i64,
    pub key: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub identifier_type: String,
    #[serde(default)]
    pub target_rules: Vec<RemoteConfigTargetRule>,
    pub default_value: RemoteConfigValue,
}

pub(crate) fn evaluate(
    evaluator: &Evaluator,
    request: &RemoteConfigRequest<'_>,
    context: &mut EvaluatorContext,
) -> Result<RemoteConfigEvaluation> {
    let parameter = request.parameter;
    let identifier = match request.user.identifier(&parameter.identifier_type) {
        Some(identifier) => identifier,
        None => {
            return Ok(RemoteConfigEvaluation::of_default(
                request,
                context,
                DecisionReason::IdentifierNotFound,
            ))
        }
    };

    for rule in &parameter.target_rules {
        if matches_rule(evaluator, request, context, rule, identifier)? {
            return Ok(RemoteConfigEvaluation::of(
                request,
                context,
                Some(rule),
                &rule.value,
                DecisionReason::TargetRuleMatch,
            ));
        }
    }

    Ok(RemoteConfigEvaluation::of(
        request,
        context,
        None,
        &parameter.default_value,
        DecisionReason::DefaultRule,
    ))
}

fn matches_rule(
    evaluator: &Evaluator,
    request: &RemoteConfigRequest<'_>,
    context: &mut EvaluatorContext,
    rule: &RemoteConfigTargetRule,
    identifier: &str,
) -> Result<bool> {
    if !matcher::matches_target(evaluator, request, context, &rule.target)? {
        return Ok(false);
    }
    let bucket = request.workspace.bucket(rule.bucket_id).ok_or_else(|| {
        warn!(
            "remote config parameter {} references missing bucket {}",
            request.parameter.key, rule.bucket_id
        );
        Error::BucketNotFound(rule.bucket_id)
    })?;
    Ok(bucket.bucketing(identifier).is_some())
}
