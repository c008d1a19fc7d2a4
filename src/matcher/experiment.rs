use log::{debug, warn};

use super::value;
use crate::context::EvaluatorContext;
use crate::error::Result;
use crate::evaluation::{DecisionReason, Evaluation, ExperimentEvaluation};
use crate::evaluator::Evaluator;
use crate::experiment::Experiment;
use crate::request::{EvaluatorKey, EvaluatorKind, EvaluatorRequest, ExperimentRequest};
use crate::target::Condition;
use crate::value::Value;

/// Reasons under which an A/B test really put the user in the resulting variation.
const AB_TEST_MATCHED_REASONS: [DecisionReason; 4] = [
    DecisionReason::Overridden,
    DecisionReason::TrafficAllocated,
    DecisionReason::TrafficAllocatedByTargeting,
    DecisionReason::ExperimentCompleted,
];

/// Matches the variation key the referenced A/B test decides for the user.
pub(super) fn matches_ab_test(
    evaluator: &Evaluator,
    request: &dyn EvaluatorRequest,
    context: &mut EvaluatorContext,
    condition: &Condition,
) -> Result<bool> {
    let experiment =
        match experiment_key(condition).and_then(|key| request.workspace().experiment(key)) {
            Some(experiment) => experiment,
            None => return Ok(false),
        };
    let evaluation = evaluate(evaluator, request, context, experiment)?;
    if !AB_TEST_MATCHED_REASONS.contains(&evaluation.reason) {
        return Ok(false);
    }
    Ok(value::matches(
        &Value::from(evaluation.variation_key.as_str()),
        &condition.target_match,
    ))
}

/// Matches the on/off state the referenced feature flag decides for the user.
pub(super) fn matches_feature_flag(
    evaluator: &Evaluator,
    request: &dyn EvaluatorRequest,
    context: &mut EvaluatorContext,
    condition: &Condition,
) -> Result<bool> {
    let feature_flag =
        match experiment_key(condition).and_then(|key| request.workspace().feature_flag(key)) {
            Some(feature_flag) => feature_flag,
            None => return Ok(false),
        };
    let evaluation = evaluate(evaluator, request, context, feature_flag)?;
    Ok(value::matches(
        &Value::Bool(evaluation.is_on()),
        &condition.target_match,
    ))
}

fn experiment_key(condition: &Condition) -> Option<i64> {
    match condition.key.name.parse() {
        Ok(key) => Some(key),
        Err(_) => {
            warn!("invalid experiment key in condition: {}", condition.key.name);
            None
        }
    }
}

/// The referenced experiment's evaluation, taken from the context when it was already decided
/// in this call.
fn evaluate(
    evaluator: &Evaluator,
    request: &dyn EvaluatorRequest,
    context: &mut EvaluatorContext,
    experiment: &Experiment,
) -> Result<ExperimentEvaluation> {
    let key = EvaluatorKey::new(EvaluatorKind::Experiment, experiment.id);
    if let Some(evaluation) = context.evaluation(&key).and_then(Evaluation::as_experiment) {
        debug!("experiment {} served from context", experiment.key);
        return Ok(evaluation.clone());
    }

    let experiment_request = ExperimentRequest::of(request, experiment);
    let evaluation = evaluator.evaluate_experiment(&experiment_request, context)?;

    // Tell exposure recording that this allocation only happened to decide another experiment.
    let evaluation = if request.is_experiment_request()
        && evaluation.reason == DecisionReason::TrafficAllocated
    {
        evaluation.with_reason(DecisionReason::TrafficAllocatedByTargeting)
    } else {
        evaluation
    };
    context.add_evaluation(evaluation.clone().into());
    Ok(evaluation)
}
