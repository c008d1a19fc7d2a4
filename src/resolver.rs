use log::warn;

use crate::context::EvaluatorContext;
use crate::error::{Error, Result};
use crate::evaluator::Evaluator;
use crate::experiment::{Action, TargetRule, Variation};
use crate::matcher;
use crate::request::ExperimentRequest;

/// Resolve an action to a variation of the requested experiment.
///
/// A variation action always resolves. A bucket action resolves to the variation of the user's
/// slot, or None when the user has no identifier of the experiment's type or falls in a gap.
pub(crate) fn resolve_action<'a>(
    request: &ExperimentRequest<'a>,
    action: &Action,
) -> Result<Option<&'a Variation>> {
    let experiment = request.experiment;
    match action {
        Action::Variation { variation_id } => match experiment.variation(*variation_id) {
            Some(variation) => Ok(Some(variation)),
            None => {
                warn!(
                    "experiment {} has no variation {}",
                    experiment.key, variation_id
                );
                Err(Error::VariationNotFound {
                    experiment_id: experiment.id,
                    variation_id: *variation_id,
                })
            }
        },
        Action::Bucket { bucket_id } => {
            let bucket = request.workspace.bucket(*bucket_id).ok_or_else(|| {
                warn!("experiment {} references missing bucket {}", experiment.key, bucket_id);
                Error::BucketNotFound(*bucket_id)
            })?;
            let identifier = match request.identifier() {
                Some(identifier) => identifier,
                None => return Ok(None),
            };
            Ok(bucket
                .bucketing(identifier)
                .and_then(|slot| experiment.variation(slot.variation_id)))
        }
    }
}

/// The variation the user is forced into, if any.
///
/// Manual overrides win over the experiment's own user overrides, which win over its segment
/// overrides.
pub(crate) fn resolve_override<'a>(
    evaluator: &Evaluator,
    request: &ExperimentRequest<'a>,
    context: &mut EvaluatorContext,
) -> Result<Option<&'a Variation>> {
    let experiment = request.experiment;
    if let Some(variation) = evaluator
        .manual_override_storage()
        .get(experiment, request.user)
    {
        return Ok(Some(variation));
    }

    if let Some(identifier) = request.identifier() {
        if let Some(variation) = experiment
            .user_overrides
            .get(identifier)
            .and_then(|variation_id| experiment.variation(*variation_id))
        {
            return Ok(Some(variation));
        }
    }

    for rule in &experiment.segment_overrides {
        if matcher::matches_target(evaluator, request, context, &rule.target)? {
            return resolve_action(request, &rule.action);
        }
    }
    Ok(None)
}

/// Whether the user's container group includes the requested experiment. Experiments outside
/// any container always pass.
pub(crate) fn is_user_in_container_group(request: &ExperimentRequest<'_>) -> Result<bool> {
    let experiment = request.experiment;
    let container_id = match experiment.container_id {
        Some(container_id) => container_id,
        None => return Ok(true),
    };
    let container = request.workspace.container(container_id).ok_or_else(|| {
        warn!("experiment {} references missing container {}", experiment.key, container_id);
        Error::ContainerNotFound(container_id)
    })?;
    let bucket = request.workspace.bucket(container.bucket_id).ok_or_else(|| {
        warn!("container {} references missing bucket {}", container_id, container.bucket_id);
        Error::BucketNotFound(container.bucket_id)
    })?;
    let identifier = match request.identifier() {
        Some(identifier) => identifier,
        None => return Ok(false),
    };
    let slot = match bucket.bucketing(identifier) {
        Some(slot) => slot,
        None => return Ok(false),
    };
    let group = container.group(slot.variation_id).ok_or_else(|| {
        warn!("container {} has no group {}", container_id, slot.variation_id);
        Error::ContainerGroupNotFound(slot.variation_id)
    })?;
    Ok(group.contains(experiment.id))
}

/// Whether the user is in any of the A/B test's target audiences. No audience means everyone.
pub(crate) fn is_user_in_experiment_target(
    evaluator: &Evaluator,
    request: &ExperimentRequest<'_>,
    context: &mut EvaluatorContext,
) -> Result<bool> {
    let audiences = &request.experiment.target_audiences;
    if audiences.is_empty() {
        return Ok(true);
    }
    matcher::matches_any_target(evaluator, request, context, audiences)
}

/// The first feature flag target rule the user matches.
pub(crate) fn determine_target_rule<'a>(
    evaluator: &Evaluator,
    request: &ExperimentRequest<'a>,
    context: &mut EvaluatorContext,
) -> Result<Option<&'a TargetRule>> {
    for rule in &request.experiment.target_rules {
        if matcher::matches_target(evaluator, request, context, &rule.target)? {
            return Ok(Some(rule));
        }
    }
    Ok(None)
}
