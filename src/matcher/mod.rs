//! Targeting: deciding whether a request satisfies a [Target].

mod condition;
mod event;
mod experiment;
mod value;

use crate::context::EvaluatorContext;
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::request::EvaluatorRequest;
use crate::target::Target;

/// A target matches when every one of its conditions does. An empty target always matches.
pub(crate) fn matches_target(
    evaluator: &Evaluator,
    request: &dyn EvaluatorRequest,
    context: &mut EvaluatorContext,
    target: &Target,
) -> Result<bool> {
    for condition in &target.conditions {
        if !condition::matches(evaluator, request, context, condition)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Whether any of `targets` matches. An empty list never matches.
pub(crate) fn matches_any_target(
    evaluator: &Evaluator,
    request: &dyn EvaluatorRequest,
    context: &mut EvaluatorContext,
    targets: &[Target],
) -> Result<bool> {
    for target in targets {
        if matches_target(evaluator, request, context, target)? {
            return Ok(true);
        }
    }
    Ok(false)
}
