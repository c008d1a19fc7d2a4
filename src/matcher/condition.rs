use log::warn;

use super::{event, experiment, value};
use crate::context::EvaluatorContext;
use crate::error::{Error, Result};
use crate::evaluator::Evaluator;
use crate::request::EvaluatorRequest;
use crate::segment::Segment;
use crate::target::{Condition, KeyType};
use crate::value::Value;

pub(super) fn matches(
    evaluator: &Evaluator,
    request: &dyn EvaluatorRequest,
    context: &mut EvaluatorContext,
    condition: &Condition,
) -> Result<bool> {
    match condition.key.key_type {
        KeyType::UserId
        | KeyType::UserProperty
        | KeyType::HackleProperty
        | KeyType::Cohort => matches_user(request, condition),
        KeyType::EventProperty => matches_event_property(request, condition),
        KeyType::Segment => matches_segment(request, condition),
        KeyType::AbTest => experiment::matches_ab_test(evaluator, request, context, condition),
        KeyType::FeatureFlag => {
            experiment::matches_feature_flag(evaluator, request, context, condition)
        }
        KeyType::NumberOfEventsInDays => {
            event::matches_number_of_events(evaluator, request, condition)
        }
        KeyType::NumberOfEventsWithPropertyInDays => {
            event::matches_number_of_events_with_property(evaluator, request, condition)
        }
    }
}

/// Conditions on the user's own data. These are the only conditions a segment may hold.
fn matches_user(request: &dyn EvaluatorRequest, condition: &Condition) -> Result<bool> {
    let user = request.user();
    let name = &condition.key.name;
    match condition.key.key_type {
        KeyType::UserId => {
            let identifier = user.identifier(name).map(Value::from);
            Ok(matches_subject(identifier.as_ref(), condition))
        }
        KeyType::UserProperty => Ok(matches_subject(user.properties.get(name), condition)),
        KeyType::HackleProperty => Ok(matches_subject(user.hackle_properties.get(name), condition)),
        KeyType::Cohort => {
            let target_match = &condition.target_match;
            let is_matched = user.cohorts.iter().any(|cohort| {
                target_match
                    .values
                    .iter()
                    .any(|value| value.as_i64() == Some(cohort.0))
            });
            Ok(target_match.match_type.matches(is_matched))
        }
        key_type => {
            warn!("{:?} condition is not a user condition", key_type);
            Err(Error::InvalidCondition(format!(
                "{:?} is not supported in a segment",
                key_type
            )))
        }
    }
}

/// A missing subject never matches, whatever the polarity.
fn matches_subject(subject: Option<&Value>, condition: &Condition) -> bool {
    match subject {
        None | Some(Value::Null) => false,
        Some(subject) => value::matches(subject, &condition.target_match),
    }
}

fn matches_event_property(request: &dyn EvaluatorRequest, condition: &Condition) -> Result<bool> {
    let event = request.event().ok_or_else(|| {
        warn!(
            "event property condition {} used outside an event-triggered request",
            condition.key.name
        );
        Error::InvalidCondition(format!(
            "event property [{}] requires an event-triggered request",
            condition.key.name
        ))
    })?;
    Ok(matches_subject(
        event.properties.get(&condition.key.name),
        condition,
    ))
}

/// Match values name segments; the user must belong to any of them.
fn matches_segment(request: &dyn EvaluatorRequest, condition: &Condition) -> Result<bool> {
    let target_match = &condition.target_match;
    let mut is_matched = false;
    for value in &target_match.values {
        let segment_key = value.as_str().ok_or_else(|| {
            warn!("segment key must be a string, got {:?}", value);
            Error::InvalidCondition(format!("segment key must be a string, got {:?}", value))
        })?;
        let segment = request.workspace().segment(segment_key).ok_or_else(|| {
            warn!("segment {} not found", segment_key);
            Error::SegmentNotFound(segment_key.to_string())
        })?;
        if segment_contains(request, segment)? {
            is_matched = true;
            break;
        }
    }
    Ok(target_match.match_type.matches(is_matched))
}

/// A segment is an OR of targets, each an AND of user conditions. An empty segment contains
/// nobody.
fn segment_contains(request: &dyn EvaluatorRequest, segment: &Segment) -> Result<bool> {
    for target in &segment.targets {
        let mut all_matched = true;
        for condition in &target.conditions {
            if !matches_user(request, condition)? {
                all_matched = false;
                break;
            }
        }
        if all_matched {
            return Ok(true);
        }
    }
    Ok(false)
}
