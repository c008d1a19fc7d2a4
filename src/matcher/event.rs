use log::warn;
use serde::Deserialize;

use super::value;
use crate::error::{Error, Result};
use crate::evaluator::Evaluator;
use crate::request::EvaluatorRequest;
use crate::target::Condition;
use crate::user::TargetEvent;
use crate::util::{start_of_utc_day, DAY_MILLIS};
use crate::value::Value;

/// The JSON carried in the key name of an event-count condition.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventWindow {
    event_key: String,
    days: u32,
    #[serde(default)]
    property_filter: Option<Condition>,
}

/// Matches how many times the user tracked an event over the last `days` days.
pub(super) fn matches_number_of_events(
    evaluator: &Evaluator,
    request: &dyn EvaluatorRequest,
    condition: &Condition,
) -> Result<bool> {
    let window = parse_window(evaluator, condition)?;
    let count = count_events(evaluator, request, &window, |target_event| {
        target_event.property.is_none()
    });
    Ok(value::matches(&Value::from(count), &condition.target_match))
}

/// Like [matches_number_of_events], counting only the events whose tracked property satisfies
/// the window's property filter.
pub(super) fn matches_number_of_events_with_property(
    evaluator: &Evaluator,
    request: &dyn EvaluatorRequest,
    condition: &Condition,
) -> Result<bool> {
    let window = parse_window(evaluator, condition)?;
    let filter = window.property_filter.as_ref().ok_or_else(|| {
        warn!("event count condition without property filter: {}", condition.key.name);
        Error::InvalidCondition(format!(
            "property filter missing in [{}]",
            condition.key.name
        ))
    })?;
    let count = count_events(evaluator, request, &window, |target_event| {
        target_event.property.as_ref().map_or(false, |property| {
            property.key == filter.key.name && value::matches(&property.value, &filter.target_match)
        })
    });
    Ok(value::matches(&Value::from(count), &condition.target_match))
}

fn parse_window(evaluator: &Evaluator, condition: &Condition) -> Result<EventWindow> {
    let window: EventWindow = serde_json::from_str(&condition.key.name).map_err(|e| {
        warn!("invalid event count condition {}: {}", condition.key.name, e);
        Error::InvalidCondition(format!("invalid event count key [{}]", condition.key.name))
    })?;
    let max_days = evaluator.config().max_event_window_days;
    if window.days > max_days {
        warn!(
            "event count window of {} days exceeds the maximum of {}",
            window.days, max_days
        );
        return Err(Error::InvalidCondition(format!(
            "event count window of {} days exceeds {}",
            window.days, max_days
        )));
    }
    Ok(window)
}

/// Sum the daily counts of matching events dated from the start of the UTC day `days` days before
/// the request time.
fn count_events<P>(
    evaluator: &Evaluator,
    request: &dyn EvaluatorRequest,
    window: &EventWindow,
    predicate: P,
) -> i64
where
    P: Fn(&TargetEvent) -> bool,
{
    let now = request.timestamp().unwrap_or_else(|| evaluator.clock().now());
    let today = start_of_utc_day(now.timestamp_millis());
    let from_millis = today - i64::from(window.days) * DAY_MILLIS;

    request
        .user()
        .target_events
        .iter()
        .filter(|target_event| {
            target_event.event_key == window.event_key && predicate(target_event)
        })
        .map(|target_event| target_event.count_since(from_millis))
        .sum()
}
