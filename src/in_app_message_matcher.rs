use chrono::Duration;

use crate::context::EvaluatorContext;
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::in_app_message::{FrequencyCap, InAppMessageImpression};
use crate::matcher;
use crate::request::InAppMessageEligibilityRequest;

/// Whether the request's event triggers the message: some rule names the event, and that rule
/// has no targets or one of them matches.
pub(crate) fn is_triggered(
    evaluator: &Evaluator,
    request: &InAppMessageEligibilityRequest<'_>,
    context: &mut EvaluatorContext,
) -> Result<bool> {
    let event = match request.event {
        Some(event) => event,
        None => return Ok(false),
    };
    for rule in &request.in_app_message.event_trigger.rules {
        if rule.event_key != event.key {
            continue;
        }
        if rule.targets.is_empty()
            || matcher::matches_any_target(evaluator, request, context, &rule.targets)?
        {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Whether the user is in the message's audience. No targets means everyone.
pub(crate) fn matches_target(
    evaluator: &Evaluator,
    request: &InAppMessageEligibilityRequest<'_>,
    context: &mut EvaluatorContext,
) -> Result<bool> {
    let targets = &request.in_app_message.target_context.targets;
    if targets.is_empty() {
        return Ok(true);
    }
    matcher::matches_any_target(evaluator, request, context, targets)
}

/// Whether one of the user's identifiers is on the message's override list.
pub(crate) fn is_user_overridden(request: &InAppMessageEligibilityRequest<'_>) -> bool {
    request
        .in_app_message
        .target_context
        .overrides
        .iter()
        .any(|user_override| {
            request
                .user
                .identifier(&user_override.identifier_type)
                .map_or(false, |identifier| {
                    user_override.identifiers.iter().any(|id| id == identifier)
                })
        })
}

pub(crate) fn is_hidden(
    evaluator: &Evaluator,
    request: &InAppMessageEligibilityRequest<'_>,
) -> bool {
    evaluator
        .hidden_storage()
        .exists(request.in_app_message, request.timestamp)
}

/// One way a past impression can count against the frequency cap.
enum CapPredicate<'a> {
    /// Impressions made for the same identifier of this type.
    Identifier {
        identifier_type: &'a str,
        threshold: i32,
    },
    /// Impressions made within the duration before the request.
    Duration { duration: Duration, threshold: i32 },
}

impl CapPredicate<'_> {
    fn matches(
        &self,
        request: &InAppMessageEligibilityRequest<'_>,
        impression: &InAppMessageImpression,
    ) -> bool {
        match self {
            CapPredicate::Identifier {
                identifier_type, ..
            } => match (
                request.user.identifier(identifier_type),
                impression.identifiers.get(*identifier_type),
            ) {
                (Some(user_identifier), Some(impression_identifier)) => {
                    user_identifier == impression_identifier
                }
                _ => false,
            },
            CapPredicate::Duration { duration, .. } => {
                request.timestamp - impression.timestamp <= *duration
            }
        }
    }

    fn threshold(&self) -> i32 {
        match self {
            CapPredicate::Identifier { threshold, .. } => *threshold,
            CapPredicate::Duration { threshold, .. } => *threshold,
        }
    }
}

fn cap_predicates(frequency_cap: &FrequencyCap) -> Vec<CapPredicate<'_>> {
    let identifier_caps = frequency_cap
        .identifier_caps
        .iter()
        .map(|cap| CapPredicate::Identifier {
            identifier_type: &cap.identifier_type,
            threshold: cap.count,
        });
    let duration_cap = frequency_cap
        .duration_cap
        .iter()
        .map(|cap| CapPredicate::Duration {
            duration: Duration::milliseconds(cap.duration_millis),
            threshold: cap.count,
        });
    identifier_caps.chain(duration_cap).collect()
}

/// Whether the message was already shown often enough. Each predicate counts the past
/// impressions it matches, and the message is capped as soon as any count reaches its threshold.
pub(crate) fn is_frequency_capped(
    evaluator: &Evaluator,
    request: &InAppMessageEligibilityRequest<'_>,
) -> bool {
    let frequency_cap = match &request.in_app_message.event_trigger.frequency_cap {
        Some(frequency_cap) => frequency_cap,
        None => return false,
    };
    let predicates = cap_predicates(frequency_cap);
    if predicates.is_empty() {
        return false;
    }

    let impressions = evaluator.impression_storage().get(request.in_app_message);
    let mut match_counts = vec![0; predicates.len()];
    for impression in &impressions {
        for (predicate, match_count) in predicates.iter().zip(match_counts.iter_mut()) {
            if predicate.matches(request, impression) {
                *match_count += 1;
                if *match_count >= predicate.threshold() {
                    return true;
                }
            }
        }
    }
    false
}
