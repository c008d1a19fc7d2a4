use crate::context::EvaluatorContext;
use crate::error::Result;
use crate::evaluation::{DecisionReason, InAppMessageEligibilityEvaluation};
use crate::evaluator::Evaluator;
use crate::flow::{EvaluationFlow, FlowEvaluator, InAppMessageFlow};
use crate::in_app_message::InAppMessageStatus;
use crate::in_app_message_matcher;
use crate::request::{InAppMessageEligibilityRequest, InAppMessageLayoutRequest};

type Flow = EvaluationFlow<InAppMessageFlow>;
type Decision = Result<Option<InAppMessageEligibilityEvaluation>>;

/// The full eligibility check made when an event may trigger a message.
pub(crate) fn trigger_flow() -> Flow {
    EvaluationFlow::of(vec![
        Box::new(PlatformEvaluator),
        Box::new(OverrideEvaluator),
        Box::new(DraftEvaluator),
        Box::new(PauseEvaluator),
        Box::new(PeriodEvaluator),
        Box::new(TargetEvaluator),
        Box::new(LayoutResolveEvaluator),
        Box::new(FrequencyCapEvaluator),
        Box::new(HiddenEvaluator),
        Box::new(EligibleEvaluator),
    ])
}

/// The re-check made right before an already triggered message is displayed. Only the checks
/// whose outcome can change within a session are repeated.
pub(crate) fn deliver_flow() -> Flow {
    EvaluationFlow::of(vec![
        Box::new(FrequencyCapEvaluator),
        Box::new(HiddenEvaluator),
        Box::new(EligibleEvaluator),
    ])
}

fn ineligible(
    request: &InAppMessageEligibilityRequest<'_>,
    context: &EvaluatorContext,
    reason: DecisionReason,
) -> Decision {
    Ok(Some(InAppMessageEligibilityEvaluation::ineligible(
        request, context, reason,
    )))
}

fn resolve_layout(
    evaluator: &Evaluator,
    request: &InAppMessageEligibilityRequest<'_>,
    context: &mut EvaluatorContext,
) -> Result<()> {
    let layout_request =
        InAppMessageLayoutRequest::new(request.workspace, request.user, request.in_app_message);
    evaluator.evaluate_in_app_message_layout(&layout_request, context)?;
    Ok(())
}

struct PlatformEvaluator;

impl FlowEvaluator<InAppMessageFlow> for PlatformEvaluator {
    fn evaluate(
        &self,
        evaluator: &Evaluator,
        request: &InAppMessageEligibilityRequest<'_>,
        context: &mut EvaluatorContext,
        next_flow: &Flow,
    ) -> Decision {
        if request.in_app_message.supports(evaluator.config().platform) {
            next_flow.evaluate(evaluator, request, context)
        } else {
            ineligible(request, context, DecisionReason::UnsupportedPlatform)
        }
    }
}

/// Overridden users see the message whatever its status, period or targeting.
struct OverrideEvaluator;

impl FlowEvaluator<InAppMessageFlow> for OverrideEvaluator {
    fn evaluate(
        &self,
        evaluator: &Evaluator,
        request: &InAppMessageEligibilityRequest<'_>,
        context: &mut EvaluatorContext,
        next_flow: &Flow,
    ) -> Decision {
        if !in_app_message_matcher::is_user_overridden(request) {
            return next_flow.evaluate(evaluator, request, context);
        }
        resolve_layout(evaluator, request, context)?;
        Ok(Some(InAppMessageEligibilityEvaluation::eligible(
            request,
            context,
            DecisionReason::Overridden,
        )))
    }
}

struct DraftEvaluator;

impl FlowEvaluator<InAppMessageFlow> for DraftEvaluator {
    fn evaluate(
        &self,
        evaluator: &Evaluator,
        request: &InAppMessageEligibilityRequest<'_>,
        context: &mut EvaluatorContext,
        next_flow: &Flow,
    ) -> Decision {
        if request.in_app_message.status == InAppMessageStatus::Draft {
            ineligible(request, context, DecisionReason::InAppMessageDraft)
        } else {
            next_flow.evaluate(evaluator, request, context)
        }
    }
}

struct PauseEvaluator;

impl FlowEvaluator<InAppMessageFlow> for PauseEvaluator {
    fn evaluate(
        &self,
        evaluator: &Evaluator,
        request: &InAppMessageEligibilityRequest<'_>,
        context: &mut EvaluatorContext,
        next_flow: &Flow,
    ) -> Decision {
        if request.in_app_message.status == InAppMessageStatus::Pause {
            ineligible(request, context, DecisionReason::InAppMessagePaused)
        } else {
            next_flow.evaluate(evaluator, request, context)
        }
    }
}

struct PeriodEvaluator;

impl FlowEvaluator<InAppMessageFlow> for PeriodEvaluator {
    fn evaluate(
        &self,
        evaluator: &Evaluator,
        request: &InAppMessageEligibilityRequest<'_>,
        context: &mut EvaluatorContext,
        next_flow: &Flow,
    ) -> Decision {
        if request.in_app_message.period.within(request.timestamp) {
            next_flow.evaluate(evaluator, request, context)
        } else {
            ineligible(request, context, DecisionReason::NotInInAppMessagePeriod)
        }
    }
}

struct TargetEvaluator;

impl FlowEvaluator<InAppMessageFlow> for TargetEvaluator {
    fn evaluate(
        &self,
        evaluator: &Evaluator,
        request: &InAppMessageEligibilityRequest<'_>,
        context: &mut EvaluatorContext,
        next_flow: &Flow,
    ) -> Decision {
        if in_app_message_matcher::matches_target(evaluator, request, context)? {
            next_flow.evaluate(evaluator, request, context)
        } else {
            ineligible(request, context, DecisionReason::NotInInAppMessageTarget)
        }
    }
}

struct LayoutResolveEvaluator;

impl FlowEvaluator<InAppMessageFlow> for LayoutResolveEvaluator {
    fn evaluate(
        &self,
        evaluator: &Evaluator,
        request: &InAppMessageEligibilityRequest<'_>,
        context: &mut EvaluatorContext,
        next_flow: &Flow,
    ) -> Decision {
        resolve_layout(evaluator, request, context)?;
        next_flow.evaluate(evaluator, request, context)
    }
}

struct FrequencyCapEvaluator;

impl FlowEvaluator<InAppMessageFlow> for FrequencyCapEvaluator {
    fn evaluate(
        &self,
        evaluator: &Evaluator,
        request: &InAppMessageEligibilityRequest<'_>,
        context: &mut EvaluatorContext,
        next_flow: &Flow,
    ) -> Decision {
        if in_app_message_matcher::is_frequency_capped(evaluator, request) {
            ineligible(request, context, DecisionReason::InAppMessageFrequencyCapped)
        } else {
            next_flow.evaluate(evaluator, request, context)
        }
    }
}

struct HiddenEvaluator;

impl FlowEvaluator<InAppMessageFlow> for HiddenEvaluator {
    fn evaluate(
        &self,
        evaluator: &Evaluator,
        request: &InAppMessageEligibilityRequest<'_>,
        context: &mut EvaluatorContext,
        next_flow: &Flow,
    ) -> Decision {
        if in_app_message_matcher::is_hidden(evaluator, request) {
            ineligible(request, context, DecisionReason::InAppMessageHidden)
        } else {
            next_flow.evaluate(evaluator, request, context)
        }
    }
}

struct EligibleEvaluator;

impl FlowEvaluator<InAppMessageFlow> for EligibleEvaluator {
    fn evaluate(
        &self,
        _evaluator: &Evaluator,
        request: &InAppMessageEligibilityRequest<'_>,
        context: &mut EvaluatorContext,
        _next_flow: &Flow,
    ) -> Decision {
        Ok(Some(InAppMessageEligibilityEvaluation::eligible(
            request,
            context,
            DecisionReason::InAppMessageTarget,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvaluatorConfig;
    use crate::error::Error;
    use crate::in_app_message::{
        DurationCap, FrequencyCap, InAppMessage, InAppMessageImpression, InAppMessagePeriod,
        PlatformType,
    };
    use crate::request::InAppMessagePhase;
    use crate::storage::{
        InAppMessageHiddenStorage, InAppMessageImpressionStorage, InMemoryHiddenStorage,
        InMemoryImpressionStorage,
    };
    use crate::test_common::*;
    use crate::user::HackleUser;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use maplit::hashmap;
    use spectral::prelude::*;
    use std::sync::Arc;
    use test_case::test_case;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_710_082_800_000).unwrap()
    }

    fn user() -> HackleUser {
        HackleUser::builder().id("user_01").property("grade", "GOLD").build()
    }

    fn evaluate_with(
        evaluator: &Evaluator,
        message: &InAppMessage,
        phase: InAppMessagePhase,
    ) -> Result<InAppMessageEligibilityEvaluation> {
        let workspace = TestWorkspace::new();
        let user = user();
        let request = InAppMessageEligibilityRequest::new(&workspace, &user, message, now()).phase(phase);
        evaluator.evaluate_in_app_message(&request, &mut EvaluatorContext::new())
    }

    fn evaluate(message: &InAppMessage) -> Result<InAppMessageEligibilityEvaluation> {
        evaluate_with(&Evaluator::new(), message, InAppMessagePhase::Trigger)
    }

    fn capped_evaluator(message: &InAppMessage) -> Evaluator {
        let impressions = Arc::new(InMemoryImpressionStorage::new());
        impressions.set(
            message,
            vec![InAppMessageImpression {
                identifiers: hashmap! {"$id".to_string() => "user_01".to_string()},
                timestamp: now() - Duration::hours(1),
            }],
        );
        Evaluator::builder().impression_storage(impressions).build()
    }

    fn capped_message() -> InAppMessage {
        let mut message = in_app_message();
        message.event_trigger.frequency_cap = Some(FrequencyCap {
            identifier_caps: vec![],
            duration_cap: Some(DurationCap {
                duration_millis: 86_400_000,
                count: 1,
            }),
        });
        message
    }

    #[test]
    fn eligible_message_carries_layout() {
        let evaluation = evaluate(&in_app_message()).unwrap();

        assert!(evaluation.is_eligible);
        assert_eq!(evaluation.reason, DecisionReason::InAppMessageTarget);
        let layout = evaluation.layout.expect("layout");
        assert_eq!(layout.message.lang, "ko");
        assert_that!(evaluation.target_evaluations).is_empty();
    }

    #[test]
    fn unsupported_platform() {
        let evaluator = Evaluator::builder()
            .config(EvaluatorConfig {
                platform: PlatformType::Web,
                ..EvaluatorConfig::default()
            })
            .build();
        let evaluation = evaluate_with(&evaluator, &in_app_message(), InAppMessagePhase::Trigger).unwrap();
        assert!(!evaluation.is_eligible);
        assert_eq!(evaluation.reason, DecisionReason::UnsupportedPlatform);
    }

    #[test_case(InAppMessageStatus::Draft, DecisionReason::InAppMessageDraft)]
    #[test_case(InAppMessageStatus::Pause, DecisionReason::InAppMessagePaused)]
    fn inactive_status(status: InAppMessageStatus, reason: DecisionReason) {
        let mut message = in_app_message();
        message.status = status;
        let evaluation = evaluate(&message).unwrap();
        assert!(!evaluation.is_eligible);
        assert_eq!(evaluation.reason, reason);
        assert_that!(evaluation.layout).is_none();
    }

    #[test]
    fn outside_period() {
        let mut message = in_app_message();
        message.period = InAppMessagePeriod::Custom {
            start_millis_inclusive: now() + Duration::days(1),
            end_millis_exclusive: now() + Duration::days(2),
        };
        let evaluation = evaluate(&message).unwrap();
        assert_eq!(evaluation.reason, DecisionReason::NotInInAppMessagePeriod);
    }

    #[test]
    fn outside_target() {
        let mut message = in_app_message();
        message.target_context.targets = vec![parse(
            r#"{"conditions": [{
                "key": {"type": "USER_PROPERTY", "name": "grade"},
                "match": {"type": "MATCH", "operator": "IN", "valueType": "STRING", "values": ["SILVER"]}
            }]}"#,
        )];
        let evaluation = evaluate(&message).unwrap();
        assert_eq!(evaluation.reason, DecisionReason::NotInInAppMessageTarget);
    }

    #[test]
    fn override_bypasses_status_and_targeting() {
        let mut message = in_app_message();
        message.status = InAppMessageStatus::Pause;
        message.target_context.overrides = vec![parse(
            r#"{"identifierType": "$id", "identifiers": ["user_01"]}"#,
        )];
        let evaluation = evaluate(&message).unwrap();
        assert!(evaluation.is_eligible);
        assert_eq!(evaluation.reason, DecisionReason::Overridden);
        assert_that!(evaluation.layout).is_some();
    }

    #[test]
    fn recent_impression_caps_message() {
        let message = capped_message();
        let evaluation =
            evaluate_with(&capped_evaluator(&message), &message, InAppMessagePhase::Trigger).unwrap();
        assert!(!evaluation.is_eligible);
        assert_eq!(evaluation.reason, DecisionReason::InAppMessageFrequencyCapped);
    }

    #[test]
    fn hidden_message() {
        let message = in_app_message();
        let hidden = Arc::new(InMemoryHiddenStorage::new());
        hidden.put(&message, now() + Duration::days(1));
        let evaluator = Evaluator::builder().hidden_storage(hidden).build();

        let evaluation = evaluate_with(&evaluator, &message, InAppMessagePhase::Trigger).unwrap();
        assert_eq!(evaluation.reason, DecisionReason::InAppMessageHidden);
    }

    #[test]
    fn missing_layout_is_an_error() {
        let mut message = in_app_message();
        message.message_context.default_lang = "en".to_string();
        assert!(matches!(evaluate(&message), Err(Error::LayoutNotFound { .. })));
    }

    #[test]
    fn deliver_skips_trigger_only_checks() {
        let mut message = in_app_message();
        message.status = InAppMessageStatus::Pause;
        let evaluation = evaluate_with(&Evaluator::new(), &message, InAppMessagePhase::Deliver).unwrap();
        assert!(evaluation.is_eligible);
        assert_that!(evaluation.layout).is_none();

        let message = capped_message();
        let evaluation =
            evaluate_with(&capped_evaluator(&message), &message, InAppMessagePhase::Deliver).unwrap();
        assert_eq!(evaluation.reason, DecisionReason::InAppMessageFrequencyCapped);
    }
}
