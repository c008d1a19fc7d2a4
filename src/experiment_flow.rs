use log::warn;

use crate::context::EvaluatorContext;
use crate::error::{Error, Result};
use crate::evaluation::{DecisionReason, ExperimentEvaluation};
use crate::evaluator::Evaluator;
use crate::experiment::{ExperimentStatus, ExperimentType};
use crate::flow::{EvaluationFlow, ExperimentFlow, FlowEvaluator};
use crate::request::ExperimentRequest;
use crate::resolver;

type Flow = EvaluationFlow<ExperimentFlow>;
type Decision = Result<Option<ExperimentEvaluation>>;

pub(crate) fn ab_test_flow() -> Flow {
    EvaluationFlow::of(vec![
        Box::new(OverrideEvaluator),
        Box::new(IdentifierEvaluator),
        Box::new(ContainerEvaluator),
        Box::new(ExperimentTargetEvaluator),
        Box::new(DraftEvaluator),
        Box::new(PausedEvaluator),
        Box::new(CompletedEvaluator),
        Box::new(TrafficAllocateEvaluator),
    ])
}

pub(crate) fn feature_flag_flow() -> Flow {
    EvaluationFlow::of(vec![
        Box::new(DraftEvaluator),
        Box::new(PausedEvaluator),
        Box::new(CompletedEvaluator),
        Box::new(OverrideEvaluator),
        Box::new(IdentifierEvaluator),
        Box::new(TargetRuleEvaluator),
        Box::new(DefaultRuleEvaluator),
    ])
}

fn decide_default(
    request: &ExperimentRequest<'_>,
    context: &EvaluatorContext,
    reason: DecisionReason,
) -> Decision {
    ExperimentEvaluation::of_default(request, context, reason).map(Some)
}

fn unexpected_flow(stage: &'static str, request: &ExperimentRequest<'_>) -> Error {
    let experiment = request.experiment;
    let detail = format!(
        "experiment {} is {:?} {:?}",
        experiment.key, experiment.status, experiment.experiment_type
    );
    warn!("{}: {}", stage, detail);
    Error::UnexpectedFlow { stage, detail }
}

struct OverrideEvaluator;

impl FlowEvaluator<ExperimentFlow> for OverrideEvaluator {
    fn evaluate(
        &self,
        evaluator: &Evaluator,
        request: &ExperimentRequest<'_>,
        context: &mut EvaluatorContext,
        next_flow: &Flow,
    ) -> Decision {
        match resolver::resolve_override(evaluator, request, context)? {
            Some(variation) => {
                let reason = match request.experiment.experiment_type {
                    ExperimentType::AbTest => DecisionReason::Overridden,
                    ExperimentType::FeatureFlag => DecisionReason::IndividualTargetMatch,
                };
                ExperimentEvaluation::of(request, context, variation, reason).map(Some)
            }
            None => next_flow.evaluate(evaluator, request, context),
        }
    }
}

/// A/B tests without the identifier they bucket by get the default variation. Feature flags
/// carry on, since their default rule decides without one.
struct IdentifierEvaluator;

impl FlowEvaluator<ExperimentFlow> for IdentifierEvaluator {
    fn evaluate(
        &self,
        evaluator: &Evaluator,
        request: &ExperimentRequest<'_>,
        context: &mut EvaluatorContext,
        next_flow: &Flow,
    ) -> Decision {
        if request.identifier().is_some()
            || request.experiment.experiment_type == ExperimentType::FeatureFlag
        {
            return next_flow.evaluate(evaluator, request, context);
        }
        decide_default(request, context, DecisionReason::IdentifierNotFound)
    }
}

struct ContainerEvaluator;

impl FlowEvaluator<ExperimentFlow> for ContainerEvaluator {
    fn evaluate(
        &self,
        evaluator: &Evaluator,
        request: &ExperimentRequest<'_>,
        context: &mut EvaluatorContext,
        next_flow: &Flow,
    ) -> Decision {
        if resolver::is_user_in_container_group(request)? {
            next_flow.evaluate(evaluator, request, context)
        } else {
            decide_default(request, context, DecisionReason::NotInMutualExclusionExperiment)
        }
    }
}

struct ExperimentTargetEvaluator;

impl FlowEvaluator<ExperimentFlow> for ExperimentTargetEvaluator {
    fn evaluate(
        &self,
        evaluator: &Evaluator,
        request: &ExperimentRequest<'_>,
        context: &mut EvaluatorContext,
        next_flow: &Flow,
    ) -> Decision {
        if request.experiment.experiment_type != ExperimentType::AbTest {
            return Err(unexpected_flow("experiment target", request));
        }
        if resolver::is_user_in_experiment_target(evaluator, request, context)? {
            next_flow.evaluate(evaluator, request, context)
        } else {
            decide_default(request, context, DecisionReason::NotInExperimentTarget)
        }
    }
}

struct DraftEvaluator;

impl FlowEvaluator<ExperimentFlow> for DraftEvaluator {
    fn evaluate(
        &self,
        evaluator: &Evaluator,
        request: &ExperimentRequest<'_>,
        context: &mut EvaluatorContext,
        next_flow: &Flow,
    ) -> Decision {
        if request.experiment.status != ExperimentStatus::Draft {
            return next_flow.evaluate(evaluator, request, context);
        }
        let reason = match request.experiment.experiment_type {
            ExperimentType::AbTest => DecisionReason::ExperimentDraft,
            ExperimentType::FeatureFlag => DecisionReason::FeatureFlagInactive,
        };
        decide_default(request, context, reason)
    }
}

struct PausedEvaluator;

impl FlowEvaluator<ExperimentFlow> for PausedEvaluator {
    fn evaluate(
        &self,
        evaluator: &Evaluator,
        request: &ExperimentRequest<'_>,
        context: &mut EvaluatorContext,
        next_flow: &Flow,
    ) -> Decision {
        if request.experiment.status != ExperimentStatus::Paused {
            return next_flow.evaluate(evaluator, request, context);
        }
        let reason = match request.experiment.experiment_type {
            ExperimentType::AbTest => DecisionReason::ExperimentPaused,
            ExperimentType::FeatureFlag => DecisionReason::FeatureFlagInactive,
        };
        decide_default(request, context, reason)
    }
}

struct CompletedEvaluator;

impl FlowEvaluator<ExperimentFlow> for CompletedEvaluator {
    fn evaluate(
        &self,
        evaluator: &Evaluator,
        request: &ExperimentRequest<'_>,
        context: &mut EvaluatorContext,
        next_flow: &Flow,
    ) -> Decision {
        let experiment = request.experiment;
        if !matches!(experiment.status, ExperimentStatus::Completed { .. }) {
            return next_flow.evaluate(evaluator, request, context);
        }
        let winner = experiment.winner_variation().ok_or_else(|| {
            warn!("completed experiment {} has no winner variation", experiment.key);
            Error::WinnerVariationNotFound(experiment.id)
        })?;
        ExperimentEvaluation::of(request, context, winner, DecisionReason::ExperimentCompleted)
            .map(Some)
    }
}

/// Allocates a running A/B test through its default rule. A dropped variation is never served.
struct TrafficAllocateEvaluator;

impl FlowEvaluator<ExperimentFlow> for TrafficAllocateEvaluator {
    fn evaluate(
        &self,
        _evaluator: &Evaluator,
        request: &ExperimentRequest<'_>,
        context: &mut EvaluatorContext,
        _next_flow: &Flow,
    ) -> Decision {
        let experiment = request.experiment;
        if !experiment.is_running() || experiment.experiment_type != ExperimentType::AbTest {
            return Err(unexpected_flow("traffic allocation", request));
        }
        match resolver::resolve_action(request, &experiment.default_rule)? {
            None => decide_default(request, context, DecisionReason::TrafficNotAllocated),
            Some(variation) if variation.is_dropped => {
                decide_default(request, context, DecisionReason::VariationDropped)
            }
            Some(variation) => {
                ExperimentEvaluation::of(request, context, variation, DecisionReason::TrafficAllocated)
                    .map(Some)
            }
        }
    }
}

/// The first matching feature flag target rule decides, and must decide a variation.
struct TargetRuleEvaluator;

impl FlowEvaluator<ExperimentFlow> for TargetRuleEvaluator {
    fn evaluate(
        &self,
        evaluator: &Evaluator,
        request: &ExperimentRequest<'_>,
        context: &mut EvaluatorContext,
        next_flow: &Flow,
    ) -> Decision {
        let experiment = request.experiment;
        if !experiment.is_running() || experiment.experiment_type != ExperimentType::FeatureFlag {
            return Err(unexpected_flow("target rule", request));
        }
        if request.identifier().is_none() {
            return next_flow.evaluate(evaluator, request, context);
        }
        let rule = match resolver::determine_target_rule(evaluator, request, context)? {
            Some(rule) => rule,
            None => return next_flow.evaluate(evaluator, request, context),
        };
        let variation = resolver::resolve_action(request, &rule.action)?.ok_or_else(|| {
            warn!("target rule of feature flag {} decided no variation", experiment.key);
            Error::UndecidedVariation(experiment.id)
        })?;
        ExperimentEvaluation::of(request, context, variation, DecisionReason::TargetRuleMatch)
            .map(Some)
    }
}

/// The default rule of a running feature flag always decides.
struct DefaultRuleEvaluator;

impl FlowEvaluator<ExperimentFlow> for DefaultRuleEvaluator {
    fn evaluate(
        &self,
        _evaluator: &Evaluator,
        request: &ExperimentRequest<'_>,
        context: &mut EvaluatorContext,
        _next_flow: &Flow,
    ) -> Decision {
        let experiment = request.experiment;
        if !experiment.is_running() || experiment.experiment_type != ExperimentType::FeatureFlag {
            return Err(unexpected_flow("default rule", request));
        }
        if request.identifier().is_none() {
            return decide_default(request, context, DecisionReason::DefaultRule);
        }
        let variation = resolver::resolve_action(request, &experiment.default_rule)?
            .ok_or_else(|| {
                warn!("default rule of feature flag {} decided no variation", experiment.key);
                Error::UndecidedVariation(experiment.id)
            })?;
        ExperimentEvaluation::of(request, context, variation, DecisionReason::DefaultRule).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{Action, Experiment};
    use crate::storage::InMemoryManualOverrideStorage;
    use crate::test_common::*;
    use crate::user::HackleUser;
    use maplit::hashmap;
    use spectral::prelude::*;
    use std::sync::Arc;
    use test_case::test_case;

    fn evaluate(workspace: &TestWorkspace, experiment: &Experiment, user: &HackleUser) -> Result<ExperimentEvaluation> {
        let request = ExperimentRequest::new(workspace, user, experiment);
        Evaluator::new().evaluate_experiment(&request, &mut EvaluatorContext::new())
    }

    fn user(id: &str) -> HackleUser {
        HackleUser::builder().id(id).build()
    }

    fn assert_decision(evaluation: &ExperimentEvaluation, variation_id: i64, reason: DecisionReason) {
        asserting!("variation")
            .that(&evaluation.variation_id)
            .contains_value(variation_id);
        assert_eq!(evaluation.reason, reason);
    }

    #[test_case("user_01", 41, "A")]
    #[test_case("user_02", 42, "B")]
    fn ab_test_allocates_traffic(user_id: &str, variation_id: i64, variation_key: &str) {
        let workspace = TestWorkspace::new().with_bucket(bucket_5());
        let evaluation = evaluate(&workspace, &running_ab_test(), &user(user_id)).unwrap();
        assert_decision(&evaluation, variation_id, DecisionReason::TrafficAllocated);
        assert_eq!(evaluation.variation_key, variation_key);
    }

    #[test]
    fn ab_test_gap_is_not_allocated() {
        let workspace = TestWorkspace::new().with_bucket(parse(
            r#"{"id": 5, "seed": 1, "slotSize": 10000, "slots": [
                {"startInclusive": 0, "endExclusive": 1000, "variationId": 42}
            ]}"#,
        ));
        // user_02 falls in slot 5978
        let evaluation = evaluate(&workspace, &running_ab_test(), &user("user_02")).unwrap();
        assert_decision(&evaluation, 41, DecisionReason::TrafficNotAllocated);
    }

    #[test]
    fn ab_test_override_skips_bucketing() {
        let mut experiment = running_ab_test();
        experiment.user_overrides = hashmap! {"user_02".to_string() => 41};
        let evaluation = evaluate(&TestWorkspace::new(), &experiment, &user("user_02")).unwrap();
        assert_decision(&evaluation, 41, DecisionReason::Overridden);
    }

    #[test]
    fn manual_override_for_scenario_user() {
        let experiment = running_ab_test();
        let overrides = Arc::new(InMemoryManualOverrideStorage::new());
        overrides.set(1, "user_02", 41);
        let evaluator = Evaluator::builder().manual_override_storage(overrides).build();
        let workspace = TestWorkspace::new();
        let user = user("user_02");
        let request = ExperimentRequest::new(&workspace, &user, &experiment);

        let evaluation = evaluator
            .evaluate_experiment(&request, &mut EvaluatorContext::new())
            .unwrap();
        assert_decision(&evaluation, 41, DecisionReason::Overridden);
    }

    #[test]
    fn ab_test_without_identifier_gets_default() {
        let anonymous = HackleUser::builder().user_id("member").build();
        let evaluation = evaluate(&TestWorkspace::new(), &running_ab_test(), &anonymous).unwrap();
        assert_decision(&evaluation, 41, DecisionReason::IdentifierNotFound);
    }

    #[test]
    fn ab_test_outside_container_group_gets_default() {
        let mut experiment = running_ab_test();
        experiment.container_id = Some(3);
        let workspace = TestWorkspace::new()
            .with_bucket(bucket_5())
            .with_bucket(parse(
                r#"{"id": 30, "seed": 1, "slotSize": 10000, "slots": [
                    {"startInclusive": 0, "endExclusive": 10000, "variationId": 31}
                ]}"#,
            ))
            .with_container(parse(
                r#"{"id": 3, "bucketId": 30, "groups": [{"id": 31, "experiments": [2]}]}"#,
            ));
        let evaluation = evaluate(&workspace, &experiment, &user("user_02")).unwrap();
        assert_decision(&evaluation, 41, DecisionReason::NotInMutualExclusionExperiment);
    }

    #[test]
    fn ab_test_outside_audience_gets_default() {
        let mut experiment = running_ab_test();
        experiment.target_audiences = vec![parse(
            r#"{"conditions": [{
                "key": {"type": "USER_PROPERTY", "name": "grade"},
                "match": {"type": "MATCH", "operator": "IN", "valueType": "STRING", "values": ["GOLD"]}
            }]}"#,
        )];
        let workspace = TestWorkspace::new().with_bucket(bucket_5());

        let evaluation = evaluate(&workspace, &experiment, &user("user_02")).unwrap();
        assert_decision(&evaluation, 41, DecisionReason::NotInExperimentTarget);

        let gold = HackleUser::builder().id("user_02").property("grade", "GOLD").build();
        let evaluation = evaluate(&workspace, &experiment, &gold).unwrap();
        assert_decision(&evaluation, 42, DecisionReason::TrafficAllocated);
    }

    #[test_case(ExperimentStatus::Draft, DecisionReason::ExperimentDraft)]
    #[test_case(ExperimentStatus::Paused, DecisionReason::ExperimentPaused)]
    fn inactive_ab_test_gets_default(status: ExperimentStatus, reason: DecisionReason) {
        let mut experiment = running_ab_test();
        experiment.status = status;
        let evaluation = evaluate(&TestWorkspace::new(), &experiment, &user("user_02")).unwrap();
        assert_decision(&evaluation, 41, reason);
    }

    #[test]
    fn completed_ab_test_returns_winner() {
        let mut experiment = running_ab_test();
        experiment.status = ExperimentStatus::Completed {
            winner_variation_id: Some(42),
        };
        let evaluation = evaluate(&TestWorkspace::new(), &experiment, &user("user_01")).unwrap();
        assert_decision(&evaluation, 42, DecisionReason::ExperimentCompleted);
    }

    #[test]
    fn completed_ab_test_without_winner_is_an_error() {
        let mut experiment = running_ab_test();
        experiment.status = ExperimentStatus::Completed {
            winner_variation_id: None,
        };
        assert_eq!(
            evaluate(&TestWorkspace::new(), &experiment, &user("user_01")),
            Err(Error::WinnerVariationNotFound(1))
        );
    }

    #[test]
    fn dropped_variation_falls_back_to_default() {
        let mut experiment = running_ab_test();
        experiment.variations[1].is_dropped = true;
        let workspace = TestWorkspace::new().with_bucket(bucket_5());

        let evaluation = evaluate(&workspace, &experiment, &user("user_02")).unwrap();
        assert_decision(&evaluation, 41, DecisionReason::VariationDropped);
    }

    #[test]
    fn dropped_default_variation_is_never_returned() {
        let mut experiment = running_ab_test();
        experiment.variations[0].is_dropped = true;
        experiment.variations[1].is_dropped = true;
        let workspace = TestWorkspace::new().with_bucket(bucket_5());

        let evaluation = evaluate(&workspace, &experiment, &user("user_02")).unwrap();
        assert_that!(evaluation.variation_id).is_none();
        assert_eq!(evaluation.variation_key, "A");
        assert_eq!(evaluation.reason, DecisionReason::VariationDropped);
    }

    #[test]
    fn custom_default_variation_key() {
        let mut experiment = running_ab_test();
        experiment.status = ExperimentStatus::Paused;
        let workspace = TestWorkspace::new();
        let user = user("user_01");

        let request = ExperimentRequest::new(&workspace, &user, &experiment).with_default_variation_key("B");
        let evaluation = Evaluator::new()
            .evaluate_experiment(&request, &mut EvaluatorContext::new())
            .unwrap();
        assert_decision(&evaluation, 42, DecisionReason::ExperimentPaused);

        let request = ExperimentRequest::new(&workspace, &user, &experiment).with_default_variation_key("Z");
        let evaluation = Evaluator::new()
            .evaluate_experiment(&request, &mut EvaluatorContext::new())
            .unwrap();
        assert_that!(evaluation.variation_id).is_none();
        assert_eq!(evaluation.variation_key, "Z");
    }

    #[test]
    fn allocated_variation_carries_parameter_configuration() {
        let mut experiment = running_ab_test();
        experiment.variations[1].parameter_configuration_id = Some(7);
        let workspace = TestWorkspace::new()
            .with_bucket(bucket_5())
            .with_parameter_configuration(parse(r#"{"id": 7, "parameters": {"color": "red"}}"#));

        let evaluation = evaluate(&workspace, &experiment, &user("user_02")).unwrap();
        let config = evaluation.config.expect("config");
        assert_eq!(config.get_str("color", "blue"), "red");
    }

    #[test]
    fn dangling_parameter_configuration_is_an_error() {
        let mut experiment = running_ab_test();
        experiment.variations[1].parameter_configuration_id = Some(7);
        let workspace = TestWorkspace::new().with_bucket(bucket_5());
        assert_eq!(
            evaluate(&workspace, &experiment, &user("user_02")),
            Err(Error::ParameterConfigurationNotFound(7))
        );
    }

    #[test]
    fn traffic_allocation_rejects_inactive_experiment() {
        let mut experiment = running_ab_test();
        experiment.status = ExperimentStatus::Paused;
        let workspace = TestWorkspace::new().with_bucket(bucket_5());
        let user = user("user_01");
        let request = ExperimentRequest::new(&workspace, &user, &experiment);

        let result = TrafficAllocateEvaluator.evaluate(
            &Evaluator::new(),
            &request,
            &mut EvaluatorContext::new(),
            &EvaluationFlow::End,
        );
        assert!(matches!(
            result,
            Err(Error::UnexpectedFlow {
                stage: "traffic allocation",
                ..
            })
        ));
    }

    fn feature_flag_with_rule() -> Experiment {
        let mut feature_flag = feature_flag();
        feature_flag.target_rules = vec![parse(
            r#"{
                "target": {"conditions": [{
                    "key": {"type": "USER_PROPERTY", "name": "grade"},
                    "match": {"type": "MATCH", "operator": "IN", "valueType": "STRING", "values": ["GOLD", "SILVER"]}
                }]},
                "action": {"type": "BUCKET", "bucketId": 6125}
            }"#,
        )];
        feature_flag
    }

    fn feature_flag_workspace() -> TestWorkspace {
        // seed 6125: user_01 falls in slot 9650
        TestWorkspace::new().with_bucket(bucket_5()).with_bucket(parse(
            r#"{"id": 6125, "seed": 6125, "slotSize": 10000, "slots": [
                {"startInclusive": 0, "endExclusive": 5000, "variationId": 41},
                {"startInclusive": 5000, "endExclusive": 10000, "variationId": 42}
            ]}"#,
        ))
    }

    #[test]
    fn feature_flag_target_rule_match() {
        let gold = HackleUser::builder().id("user_01").property("grade", "GOLD").build();
        let evaluation = evaluate(&feature_flag_workspace(), &feature_flag_with_rule(), &gold).unwrap();
        assert_decision(&evaluation, 42, DecisionReason::TargetRuleMatch);
        assert!(evaluation.is_on());
    }

    #[test]
    fn feature_flag_default_rule() {
        // user_01 is slot 740 in bucket 5
        let evaluation =
            evaluate(&feature_flag_workspace(), &feature_flag_with_rule(), &user("user_01")).unwrap();
        assert_decision(&evaluation, 41, DecisionReason::DefaultRule);
        assert!(!evaluation.is_on());
    }

    #[test]
    fn feature_flag_without_identifier_uses_default_rule_default() {
        let anonymous = HackleUser::builder().user_id("member").property("grade", "GOLD").build();
        let evaluation = evaluate(&feature_flag_workspace(), &feature_flag_with_rule(), &anonymous).unwrap();
        assert_decision(&evaluation, 41, DecisionReason::DefaultRule);
    }

    #[test]
    fn feature_flag_individual_target() {
        let mut feature_flag = feature_flag_with_rule();
        feature_flag.user_overrides = hashmap! {"user_01".to_string() => 42};
        let evaluation = evaluate(&TestWorkspace::new(), &feature_flag, &user("user_01")).unwrap();
        assert_decision(&evaluation, 42, DecisionReason::IndividualTargetMatch);
    }

    #[test_case(ExperimentStatus::Draft)]
    #[test_case(ExperimentStatus::Paused)]
    fn inactive_feature_flag_is_off(status: ExperimentStatus) {
        let mut feature_flag = feature_flag_with_rule();
        feature_flag.status = status;
        feature_flag.user_overrides = hashmap! {"user_01".to_string() => 42};
        let evaluation = evaluate(&TestWorkspace::new(), &feature_flag, &user("user_01")).unwrap();
        assert_decision(&evaluation, 41, DecisionReason::FeatureFlagInactive);
    }

    #[test]
    fn completed_feature_flag_returns_winner() {
        let mut feature_flag = feature_flag();
        feature_flag.status = ExperimentStatus::Completed {
            winner_variation_id: Some(42),
        };
        let evaluation = evaluate(&TestWorkspace::new(), &feature_flag, &user("user_01")).unwrap();
        assert_decision(&evaluation, 42, DecisionReason::ExperimentCompleted);
    }

    #[test]
    fn feature_flag_rule_must_decide() {
        // user_03 (slot 9832 with seed 1) falls in a gap of bucket 5's replacement
        let workspace = TestWorkspace::new().with_bucket(parse(
            r#"{"id": 5, "seed": 1, "slotSize": 10000, "slots": [
                {"startInclusive": 0, "endExclusive": 9000, "variationId": 41}
            ]}"#,
        ));
        assert_eq!(
            evaluate(&workspace, &feature_flag(), &user("user_03")),
            Err(Error::UndecidedVariation(2))
        );

        let mut feature_flag = feature_flag();
        feature_flag.default_rule = Action::Variation { variation_id: 99 };
        assert!(matches!(
            evaluate(&workspace, &feature_flag, &user("user_03")),
            Err(Error::VariationNotFound { .. })
        ));
    }
}
