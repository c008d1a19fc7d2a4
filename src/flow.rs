use crate::context::EvaluatorContext;
use crate::error::Result;
use crate::evaluation::{ExperimentEvaluation, InAppMessageEligibilityEvaluation};
use crate::evaluator::Evaluator;
use crate::experiment::ExperimentType;
use crate::request::{ExperimentRequest, InAppMessageEligibilityRequest, InAppMessagePhase};
use crate::{experiment_flow, in_app_message_flow};

/// Binds the request and evaluation types one family of flows works with.
pub(crate) trait FlowKind: 'static {
    type Request<'a>;
    type Evaluation;
}

pub(crate) struct ExperimentFlow;

impl FlowKind for ExperimentFlow {
    type Request<'a> = ExperimentRequest<'a>;
    type Evaluation = ExperimentEvaluation;
}

pub(crate) struct InAppMessageFlow;

impl FlowKind for InAppMessageFlow {
    type Request<'a> = InAppMessageEligibilityRequest<'a>;
    type Evaluation = InAppMessageEligibilityEvaluation;
}

/// One decision stage. A stage either decides, or hands the request on by evaluating
/// `next_flow` itself.
pub(crate) trait FlowEvaluator<K: FlowKind>: Send + Sync {
    fn evaluate(
        &self,
        evaluator: &Evaluator,
        request: &K::Request<'_>,
        context: &mut EvaluatorContext,
        next_flow: &EvaluationFlow<K>,
    ) -> Result<Option<K::Evaluation>>;
}

/// An ordered chain of decision stages.
pub(crate) enum EvaluationFlow<K: FlowKind> {
    End,
    Decision {
        flow_evaluator: Box<dyn FlowEvaluator<K>>,
        next_flow: Box<EvaluationFlow<K>>,
    },
}

impl<K: FlowKind> EvaluationFlow<K> {
    /// Chain `flow_evaluators` in order, ending in [EvaluationFlow::End].
    pub(crate) fn of(flow_evaluators: Vec<Box<dyn FlowEvaluator<K>>>) -> Self {
        flow_evaluators
            .into_iter()
            .rev()
            .fold(EvaluationFlow::End, |next_flow, flow_evaluator| {
                EvaluationFlow::Decision {
                    flow_evaluator,
                    next_flow: Box::new(next_flow),
                }
            })
    }

    /// Run the chain. None when every stage passed the request on; the caller supplies the
    /// default.
    pub(crate) fn evaluate(
        &self,
        evaluator: &Evaluator,
        request: &K::Request<'_>,
        context: &mut EvaluatorContext,
    ) -> Result<Option<K::Evaluation>> {
        match self {
            EvaluationFlow::End => Ok(None),
            EvaluationFlow::Decision {
                flow_evaluator,
                next_flow,
            } => flow_evaluator.evaluate(evaluator, request, context, next_flow),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        match self {
            EvaluationFlow::End => 0,
            EvaluationFlow::Decision { next_flow, .. } => 1 + next_flow.len(),
        }
    }
}

/// Flows are stateless, so each one is built once per evaluator and shared by every call.
pub(crate) struct EvaluationFlowFactory {
    ab_test_flow: EvaluationFlow<ExperimentFlow>,
    feature_flag_flow: EvaluationFlow<ExperimentFlow>,
    in_app_message_trigger_flow: EvaluationFlow<InAppMessageFlow>,
    in_app_message_deliver_flow: EvaluationFlow<InAppMessageFlow>,
}

impl EvaluationFlowFactory {
    pub(crate) fn new() -> Self {
        EvaluationFlowFactory {
            ab_test_flow: experiment_flow::ab_test_flow(),
            feature_flag_flow: experiment_flow::feature_flag_flow(),
            in_app_message_trigger_flow: in_app_message_flow::trigger_flow(),
            in_app_message_deliver_flow: in_app_message_flow::deliver_flow(),
        }
    }

    pub(crate) fn experiment_flow(
        &self,
        experiment_type: ExperimentType,
    ) -> &EvaluationFlow<ExperimentFlow> {
        match experiment_type {
            ExperimentType::AbTest => &self.ab_test_flow,
            ExperimentType::FeatureFlag => &self.feature_flag_flow,
        }
    }

    pub(crate) fn in_app_message_flow(
        &self,
        phase: InAppMessagePhase,
    ) -> &EvaluationFlow<InAppMessageFlow> {
        match phase {
            InAppMessagePhase::Trigger => &self.in_app_message_trigger_flow,
            InAppMessagePhase::Deliver => &self.in_app_message_deliver_flow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::DecisionReason;
    use crate::test_common::{running_ab_test, TestWorkspace};
    use crate::user::HackleUser;

    struct Fixed(DecisionReason);

    impl FlowEvaluator<ExperimentFlow> for Fixed {
        fn evaluate(
            &self,
            _evaluator: &Evaluator,
            request: &ExperimentRequest<'_>,
            context: &mut EvaluatorContext,
            _next_flow: &EvaluationFlow<ExperimentFlow>,
        ) -> Result<Option<ExperimentEvaluation>> {
            ExperimentEvaluation::of_default(request, context, self.0).map(Some)
        }
    }

    struct PassThrough;

    impl FlowEvaluator<ExperimentFlow> for PassThrough {
        fn evaluate(
            &self,
            evaluator: &Evaluator,
            request: &ExperimentRequest<'_>,
            context: &mut EvaluatorContext,
            next_flow: &EvaluationFlow<ExperimentFlow>,
        ) -> Result<Option<ExperimentEvaluation>> {
            next_flow.evaluate(evaluator, request, context)
        }
    }

    #[test]
    fn stages_run_in_order_until_one_decides() {
        let workspace = TestWorkspace::new();
        let user = HackleUser::builder().id("user_01").build();
        let experiment = running_ab_test();
        let request = ExperimentRequest::new(&workspace, &user, &experiment);

        let flow: EvaluationFlow<ExperimentFlow> = EvaluationFlow::of(vec![
            Box::new(PassThrough),
            Box::new(Fixed(DecisionReason::ExperimentPaused)),
            Box::new(Fixed(DecisionReason::ExperimentDraft)),
        ]);
        assert_eq!(flow.len(), 3);

        let evaluation = flow
            .evaluate(&Evaluator::new(), &request, &mut EvaluatorContext::new())
            .unwrap()
            .unwrap();
        assert_eq!(evaluation.reason, DecisionReason::ExperimentPaused);
    }

    #[test]
    fn end_decides_nothing() {
        let workspace = TestWorkspace::new();
        let user = HackleUser::builder().build();
        let experiment = running_ab_test();
        let request = ExperimentRequest::new(&workspace, &user, &experiment);

        let flow: EvaluationFlow<ExperimentFlow> = EvaluationFlow::of(vec![Box::new(PassThrough)]);
        let evaluation = flow
            .evaluate(&Evaluator::new(), &request, &mut EvaluatorContext::new())
            .unwrap();
        assert!(evaluation.is_none());
    }

    #[test]
    fn factory_builds_one_flow_per_kind() {
        let factory = EvaluationFlowFactory::new();
        assert_eq!(factory.experiment_flow(ExperimentType::AbTest).len(), 8);
        assert_eq!(factory.experiment_flow(ExperimentType::FeatureFlag).len(), 7);
        assert_eq!(factory.in_app_message_flow(InAppMessagePhase::Trigger).len(), 10);
        assert_eq!(factory.in_app_message_flow(InAppMessagePhase::Deliver).len(), 3);
    }
}
