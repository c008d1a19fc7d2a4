use std::iter;
use std::sync::Arc;

use itertools::Itertools;
use log::{debug, warn};

use crate::config::{Clock, EvaluatorConfig, SystemClock};
use crate::context::EvaluatorContext;
use crate::error::{Error, Result};
use crate::evaluation::{
    DecisionReason, Evaluation, ExperimentEvaluation, InAppMessageEligibilityEvaluation,
    InAppMessageLayoutEvaluation, RemoteConfigEvaluation,
};
use crate::flow::EvaluationFlowFactory;
use crate::in_app_message::InAppMessage;
use crate::in_app_message_matcher;
use crate::remote_config;
use crate::request::{
    EvaluatorKey, EvaluatorRequest, ExperimentRequest, InAppMessageEligibilityRequest,
    InAppMessageLayoutRequest, RemoteConfigRequest, Request,
};
use crate::storage::{
    DelegatingManualOverrideStorage, InAppMessageHiddenStorage, InAppMessageImpressionStorage,
    InMemoryHiddenStorage, InMemoryImpressionStorage, ManualOverrideStorage,
};
use crate::user::{HackleUser, TrackedEvent};
use crate::workspace::Workspace;

/// Evaluator decides experiments, feature flags, remote config parameters and in-app messages
/// against a [Workspace].
///
/// The evaluator holds no per-call state and can be shared between threads. Every top-level call
/// takes a fresh [EvaluatorContext]; entities evaluated on behalf of another entity's targeting
/// reuse that context, so each entity is decided at most once per call and circular references
/// between entities are reported as [Error::CircularEvaluation].
///
/// The evaluator does not know anything about exposure events; recording the returned
/// evaluations (including their `target_evaluations`) is the responsibility of the caller.
pub struct Evaluator {
    config: EvaluatorConfig,
    clock: Arc<dyn Clock>,
    manual_override_storage: DelegatingManualOverrideStorage,
    hidden_storage: Arc<dyn InAppMessageHiddenStorage>,
    impression_storage: Arc<dyn InAppMessageImpressionStorage>,
    flows: EvaluationFlowFactory,
}

impl Evaluator {
    /// An evaluator with default config, the system clock, no manual overrides and in-memory
    /// in-app message storages.
    pub fn new() -> Self {
        EvaluatorBuilder::new().build()
    }

    pub fn builder() -> EvaluatorBuilder {
        EvaluatorBuilder::new()
    }

    pub fn evaluate(
        &self,
        request: &Request<'_>,
        context: &mut EvaluatorContext,
    ) -> Result<Evaluation> {
        match request {
            Request::Experiment(request) => {
                self.evaluate_experiment(request, context).map(Into::into)
            }
            Request::RemoteConfig(request) => {
                self.evaluate_remote_config(request, context).map(Into::into)
            }
            Request::InAppMessageEligibility(request) => {
                self.evaluate_in_app_message(request, context).map(Into::into)
            }
            Request::InAppMessageLayout(request) => self
                .evaluate_in_app_message_layout(request, context)
                .map(Into::into),
        }
    }

    /// Decide the variation of an A/B test or the state of a feature flag.
    pub fn evaluate_experiment(
        &self,
        request: &ExperimentRequest<'_>,
        context: &mut EvaluatorContext,
    ) -> Result<ExperimentEvaluation> {
        self.contextual(request.key(), context, |context| {
            let flow = self.flows.experiment_flow(request.experiment.experiment_type);
            let evaluation = match flow.evaluate(self, request, context)? {
                Some(evaluation) => evaluation,
                None => ExperimentEvaluation::of_default(
                    request,
                    context,
                    DecisionReason::TrafficNotAllocated,
                )?,
            };
            debug!(
                "experiment {} evaluated to variation {} ({:?})",
                request.experiment.key, evaluation.variation_key, evaluation.reason
            );
            Ok(evaluation)
        })
    }

    /// Decide the value of a remote config parameter.
    pub fn evaluate_remote_config(
        &self,
        request: &RemoteConfigRequest<'_>,
        context: &mut EvaluatorContext,
    ) -> Result<RemoteConfigEvaluation> {
        self.contextual(request.key(), context, |context| {
            let evaluation = remote_config::evaluate(self, request, context)?;
            debug!(
                "remote config parameter {} evaluated ({:?})",
                request.parameter.key, evaluation.reason
            );
            Ok(evaluation)
        })
    }

    /// Decide whether an in-app message should be shown, through the pipeline of the request's
    /// phase.
    pub fn evaluate_in_app_message(
        &self,
        request: &InAppMessageEligibilityRequest<'_>,
        context: &mut EvaluatorContext,
    ) -> Result<InAppMessageEligibilityEvaluation> {
        self.contextual(request.key(), context, |context| {
            let flow = self.flows.in_app_message_flow(request.phase);
            let evaluation = match flow.evaluate(self, request, context)? {
                Some(evaluation) => evaluation,
                None => InAppMessageEligibilityEvaluation::ineligible(
                    request,
                    context,
                    DecisionReason::NotInInAppMessageTarget,
                ),
            };
            debug!(
                "in-app message {} evaluated to eligible={} ({:?})",
                request.in_app_message.key, evaluation.is_eligible, evaluation.reason
            );
            Ok(evaluation)
        })
    }

    /// Pick the message of the in-app message's default language.
    pub fn evaluate_in_app_message_layout(
        &self,
        request: &InAppMessageLayoutRequest<'_>,
        context: &mut EvaluatorContext,
    ) -> Result<InAppMessageLayoutEvaluation> {
        self.contextual(request.key(), context, |_| {
            let message_context = &request.in_app_message.message_context;
            let message = request
                .in_app_message
                .message(&message_context.default_lang)
                .ok_or_else(|| {
                    warn!(
                        "in-app message {} has no message for its default lang {}",
                        request.in_app_message.key, message_context.default_lang
                    );
                    Error::LayoutNotFound {
                        in_app_message_id: request.in_app_message.id,
                        lang: message_context.default_lang.clone(),
                    }
                })?;
            Ok(InAppMessageLayoutEvaluation::of(
                request,
                message,
                DecisionReason::InAppMessageTarget,
            ))
        })
    }

    /// Whether `event` triggers `in_app_message` for `user`: some trigger rule names the event
    /// and its targets (which may inspect the event's properties) match.
    pub fn is_triggered(
        &self,
        workspace: &dyn Workspace,
        user: &HackleUser,
        in_app_message: &InAppMessage,
        event: &TrackedEvent,
    ) -> Result<bool> {
        let request =
            InAppMessageEligibilityRequest::new(workspace, user, in_app_message, self.clock.now())
                .triggered_by(event);
        in_app_message_matcher::is_triggered(self, &request, &mut EvaluatorContext::new())
    }

    /// Run `evaluate` with `key` marked as in progress, then remember its evaluation.
    fn contextual<E, F>(
        &self,
        key: EvaluatorKey,
        context: &mut EvaluatorContext,
        evaluate: F,
    ) -> Result<E>
    where
        E: Clone + Into<Evaluation>,
        F: FnOnce(&mut EvaluatorContext) -> Result<E>,
    {
        if context.contains(&key) {
            let chain = context.stack().iter().chain(iter::once(&key)).join(" - ");
            warn!("circular evaluation has occurred [{}]", chain);
            return Err(Error::CircularEvaluation { chain });
        }

        context.push(key);
        let result = evaluate(context);
        context.pop();

        let evaluation = result?;
        context.add_evaluation(evaluation.clone().into());
        Ok(evaluation)
    }

    pub(crate) fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn manual_override_storage(&self) -> &dyn ManualOverrideStorage {
        &self.manual_override_storage
    }

    pub(crate) fn hidden_storage(&self) -> &dyn InAppMessageHiddenStorage {
        self.hidden_storage.as_ref()
    }

    pub(crate) fn impression_storage(&self) -> &dyn InAppMessageImpressionStorage {
        self.impression_storage.as_ref()
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [Evaluator]. Anything not set falls back to the defaults of [Evaluator::new].
#[derive(Default)]
pub struct EvaluatorBuilder {
    config: EvaluatorConfig,
    clock: Option<Arc<dyn Clock>>,
    manual_override_storages: Vec<Arc<dyn ManualOverrideStorage>>,
    hidden_storage: Option<Arc<dyn InAppMessageHiddenStorage>>,
    impression_storage: Option<Arc<dyn InAppMessageImpressionStorage>>,
}

impl EvaluatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&mut self, config: EvaluatorConfig) -> &mut Self {
        self.config = config;
        self
    }

    pub fn clock(&mut self, clock: Arc<dyn Clock>) -> &mut Self {
        self.clock = Some(clock);
        self
    }

    /// Add a manual override source. Sources are consulted in the order they were added.
    pub fn manual_override_storage(
        &mut self,
        storage: Arc<dyn ManualOverrideStorage>,
    ) -> &mut Self {
        self.manual_override_storages.push(storage);
        self
    }

    pub fn hidden_storage(&mut self, storage: Arc<dyn InAppMessageHiddenStorage>) -> &mut Self {
        self.hidden_storage = Some(storage);
        self
    }

    pub fn impression_storage(
        &mut self,
        storage: Arc<dyn InAppMessageImpressionStorage>,
    ) -> &mut Self {
        self.impression_storage = Some(storage);
        self
    }

    pub fn build(&self) -> Evaluator {
        Evaluator {
            config: self.config.clone(),
            clock: self.clock.clone().unwrap_or_else(|| Arc::new(SystemClock)),
            manual_override_storage: DelegatingManualOverrideStorage::new(
                self.manual_override_storages.clone(),
            ),
            hidden_storage: self
                .hidden_storage
                .clone()
                .unwrap_or_else(|| Arc::new(InMemoryHiddenStorage::new())),
            impression_storage: self
                .impression_storage
                .clone()
                .unwrap_or_else(|| Arc::new(InMemoryImpressionStorage::new())),
            flows: EvaluationFlowFactory::new(),
        }
    }
}
