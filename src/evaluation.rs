use serde::Serialize;

use crate::context::EvaluatorContext;
use crate::error::{Error, Result};
use crate::experiment::{Experiment, Variation, DEFAULT_VARIATION_KEY};
use crate::in_app_message::Message;
use crate::remote_config::{ParameterConfiguration, RemoteConfigTargetRule, RemoteConfigValue};
use crate::request::{
    EvaluatorKey, EvaluatorKind, ExperimentRequest, InAppMessageEligibilityRequest,
    InAppMessageLayoutRequest, RemoteConfigRequest,
};
use crate::value::Value;

/// DecisionReason describes the main factor that led an evaluation to its result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionReason {
    /// The host SDK was not ready. Never produced by the core.
    SdkNotReady,
    /// The host fell back to its default because evaluation raised an error. Never produced by
    /// the core.
    Exception,
    /// The host rejected the request before evaluation. Never produced by the core.
    InvalidInput,

    ExperimentNotFound,
    ExperimentDraft,
    ExperimentPaused,
    /// The experiment is completed and its winner was returned.
    ExperimentCompleted,
    /// A manual, direct or segment override decided an A/B test.
    Overridden,
    TrafficNotAllocated,
    TrafficAllocated,
    /// Traffic was allocated while the experiment was evaluated as another entity's targeting
    /// condition.
    TrafficAllocatedByTargeting,
    NotInMutualExclusionExperiment,
    IdentifierNotFound,
    VariationDropped,
    NotInExperimentTarget,

    FeatureFlagNotFound,
    FeatureFlagInactive,
    /// A manual, direct or segment override decided a feature flag.
    IndividualTargetMatch,
    TargetRuleMatch,
    DefaultRule,

    RemoteConfigParameterNotFound,
    TypeMismatch,

    InAppMessageNotFound,
    UnsupportedPlatform,
    InAppMessageDraft,
    InAppMessagePaused,
    InAppMessageHidden,
    NotInInAppMessagePeriod,
    NotInInAppMessageTarget,
    InAppMessageTarget,
    InAppMessageFrequencyCapped,
}

/// The result of deciding an A/B test variation or a feature flag state.
#[derive(Clone, Debug, PartialEq)]
pub struct ExperimentEvaluation {
    pub reason: DecisionReason,
    /// Evaluations consulted while reaching this decision.
    pub target_evaluations: Vec<Evaluation>,
    pub experiment: Experiment,
    /// None when the default variation key names no usable variation.
    pub variation_id: Option<i64>,
    pub variation_key: String,
    /// The parameter configuration attached to the decided variation, if any.
    pub config: Option<ParameterConfiguration>,
}

impl ExperimentEvaluation {
    pub(crate) fn of(
        request: &ExperimentRequest<'_>,
        context: &EvaluatorContext,
        variation: &Variation,
        reason: DecisionReason,
    ) -> Result<ExperimentEvaluation> {
        let config = match variation.parameter_configuration_id {
            Some(id) => Some(
                request
                    .workspace
                    .parameter_configuration(id)
                    .ok_or(Error::ParameterConfigurationNotFound(id))?
                    .clone(),
            ),
            None => None,
        };
        Ok(ExperimentEvaluation {
            reason,
            target_evaluations: context.evaluations().to_vec(),
            experiment: request.experiment.clone(),
            variation_id: Some(variation.id),
            variation_key: variation.key.clone(),
            config,
        })
    }

    /// The request's default variation. A dropped default variation is never returned by id.
    pub(crate) fn of_default(
        request: &ExperimentRequest<'_>,
        context: &EvaluatorContext,
        reason: DecisionReason,
    ) -> Result<ExperimentEvaluation> {
        match request
            .experiment
            .variation_by_key(&request.default_variation_key)
        {
            Some(variation) if !variation.is_dropped => {
                ExperimentEvaluation::of(request, context, variation, reason)
            }
            _ => Ok(ExperimentEvaluation {
                reason,
                target_evaluations: context.evaluations().to_vec(),
                experiment: request.experiment.clone(),
                variation_id: None,
                variation_key: request.default_variation_key.clone(),
                config: None,
            }),
        }
    }

    pub fn with_reason(mut self, reason: DecisionReason) -> Self {
        self.reason = reason;
        self
    }

    /// Feature flag state: any variation other than the default one means on.
    pub fn is_on(&self) -> bool {
        self.variation_key != DEFAULT_VARIATION_KEY
    }
}

/// The result of deciding a remote config parameter value.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteConfigEvaluation {
    pub reason: DecisionReason,
    pub target_evaluations: Vec<Evaluation>,
    pub parameter_id: i64,
    pub parameter_key: String,
    /// Id of the configured value that was returned. None when the caller default was returned.
    pub value_id: Option<i64>,
    pub value: Value,
    /// Details recorded alongside the remote config exposure.
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl RemoteConfigEvaluation {
    pub(crate) fn of(
        request: &RemoteConfigRequest<'_>,
        context: &EvaluatorContext,
        target_rule: Option<&RemoteConfigTargetRule>,
        value: &RemoteConfigValue,
        reason: DecisionReason,
    ) -> RemoteConfigEvaluation {
        if !value.raw_value.is_type_of(request.required_type) {
            return RemoteConfigEvaluation::of_default(
                request,
                context,
                DecisionReason::TypeMismatch,
            );
        }
        let mut evaluation = RemoteConfigEvaluation::build(
            request,
            context,
            Some(value.id),
            value.raw_value.clone(),
            reason,
        );
        if let Some(rule) = target_rule {
            evaluation
                .properties
                .insert("targetRuleKey".into(), rule.key.clone().into());
            evaluation
                .properties
                .insert("targetRuleName".into(), rule.name.clone().into());
        }
        evaluation
    }

    pub(crate) fn of_default(
        request: &RemoteConfigRequest<'_>,
        context: &EvaluatorContext,
        reason: DecisionReason,
    ) -> RemoteConfigEvaluation {
        RemoteConfigEvaluation::build(request, context, None, request.default_value.clone(), reason)
    }

    fn build(
        request: &RemoteConfigRequest<'_>,
        context: &EvaluatorContext,
        value_id: Option<i64>,
        value: Value,
        reason: DecisionReason,
    ) -> RemoteConfigEvaluation {
        let mut properties = serde_json::Map::new();
        properties.insert(
            "requestValueType".into(),
            serde_json::to_value(request.required_type).unwrap_or_default(),
        );
        properties.insert(
            "requestDefaultValue".into(),
            serde_json::Value::from(&request.default_value),
        );
        properties.insert("returnValue".into(), serde_json::Value::from(&value));
        RemoteConfigEvaluation {
            reason,
            target_evaluations: context.evaluations().to_vec(),
            parameter_id: request.parameter.id,
            parameter_key: request.parameter.key.clone(),
            value_id,
            value,
            properties,
        }
    }
}

/// The result of resolving which localized message of an in-app message to render.
#[derive(Clone, Debug, PartialEq)]
pub struct InAppMessageLayoutEvaluation {
    pub reason: DecisionReason,
    pub in_app_message_id: i64,
    pub message: Message,
}

impl InAppMessageLayoutEvaluation {
    pub(crate) fn of(
        request: &InAppMessageLayoutRequest<'_>,
        message: &Message,
        reason: DecisionReason,
    ) -> Self {
        InAppMessageLayoutEvaluation {
            reason,
            in_app_message_id: request.in_app_message.id,
            message: message.clone(),
        }
    }
}

/// The result of deciding whether an in-app message should be shown.
#[derive(Clone, Debug, PartialEq)]
pub struct InAppMessageEligibilityEvaluation {
    pub reason: DecisionReason,
    pub target_evaluations: Vec<Evaluation>,
    pub in_app_message_id: i64,
    pub in_app_message_key: i64,
    pub is_eligible: bool,
    /// The message to render. Only set for eligible evaluations whose layout was resolved.
    pub layout: Option<InAppMessageLayoutEvaluation>,
}

impl InAppMessageEligibilityEvaluation {
    pub(crate) fn eligible(
        request: &InAppMessageEligibilityRequest<'_>,
        context: &EvaluatorContext,
        reason: DecisionReason,
    ) -> Self {
        let layout_key =
            EvaluatorKey::new(EvaluatorKind::InAppMessageLayout, request.in_app_message.id);
        let layout = match context.evaluation(&layout_key) {
            Some(Evaluation::InAppMessageLayout(layout)) => Some(layout.clone()),
            _ => None,
        };
        InAppMessageEligibilityEvaluation::build(request, context, reason, true, layout)
    }

    pub(crate) fn ineligible(
        request: &InAppMessageEligibilityRequest<'_>,
        context: &EvaluatorContext,
        reason: DecisionReason,
    ) -> Self {
        InAppMessageEligibilityEvaluation::build(request, context, reason, false, None)
    }

    fn build(
        request: &InAppMessageEligibilityRequest<'_>,
        context: &EvaluatorContext,
        reason: DecisionReason,
        is_eligible: bool,
        layout: Option<InAppMessageLayoutEvaluation>,
    ) -> Self {
        // The resolved layout is carried in `layout`, not as a consulted evaluation.
        InAppMessageEligibilityEvaluation {
            reason,
            target_evaluations: context
                .evaluations()
                .iter()
                .filter(|e| e.key().kind != EvaluatorKind::InAppMessageLayout)
                .cloned()
                .collect(),
            in_app_message_id: request.in_app_message.id,
            in_app_message_key: request.in_app_message.key,
            is_eligible,
            layout,
        }
    }
}

/// Any evaluation the [crate::Evaluator] produces.
#[derive(Clone, Debug, PartialEq)]
pub enum Evaluation {
    Experiment(ExperimentEvaluation),
    RemoteConfig(RemoteConfigEvaluation),
    InAppMessageEligibility(InAppMessageEligibilityEvaluation),
    InAppMessageLayout(InAppMessageLayoutEvaluation),
}

impl Evaluation {
    /// The entity this evaluation is about.
    pub fn key(&self) -> EvaluatorKey {
        match self {
            Evaluation::Experiment(e) => {
                EvaluatorKey::new(EvaluatorKind::Experiment, e.experiment.id)
            }
            Evaluation::RemoteConfig(e) => {
                EvaluatorKey::new(EvaluatorKind::RemoteConfig, e.parameter_id)
            }
            Evaluation::InAppMessageEligibility(e) => {
                EvaluatorKey::new(EvaluatorKind::InAppMessage, e.in_app_message_id)
            }
            Evaluation::InAppMessageLayout(e) => {
                EvaluatorKey::new(EvaluatorKind::InAppMessageLayout, e.in_app_message_id)
            }
        }
    }

    pub fn reason(&self) -> DecisionReason {
        match self {
            Evaluation::Experiment(e) => e.reason,
            Evaluation::RemoteConfig(e) => e.reason,
            Evaluation::InAppMessageEligibility(e) => e.reason,
            Evaluation::InAppMessageLayout(e) => e.reason,
        }
    }

    pub fn as_experiment(&self) -> Option<&ExperimentEvaluation> {
        match self {
            Evaluation::Experiment(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ExperimentEvaluation> for Evaluation {
    fn from(evaluation: ExperimentEvaluation) -> Self {
        Evaluation::Experiment(evaluation)
    }
}

impl From<RemoteConfigEvaluation> for Evaluation {
    fn from(evaluation: RemoteConfigEvaluation) -> Self {
        Evaluation::RemoteConfig(evaluation)
    }
}

impl From<InAppMessageEligibilityEvaluation> for Evaluation {
    fn from(evaluation: InAppMessageEligibilityEvaluation) -> Self {
        Evaluation::InAppMessageEligibility(evaluation)
    }
}

impl From<InAppMessageLayoutEvaluation> for Evaluation {
    fn from(evaluation: InAppMessageLayoutEvaluation) -> Self {
        Evaluation::InAppMessageLayout(evaluation)
    }
}
