use std::fmt;

use chrono::{DateTime, Utc};

use crate::experiment::{Experiment, DEFAULT_VARIATION_KEY};
use crate::in_app_message::InAppMessage;
use crate::remote_config::RemoteConfigParameter;
use crate::user::{HackleUser, TrackedEvent};
use crate::value::{Value, ValueType};
use crate::workspace::Workspace;

/// The kind of entity an evaluation is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EvaluatorKind {
    Experiment,
    RemoteConfig,
    InAppMessage,
    InAppMessageLayout,
}

/// Identifies one entity evaluation within an [crate::EvaluatorContext].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EvaluatorKey {
    pub kind: EvaluatorKind,
    pub id: i64,
}

impl EvaluatorKey {
    pub fn new(kind: EvaluatorKind, id: i64) -> Self {
        EvaluatorKey { kind, id }
    }
}

impl fmt::Display for EvaluatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            EvaluatorKind::Experiment => "EXPERIMENT",
            EvaluatorKind::RemoteConfig => "REMOTE_CONFIG",
            EvaluatorKind::InAppMessage => "IN_APP_MESSAGE",
            EvaluatorKind::InAppMessageLayout => "IN_APP_MESSAGE_LAYOUT",
        };
        write!(f, "{}({})", kind, self.id)
    }
}

/// What every request exposes to targeting: the snapshot it is evaluated against, the user it is
/// about, and (for event-triggered requests only) the event that triggered it.
pub trait EvaluatorRequest {
    fn key(&self) -> EvaluatorKey;

    fn workspace(&self) -> &dyn Workspace;

    fn user(&self) -> &HackleUser;

    fn event(&self) -> Option<&TrackedEvent> {
        None
    }

    /// The instant the request is evaluated at, when it carries one. Time-windowed conditions
    /// fall back to the evaluator's clock otherwise.
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        None
    }

    /// Whether this request decides an experiment variation, as opposed to another entity whose
    /// targeting happens to reference an experiment.
    fn is_experiment_request(&self) -> bool {
        false
    }
}

/// Request to decide an A/B test variation or a feature flag state.
#[derive(Clone)]
pub struct ExperimentRequest<'a> {
    pub workspace: &'a dyn Workspace,
    pub user: &'a HackleUser,
    pub experiment: &'a Experiment,
    /// Key of the variation returned whenever no decision can be made.
    pub default_variation_key: String,
}

impl<'a> ExperimentRequest<'a> {
    pub fn new(
        workspace: &'a dyn Workspace,
        user: &'a HackleUser,
        experiment: &'a Experiment,
    ) -> Self {
        ExperimentRequest {
            workspace,
            user,
            experiment,
            default_variation_key: DEFAULT_VARIATION_KEY.to_string(),
        }
    }

    pub fn with_default_variation_key(mut self, default_variation_key: impl Into<String>) -> Self {
        self.default_variation_key = default_variation_key.into();
        self
    }

    /// A request for `experiment` made on behalf of another request's targeting.
    pub(crate) fn of(requested_by: &'a dyn EvaluatorRequest, experiment: &'a Experiment) -> Self {
        ExperimentRequest::new(requested_by.workspace(), requested_by.user(), experiment)
    }

    /// The identifier this experiment buckets by, if the user has one.
    pub fn identifier(&self) -> Option<&'a str> {
        self.user.identifier(&self.experiment.identifier_type)
    }
}

impl EvaluatorRequest for ExperimentRequest<'_> {
    fn key(&self) -> EvaluatorKey {
        EvaluatorKey::new(EvaluatorKind::Experiment, self.experiment.id)
    }

    fn workspace(&self) -> &dyn Workspace {
        self.workspace
    }

    fn user(&self) -> &HackleUser {
        self.user
    }

    fn is_experiment_request(&self) -> bool {
        true
    }
}

/// Request to decide a remote config parameter value.
#[derive(Clone)]
pub struct RemoteConfigRequest<'a> {
    pub workspace: &'a dyn Workspace,
    pub user: &'a HackleUser,
    pub parameter: &'a RemoteConfigParameter,
    /// The value type the caller will read the result as.
    pub required_type: ValueType,
    /// Returned when no rule applies or the configured value has the wrong type.
    pub default_value: Value,
}

impl<'a> RemoteConfigRequest<'a> {
    pub fn new(
        workspace: &'a dyn Workspace,
        user: &'a HackleUser,
        parameter: &'a RemoteConfigParameter,
        required_type: ValueType,
        default_value: impl Into<Value>,
    ) -> Self {
        RemoteConfigRequest {
            workspace,
            user,
            parameter,
            required_type,
            default_value: default_value.into(),
        }
    }
}

impl EvaluatorRequest for RemoteConfigRequest<'_> {
    fn key(&self) -> EvaluatorKey {
        EvaluatorKey::new(EvaluatorKind::RemoteConfig, self.parameter.id)
    }

    fn workspace(&self) -> &dyn Workspace {
        self.workspace
    }

    fn user(&self) -> &HackleUser {
        self.user
    }
}

/// Which eligibility pipeline an in-app message request runs through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InAppMessagePhase {
    /// Full eligibility check when an event may trigger the message.
    Trigger,
    /// Re-check right before an already triggered message is displayed.
    Deliver,
}

/// Request to decide whether an in-app message should be shown.
#[derive(Clone)]
pub struct InAppMessageEligibilityRequest<'a> {
    pub workspace: &'a dyn Workspace,
    pub user: &'a HackleUser,
    pub in_app_message: &'a InAppMessage,
    pub timestamp: DateTime<Utc>,
    pub event: Option<&'a TrackedEvent>,
    pub phase: InAppMessagePhase,
}

impl<'a> InAppMessageEligibilityRequest<'a> {
    pub fn new(
        workspace: &'a dyn Workspace,
        user: &'a HackleUser,
        in_app_message: &'a InAppMessage,
        timestamp: DateTime<Utc>,
    ) -> Self {
        InAppMessageEligibilityRequest {
            workspace,
            user,
            in_app_message,
            timestamp,
            event: None,
            phase: InAppMessagePhase::Trigger,
        }
    }

    pub fn triggered_by(mut self, event: &'a TrackedEvent) -> Self {
        self.event = Some(event);
        self
    }

    pub fn phase(mut self, phase: InAppMessagePhase) -> Self {
        self.phase = phase;
        self
    }
}

impl EvaluatorRequest for InAppMessageEligibilityRequest<'_> {
    fn key(&self) -> EvaluatorKey {
        EvaluatorKey::new(EvaluatorKind::InAppMessage, self.in_app_message.id)
    }

    fn workspace(&self) -> &dyn Workspace {
        self.workspace
    }

    fn user(&self) -> &HackleUser {
        self.user
    }

    fn event(&self) -> Option<&TrackedEvent> {
        self.event
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        Some(self.timestamp)
    }
}

/// Request to decide which localized message of an in-app message to render.
#[derive(Clone)]
pub struct InAppMessageLayoutRequest<'a> {
    pub workspace: &'a dyn Workspace,
    pub user: &'a HackleUser,
    pub in_app_message: &'a InAppMessage,
}

impl<'a> InAppMessageLayoutRequest<'a> {
    pub fn new(
        workspace: &'a dyn Workspace,
        user: &'a HackleUser,
        in_app_message: &'a InAppMessage,
    ) -> Self {
        InAppMessageLayoutRequest {
            workspace,
            user,
            in_app_message,
        }
    }
}

impl EvaluatorRequest for InAppMessageLayoutRequest<'_> {
    fn key(&self) -> EvaluatorKey {
        EvaluatorKey::new(EvaluatorKind::InAppMessageLayout, self.in_app_message.id)
    }

    fn workspace(&self) -> &dyn Workspace {
        self.workspace
    }

    fn user(&self) -> &HackleUser {
        self.user
    }
}

/// Any request the [crate::Evaluator] accepts.
#[derive(Clone)]
pub enum Request<'a> {
    Experiment(ExperimentRequest<'a>),
    RemoteConfig(RemoteConfigRequest<'a>),
    InAppMessageEligibility(InAppMessageEligibilityRequest<'a>),
    InAppMessageLayout(InAppMessageLayoutRequest<'a>),
}

impl<'a> Request<'a> {
    pub fn as_evaluator_request(&self) -> &dyn EvaluatorRequest {
        match self {
            Request::Experiment(request) => request,
            Request::RemoteConfig(request) => request,
            Request::InAppMessageEligibility(request) => request,
            Request::InAppMessageLayout(request) => request,
        }
    }
}

impl<'a> From<ExperimentRequest<'a>> for Request<'a> {
    fn from(request: ExperimentRequest<'a>) -> Self {
        Request::Experiment(request)
    }
}

impl<'a> From<RemoteConfigRequest<'a>> for Request<'a> {
    fn from(request: RemoteConfigRequest<'a>) -> Self {
        Request::RemoteConfig(request)
    }
}

impl<'a> From<InAppMessageEligibilityRequest<'a>> for Request<'a> {
    fn from(request: InAppMessageEligibilityRequest<'a>) -> Self {
        Request::InAppMessageEligibility(request)
    }
}

impl<'a> From<InAppMessageLayoutRequest<'a>> for Request<'a> {
    fn from(request: InAppMessageLayoutRequest<'a>) -> Self {
        Request::InAppMessageLayout(request)
    }
}
