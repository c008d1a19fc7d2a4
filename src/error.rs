/// Error is raised when an evaluation cannot be completed because the workspace or the request
/// graph is inconsistent.
///
/// Recoverable absence (a missing identifier, no matching rule, an uncapped message, ...) is never
/// an error; it is reported through the [crate::DecisionReason] of the returned evaluation.
/// Callers are expected to treat any of these as a reason to fall back to their own default.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    /// An entity was reached again while it was still being evaluated higher up in the call.
    #[error("circular evaluation has occurred [{chain}]")]
    CircularEvaluation {
        /// The chain of entities being evaluated, outermost first.
        chain: String,
    },

    /// A bucket referenced by an action, container or rule does not exist in the workspace.
    #[error("bucket [{0}] not found")]
    BucketNotFound(i64),

    /// The container an experiment belongs to does not exist in the workspace.
    #[error("container [{0}] not found")]
    ContainerNotFound(i64),

    /// A container bucket slot pointed at a group the container does not have.
    #[error("container group [{0}] not found")]
    ContainerGroupNotFound(i64),

    /// A segment condition referenced a segment that does not exist in the workspace.
    #[error("segment [{0}] not found")]
    SegmentNotFound(String),

    /// An action resolved to a variation the experiment does not have.
    #[error("variation [{variation_id}] not found in experiment [{experiment_id}]")]
    VariationNotFound {
        /// Id of the experiment being evaluated.
        experiment_id: i64,
        /// The dangling variation id.
        variation_id: i64,
    },

    /// A completed experiment has no resolvable winner variation.
    #[error("winner variation not found in completed experiment [{0}]")]
    WinnerVariationNotFound(i64),

    /// A feature flag rule that must decide a variation failed to do so.
    #[error("feature flag [{0}] must decide a variation")]
    UndecidedVariation(i64),

    /// A variation referenced a parameter configuration that does not exist in the workspace.
    #[error("parameter configuration [{0}] not found")]
    ParameterConfigurationNotFound(i64),

    /// An in-app message has no message for its own default language.
    #[error("in-app message [{in_app_message_id}] has no message for lang [{lang}]")]
    LayoutNotFound {
        /// Id of the in-app message being evaluated.
        in_app_message_id: i64,
        /// The default language that could not be resolved.
        lang: String,
    },

    /// A flow stage was reached with an entity whose status or kind it does not handle.
    #[error("{stage}: {detail}")]
    UnexpectedFlow {
        /// Name of the stage that rejected the request.
        stage: &'static str,
        /// What was wrong with the request.
        detail: String,
    },

    /// A targeting condition cannot be evaluated for this request.
    #[error("invalid condition: {0}")]
    InvalidCondition(String),
}

/// Result type used throughout the evaluation core.
pub type Result<T> = std::result::Result<T, Error>;
