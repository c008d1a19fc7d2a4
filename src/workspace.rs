use crate::bucket::Bucket;
use crate::container::Container;
use crate::experiment::Experiment;
use crate::in_app_message::InAppMessage;
use crate::remote_config::{ParameterConfiguration, RemoteConfigParameter};
use crate::segment::Segment;

/// Workspace is an interface for the immutable configuration snapshot the evaluator decides
/// against.
///
/// The snapshot is fetched, parsed and swapped by the host; the evaluator only ever reads it, so
/// implementations that are shared between threads need nothing beyond `Sync`.
pub trait Workspace {
    /// Retrieve the A/B test with key `experiment_key`.
    fn experiment(&self, experiment_key: i64) -> Option<&Experiment>;

    /// Retrieve the feature flag with key `feature_key`.
    fn feature_flag(&self, feature_key: i64) -> Option<&Experiment>;

    /// Retrieve the segment with key `segment_key`.
    fn segment(&self, segment_key: &str) -> Option<&Segment>;

    /// Retrieve the bucket with id `bucket_id`.
    fn bucket(&self, bucket_id: i64) -> Option<&Bucket>;

    /// Retrieve the container with id `container_id`.
    fn container(&self, container_id: i64) -> Option<&Container>;

    /// Retrieve the parameter configuration with id `parameter_configuration_id`.
    fn parameter_configuration(
        &self,
        parameter_configuration_id: i64,
    ) -> Option<&ParameterConfiguration>;

    /// Retrieve the remote config parameter with key `parameter_key`.
    fn remote_config_parameter(&self, parameter_key: &str) -> Option<&RemoteConfigParameter>;

    /// Retrieve the in-app message with key `in_app_message_key`.
    fn in_app_message(&self, in_app_message_key: i64) -> Option<&InAppMessage>;
}
