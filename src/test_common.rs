#![cfg(test)]

use std::collections::HashMap;

use serde::de::DeserializeOwned;

use crate::bucket::Bucket;
use crate::container::Container;
use crate::experiment::Experiment;
use crate::in_app_message::InAppMessage;
use crate::remote_config::{ParameterConfiguration, RemoteConfigParameter};
use crate::segment::Segment;
use crate::workspace::Workspace;

pub fn parse<T: DeserializeOwned>(json: &str) -> T {
    serde_json::from_str(json).expect("should parse")
}

#[derive(Default)]
pub struct TestWorkspace {
    experiments: HashMap<i64, Experiment>,
    feature_flags: HashMap<i64, Experiment>,
    segments: HashMap<String, Segment>,
    buckets: HashMap<i64, Bucket>,
    containers: HashMap<i64, Container>,
    parameter_configurations: HashMap<i64, ParameterConfiguration>,
    remote_config_parameters: HashMap<String, RemoteConfigParameter>,
    in_app_messages: HashMap<i64, InAppMessage>,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_experiment(mut self, experiment: Experiment) -> Self {
        self.experiments.insert(experiment.key, experiment);
        self
    }

    pub fn with_feature_flag(mut self, feature_flag: Experiment) -> Self {
        self.feature_flags.insert(feature_flag.key, feature_flag);
        self
    }

    pub fn with_segment(mut self, segment: Segment) -> Self {
        self.segments.insert(segment.key.clone(), segment);
        self
    }

    pub fn with_bucket(mut self, bucket: Bucket) -> Self {
        self.buckets.insert(bucket.id, bucket);
        self
    }

    pub fn with_container(mut self, container: Container) -> Self {
        self.containers.insert(container.id, container);
        self
    }

    pub fn with_parameter_configuration(mut self, configuration: ParameterConfiguration) -> Self {
        self.parameter_configurations
            .insert(configuration.id, configuration);
        self
    }

    pub fn with_remote_config_parameter(mut self, parameter: RemoteConfigParameter) -> Self {
        self.remote_config_parameters
            .insert(parameter.key.clone(), parameter);
        self
    }

    pub fn with_in_app_message(mut self, in_app_message: InAppMessage) -> Self {
        self.in_app_messages.insert(in_app_message.key, in_app_message);
        self
    }
}

impl Workspace for TestWorkspace {
    fn experiment(&self, experiment_key: i64) -> Option<&Experiment> {
        self.experiments.get(&experiment_key)
    }

    fn feature_flag(&self, feature_key: i64) -> Option<&Experiment> {
        self.feature_flags.get(&feature_key)
    }

    fn segment(&self, segment_key: &str) -> Option<&Segment> {
        self.segments.get(segment_key)
    }

    fn bucket(&self, bucket_id: i64) -> Option<&Bucket> {
        self.buckets.get(&bucket_id)
    }

    fn container(&self, container_id: i64) -> Option<&Container> {
        self.containers.get(&container_id)
    }

    fn parameter_configuration(
        &self,
        parameter_configuration_id: i64,
    ) -> Option<&ParameterConfiguration> {
        self.parameter_configurations
            .get(&parameter_configuration_id)
    }

    fn remote_config_parameter(&self, parameter_key: &str) -> Option<&RemoteConfigParameter> {
        self.remote_config_parameters.get(parameter_key)
    }

    fn in_app_message(&self, in_app_message_key: i64) -> Option<&InAppMessage> {
        self.in_app_messages.get(&in_app_message_key)
    }
}

/// A running A/B test (id 1, key 10) bucketing `$id` through [bucket_5].
pub fn running_ab_test() -> Experiment {
    parse(
        r#"{
            "id": 1,
            "key": 10,
            "type": "AB_TEST",
            "identifierType": "$id",
            "status": "RUNNING",
            "variations": [
                {"id": 41, "key": "A"},
                {"id": 42, "key": "B"}
            ],
            "defaultRule": {"type": "BUCKET", "bucketId": 5}
        }"#,
    )
}

/// A running feature flag (id 2, key 20) whose default rule goes through [bucket_5].
pub fn feature_flag() -> Experiment {
    parse(
        r#"{
            "id": 2,
            "key": 20,
            "type": "FEATURE_FLAG",
            "identifierType": "$id",
            "status": "RUNNING",
            "variations": [
                {"id": 41, "key": "A"},
                {"id": 42, "key": "B"}
            ],
            "defaultRule": {"type": "BUCKET", "bucketId": 5}
        }"#,
    )
}

// user_01 → slot 740 (A), user_02 → slot 5978 (B)
pub fn bucket_5() -> Bucket {
    parse(
        r#"{
            "id": 5,
            "seed": 1,
            "slotSize": 10000,
            "slots": [
                {"startInclusive": 0, "endExclusive": 5000, "variationId": 41},
                {"startInclusive": 5000, "endExclusive": 10000, "variationId": 42}
            ]
        }"#,
    )
}

/// A segment containing exactly the user whose `$id` is `id`.
pub fn user_id_segment(key: &str, id: &str) -> Segment {
    parse(&format!(
        r#"{{
            "id": 1,
            "key": "{}",
            "type": "USER_ID",
            "targets": [{{
                "conditions": [{{
                    "key": {{"type": "USER_ID", "name": "$id"}},
                    "match": {{"type": "MATCH", "operator": "IN", "valueType": "STRING", "values": ["{}"]}}
                }}]
            }}]
        }}"#,
        key, id
    ))
}

/// An active, untargeted message shown on mobile and triggered by any `purchase` event.
pub fn in_app_message() -> InAppMessage {
    parse(
        r#"{
            "id": 1,
            "key": 100,
            "status": "ACTIVE",
            "period": {"type": "ALWAYS"},
            "eventTrigger": {
                "rules": [{"eventKey": "purchase"}]
            },
            "messageContext": {
                "defaultLang": "ko",
                "platformTypes": ["ANDROID", "IOS"],
                "messages": [{
                    "lang": "ko",
                    "layout": {"displayType": "MODAL", "layoutType": "IMAGE_ONLY"},
                    "text": {"title": "환영합니다", "body": "첫 구매 할인"}
                }]
            }
        }"#,
    )
}
