use std::collections::HashMap;

use serde::Deserialize;

use crate::value::{Properties, Value};

/// Well-known identifier types. Experiments and parameters name the identifier type they bucket
/// by; any other string is a custom identifier type.
pub mod identifier_type {
    pub const ID: &str = "$id";
    pub const USER: &str = "$userId";
    pub const DEVICE: &str = "$deviceId";
    pub const SESSION: &str = "$sessionId";
}

/// A cohort the user has been computed to belong to.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Cohort(pub i64);

/// A daily event counter pre-aggregated outside the core.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TargetEventStat {
    /// Start of the UTC day the count belongs to, in epoch millis.
    pub date: i64,
    pub count: i64,
}

/// The single event property a [TargetEvent] counter is narrowed to.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TargetEventProperty {
    pub key: String,
    pub value: Value,
}

/// Per-day counts of one event, optionally narrowed to one property value.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TargetEvent {
    pub event_key: String,
    pub stats: Vec<TargetEventStat>,
    #[serde(default)]
    pub property: Option<TargetEventProperty>,
}

impl TargetEvent {
    /// Sum of the daily counts dated at or after `from_millis`.
    pub fn count_since(&self, from_millis: i64) -> i64 {
        self.stats
            .iter()
            .filter(|stat| stat.date >= from_millis)
            .map(|stat| stat.count)
            .sum()
    }
}

/// The user a decision is made for, as assembled by the host's user resolver.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct HackleUser {
    pub identifiers: HashMap<String, String>,
    pub properties: Properties,
    pub hackle_properties: Properties,
    pub cohorts: Vec<Cohort>,
    pub target_events: Vec<TargetEvent>,
}

impl HackleUser {
    /// Create a new [HackleUserBuilder].
    pub fn builder() -> HackleUserBuilder {
        HackleUserBuilder::default()
    }

    pub fn identifier(&self, identifier_type: &str) -> Option<&str> {
        self.identifiers.get(identifier_type).map(String::as_str)
    }

    pub fn has_identifier(&self, identifier_type: &str) -> bool {
        self.identifiers.contains_key(identifier_type)
    }
}

/// Builder for [HackleUser]. Blank identifiers are dropped, as a user without an identifier
/// of a type is the same as one with an empty identifier for bucketing purposes.
#[derive(Debug, Default)]
pub struct HackleUserBuilder {
    user: HackleUser,
}

impl HackleUserBuilder {
    pub fn identifier(
        &mut self,
        identifier_type: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        let value = value.into();
        if !value.trim().is_empty() {
            self.user.identifiers.insert(identifier_type.into(), value);
        }
        self
    }

    pub fn id(&mut self, id: impl Into<String>) -> &mut Self {
        self.identifier(identifier_type::ID, id)
    }

    pub fn user_id(&mut self, user_id: impl Into<String>) -> &mut Self {
        self.identifier(identifier_type::USER, user_id)
    }

    pub fn device_id(&mut self, device_id: impl Into<String>) -> &mut Self {
        self.identifier(identifier_type::DEVICE, device_id)
    }

    pub fn property(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.user.properties.insert(key.into(), value.into());
        self
    }

    pub fn hackle_property(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.user.hackle_properties.insert(key.into(), value.into());
        self
    }

    pub fn cohort(&mut self, cohort_id: i64) -> &mut Self {
        self.user.cohorts.push(Cohort(cohort_id));
        self
    }

    pub fn target_event(&mut self, target_event: TargetEvent) -> &mut Self {
        self.user.target_events.push(target_event);
        self
    }

    pub fn build(&self) -> HackleUser {
        self.user.clone()
    }
}

/// An event tracked by the host. Only consulted by event-triggered in-app message requests.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackedEvent {
    pub key: String,
    #[serde(default)]
    pub properties: Properties,
}

impl TrackedEvent {
    pub fn new(key: impl Into<String>) -> Self {
        TrackedEvent {
            key: key.into(),
            properties: Properties::new(),
        }
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}
