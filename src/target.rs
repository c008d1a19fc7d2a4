use serde::Deserialize;

use crate::value::{Value, ValueType};

/// A target matches when all of its conditions do.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Target {
    pub conditions: Vec<Condition>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Condition {
    pub key: TargetKey,
    #[serde(rename = "match")]
    pub target_match: TargetMatch,
}

/// What a condition looks at. The meaning of `name` depends on `key_type`: a property name, an
/// identifier type, an experiment key, or a JSON-encoded event-count window.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TargetKey {
    #[serde(rename = "type")]
    pub key_type: KeyType,
    pub name: String,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyType {
    UserId,
    UserProperty,
    HackleProperty,
    EventProperty,
    Segment,
    AbTest,
    FeatureFlag,
    Cohort,
    NumberOfEventsInDays,
    NumberOfEventsWithPropertyInDays,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TargetMatch {
    #[serde(rename = "type")]
    pub match_type: MatchType,
    pub operator: MatchOperator,
    pub value_type: ValueType,
    pub values: Vec<Value>,
}

/// Polarity of a match. NOT_MATCH inverts the final outcome of a condition.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    Match,
    NotMatch,
}

impl MatchType {
    pub fn matches(self, is_matched: bool) -> bool {
        match self {
            MatchType::Match => is_matched,
            MatchType::NotMatch => !is_matched,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchOperator {
    In,
    Contains,
    StartsWith,
    EndsWith,
    Gt,
    Gte,
    Lt,
    Lte,
    Exists,
}

impl Target {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Target { conditions }
    }
}

impl Condition {
    pub fn new(key_type: KeyType, name: impl Into<String>, target_match: TargetMatch) -> Self {
        Condition {
            key: TargetKey {
                key_type,
                name: name.into(),
            },
            target_match,
        }
    }
}

impl TargetMatch {
    pub fn new(
        match_type: MatchType,
        operator: MatchOperator,
        value_type: ValueType,
        values: Vec<Value>,
    ) -> Self {
        TargetMatch {
            match_type,
            operator,
            value_type,
            values,
        }
    }

    /// Shorthand for a positive IN match.
    pub fn is_in(value_type: ValueType, values: Vec<Value>) -> Self {
        TargetMatch::new(MatchType::Match, MatchOperator::In, value_type, values)
    }
}
