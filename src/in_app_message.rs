use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::target::Target;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlatformType {
    Android,
    Ios,
    Web,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InAppMessageStatus {
    Draft,
    Active,
    Pause,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InAppMessagePeriod {
    Always,
    #[serde(rename_all = "camelCase")]
    Custom {
        #[serde(with = "chrono::serde::ts_milliseconds")]
        start_millis_inclusive: DateTime<Utc>,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        end_millis_exclusive: DateTime<Utc>,
    },
}

impl InAppMessagePeriod {
    pub fn within(&self, timestamp: DateTime<Utc>) -> bool {
        match self {
            InAppMessagePeriod::Always => true,
            InAppMessagePeriod::Custom {
                start_millis_inclusive,
                end_millis_exclusive,
            } => *start_millis_inclusive <= timestamp && timestamp < *end_millis_exclusive,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventTriggerRule {
    pub event_key: String,
    #[serde(default)]
    pub targets: Vec<Target>,
}

/// Caps on how often a message may be shown, judged against its recorded impressions.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FrequencyCap {
    #[serde(default)]
    pub identifier_caps: Vec<IdentifierCap>,
    #[serde(default)]
    pub duration_cap: Option<DurationCap>,
}

/// Capped once `count` impressions were made for the same identifier of `identifier_type`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierCap {
    pub identifier_type: String,
    pub count: i32,
}

/// Capped once `count` impressions were made within the last `duration_millis`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DurationCap {
    pub duration_millis: i64,
    pub count: i32,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventTrigger {
    pub rules: Vec<EventTriggerRule>,
    #[serde(default)]
    pub frequency_cap: Option<FrequencyCap>,
}

/// Identifiers that always see the message, regardless of its targeting.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserOverride {
    pub identifier_type: String,
    pub identifiers: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct TargetContext {
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub overrides: Vec<UserOverride>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageLayout {
    pub display_type: String,
    pub layout_type: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MessageText {
    pub title: String,
    pub body: String,
}

/// One localized rendition of a message.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Message {
    pub lang: String,
    pub layout: MessageLayout,
    #[serde(default)]
    pub text: Option<MessageText>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageContext {
    pub default_lang: String,
    pub platform_types: Vec<PlatformType>,
    pub messages: Vec<Message>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InAppMessage {
    pub id: i64,
    pub key: i64,
    pub status: InAppMessageStatus,
    pub period: InAppMessagePeriod,
    pub event_trigger: EventTrigger,
    #[serde(default)]
    pub target_context: TargetContext,
    pub message_context: MessageContext,
}

impl InAppMessage {
    pub fn supports(&self, platform: PlatformType) -> bool {
        self.message_context.platform_types.contains(&platform)
    }

    pub fn message(&self, lang: &str) -> Option<&Message> {
        self.message_context
            .messages
            .iter()
            .find(|message| message.lang == lang)
    }
}

/// A recorded display of a message, with the identifiers the user had at the time.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InAppMessageImpression {
    pub identifiers: HashMap<String, String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}
