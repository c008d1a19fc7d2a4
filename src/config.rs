use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::in_app_message::PlatformType;

const DEFAULT_MAX_EVENT_WINDOW_DAYS: u32 = 30;

/// Settings of the host the evaluator runs in.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluatorConfig {
    /// Platform in-app messages must support to be shown.
    pub platform: PlatformType,
    /// Largest window, in days, an event-count condition may look back over.
    pub max_event_window_days: u32,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        EvaluatorConfig {
            platform: PlatformType::Android,
            max_event_window_days: DEFAULT_MAX_EVENT_WINDOW_DAYS,
        }
    }
}

/// Source of the current time for time-windowed conditions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock stopped at one instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
