use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::experiment::{Experiment, Variation};
use crate::in_app_message::{InAppMessage, InAppMessageImpression};
use crate::user::HackleUser;

/// Variations forced for individual users from outside the workspace, such as a debug panel.
pub trait ManualOverrideStorage: Send + Sync {
    /// The variation `user` is forced into for `experiment`, if any.
    fn get<'e>(&self, experiment: &'e Experiment, user: &HackleUser) -> Option<&'e Variation>;
}

/// Consults each storage in turn and returns the first override found.
#[derive(Clone, Default)]
pub struct DelegatingManualOverrideStorage {
    storages: Vec<Arc<dyn ManualOverrideStorage>>,
}

impl DelegatingManualOverrideStorage {
    pub fn new(storages: Vec<Arc<dyn ManualOverrideStorage>>) -> Self {
        DelegatingManualOverrideStorage { storages }
    }
}

impl ManualOverrideStorage for DelegatingManualOverrideStorage {
    fn get<'e>(&self, experiment: &'e Experiment, user: &HackleUser) -> Option<&'e Variation> {
        self.storages
            .iter()
            .find_map(|storage| storage.get(experiment, user))
    }
}

/// Overrides keyed by experiment id and the user's identifier of the experiment's identifier
/// type.
#[derive(Debug, Default)]
pub struct InMemoryManualOverrideStorage {
    overrides: RwLock<HashMap<(i64, String), i64>>,
}

impl InMemoryManualOverrideStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force `identifier` into `variation_id` for `experiment_id`.
    pub fn set(&self, experiment_id: i64, identifier: impl Into<String>, variation_id: i64) {
        if let Ok(mut overrides) = self.overrides.write() {
            overrides.insert((experiment_id, identifier.into()), variation_id);
        }
    }

    pub fn remove(&self, experiment_id: i64, identifier: &str) {
        if let Ok(mut overrides) = self.overrides.write() {
            overrides.remove(&(experiment_id, identifier.to_string()));
        }
    }
}

impl ManualOverrideStorage for InMemoryManualOverrideStorage {
    fn get<'e>(&self, experiment: &'e Experiment, user: &HackleUser) -> Option<&'e Variation> {
        let identifier = user.identifier(&experiment.identifier_type)?;
        let variation_id = {
            let overrides = self.overrides.read().ok()?;
            *overrides.get(&(experiment.id, identifier.to_string()))?
        };
        experiment.variation(variation_id)
    }
}

/// Remembers in-app messages the user asked not to see again until a point in time.
pub trait InAppMessageHiddenStorage: Send + Sync {
    /// Whether `in_app_message` is still hidden at `now`.
    fn exists(&self, in_app_message: &InAppMessage, now: DateTime<Utc>) -> bool;

    /// Hide `in_app_message` until `expire_at`.
    fn put(&self, in_app_message: &InAppMessage, expire_at: DateTime<Utc>);
}

#[derive(Debug, Default)]
pub struct InMemoryHiddenStorage {
    expirations: RwLock<HashMap<i64, DateTime<Utc>>>,
}

impl InMemoryHiddenStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InAppMessageHiddenStorage for InMemoryHiddenStorage {
    fn exists(&self, in_app_message: &InAppMessage, now: DateTime<Utc>) -> bool {
        match self.expirations.read() {
            Ok(expirations) => expirations
                .get(&in_app_message.id)
                .map_or(false, |expire_at| now < *expire_at),
            Err(_) => false,
        }
    }

    fn put(&self, in_app_message: &InAppMessage, expire_at: DateTime<Utc>) {
        if let Ok(mut expirations) = self.expirations.write() {
            expirations.insert(in_app_message.id, expire_at);
        }
    }
}

/// The display history of each in-app message, consulted by frequency caps.
pub trait InAppMessageImpressionStorage: Send + Sync {
    fn get(&self, in_app_message: &InAppMessage) -> Vec<InAppMessageImpression>;

    fn set(&self, in_app_message: &InAppMessage, impressions: Vec<InAppMessageImpression>);
}

#[derive(Debug, Default)]
pub struct InMemoryImpressionStorage {
    impressions: RwLock<HashMap<i64, Vec<InAppMessageImpression>>>,
}

impl InMemoryImpressionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InAppMessageImpressionStorage for InMemoryImpressionStorage {
    fn get(&self, in_app_message: &InAppMessage) -> Vec<InAppMessageImpression> {
        match self.impressions.read() {
            Ok(impressions) => impressions
                .get(&in_app_message.id)
                .cloned()
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    fn set(&self, in_app_message: &InAppMessage, impressions: Vec<InAppMessageImpression>) {
        if let Ok(mut stored) = self.impressions.write() {
            stored.insert(in_app_message.id, impressions);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_common::{in_app_message, running_ab_test};
    use chrono::Duration;
    use maplit::hashmap;
    use spectral::prelude::*;

    #[test]
    fn in_memory_override_is_keyed_by_experiment_identifier() {
        let experiment = running_ab_test();
        let storage = InMemoryManualOverrideStorage::new();
        storage.set(experiment.id, "user_01", 42);

        let user_01 = HackleUser::builder().id("user_01").build();
        let user_02 = HackleUser::builder().id("user_02").build();
        let other_type = HackleUser::builder().user_id("user_01").build();

        assert_that!(storage.get(&experiment, &user_01).map(|v| v.id)).contains_value(42);
        assert_that!(storage.get(&experiment, &user_02)).is_none();
        assert_that!(storage.get(&experiment, &other_type)).is_none();

        storage.remove(experiment.id, "user_01");
        assert_that!(storage.get(&experiment, &user_01)).is_none();
    }

    #[test]
    fn delegating_override_returns_first_found() {
        let experiment = running_ab_test();
        let first = Arc::new(InMemoryManualOverrideStorage::new());
        let second = Arc::new(InMemoryManualOverrideStorage::new());
        second.set(experiment.id, "user_01", 42);

        let storages: Vec<Arc<dyn ManualOverrideStorage>> = vec![first.clone(), second];
        let storage = DelegatingManualOverrideStorage::new(storages);
        let user = HackleUser::builder().id("user_01").build();
        assert_that!(storage.get(&experiment, &user).map(|v| v.id)).contains_value(42);

        first.set(experiment.id, "user_01", 41);
        assert_that!(storage.get(&experiment, &user).map(|v| v.id)).contains_value(41);
    }

    #[test]
    fn hidden_until_expiry() {
        let message = in_app_message();
        let storage = InMemoryHiddenStorage::new();
        let now = Utc::now();
        assert!(!storage.exists(&message, now));

        storage.put(&message, now + Duration::hours(1));
        assert!(storage.exists(&message, now));
        assert!(!storage.exists(&message, now + Duration::hours(1)));
    }

    #[test]
    fn impressions_are_stored_per_message() {
        let message = in_app_message();
        let storage = InMemoryImpressionStorage::new();
        assert_that!(storage.get(&message)).is_empty();

        let impression = InAppMessageImpression {
            identifiers: hashmap! {"$id".to_string() => "user_01".to_string()},
            timestamp: Utc::now(),
        };
        storage.set(&message, vec![impression.clone()]);
        assert_eq!(storage.get(&message), vec![impression]);
    }
}
