//! Last poll failure per subscription.

use crate::error::SubscriptionError;
use crate::types::SubscriptionId;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Records the most recent poll failure of each subscription.
///
/// Writers are serialized by the lock; readers get copies.
#[derive(Default)]
pub struct ErrorTracker {
    errors: RwLock<HashMap<SubscriptionId, SubscriptionError>>,
}

impl ErrorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the recorded error of `id`.
    pub fn record(&self, id: &SubscriptionId, error: SubscriptionError) {
        self.errors.write().insert(id.clone(), error);
    }

    /// Forget the error of `id`, returning it.
    pub fn clear(&self, id: &SubscriptionId) -> Option<SubscriptionError> {
        self.errors.write().remove(id)
    }

    pub fn get(&self, id: &SubscriptionId) -> Option<SubscriptionError> {
        self.errors.read().get(id).cloned()
    }

    pub fn all(&self) -> HashMap<SubscriptionId, SubscriptionError> {
        self.errors.read().clone()
    }

    pub fn reset(&self) {
        self.errors.write().clear();
    }

    /// Keep only errors whose id satisfies `keep`.
    pub fn retain(&self, mut keep: impl FnMut(&SubscriptionId) -> bool) {
        self.errors.write().retain(|id, _| keep(id));
    }

    pub fn len(&self) -> usize {
        self.errors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.read().is_empty()
    }
}
