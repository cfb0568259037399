//! Active subscriptions.

use super::types::Subscription;
use crate::types::SubscriptionId;
use std::sync::Arc;

/// Active subscriptions in creation order.
///
/// Holds at most one subscription per `(provider_url, feed id)` pair; the
/// manager checks [`find`](Self::find) before every insert.
#[derive(Default)]
pub struct SubscriptionStore {
    subscriptions: Vec<Arc<Subscription>>,
}

impl SubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, subscription: Arc<Subscription>) {
        debug_assert!(self
            .find(subscription.provider_url(), &subscription.feed_id())
            .is_none());
        self.subscriptions.push(subscription);
    }

    pub fn remove(&mut self, id: &SubscriptionId) -> Option<Arc<Subscription>> {
        let index = self.subscriptions.iter().position(|s| s.id() == id)?;
        Some(self.subscriptions.remove(index))
    }

    pub fn get(&self, id: &SubscriptionId) -> Option<&Arc<Subscription>> {
        self.subscriptions.iter().find(|s| s.id() == id)
    }

    pub fn contains(&self, id: &SubscriptionId) -> bool {
        self.get(id).is_some()
    }

    /// The subscription for `feed_id` at `provider_url`, if any.
    pub fn find(&self, provider_url: &str, feed_id: &str) -> Option<&Arc<Subscription>> {
        self.subscriptions
            .iter()
            .find(|s| s.matches(provider_url, feed_id))
    }

    pub fn for_provider(&self, provider_url: &str) -> Vec<Arc<Subscription>> {
        self.subscriptions
            .iter()
            .filter(|s| s.provider_url() == provider_url)
            .cloned()
            .collect()
    }

    pub fn references_provider(&self, provider_url: &str) -> bool {
        self.subscriptions
            .iter()
            .any(|s| s.provider_url() == provider_url)
    }

    pub fn all(&self) -> &[Arc<Subscription>] {
        &self.subscriptions
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
