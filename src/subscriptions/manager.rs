//! The subscription manager façade.

use super::events::EventBus;
use super::registry::{ProviderRegistry, Upsert};
use super::store::SubscriptionStore;
use super::tracker::ErrorTracker;
use super::types::{EventHandle, ManagerEvent, Subscription, WatcherId};
use crate::error::{FeedError, Result, SubscriptionError};
use crate::poll::{CredentialIssuer, FeedTransport, PollEngine};
use crate::types::{
    ActionBatch, Feed, ListFeedsResponse, Provider, RequesterIdentity, SerializedPcd,
    SubscriptionId,
};
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Manager configuration.
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// Deadline for one `poll_subscriptions` round (None = wait for all).
    /// Default: 30s
    pub poll_timeout: Option<Duration>,

    /// Max cached credentials.
    /// Default: 64
    pub credential_cache_size: usize,

    /// Window within which an identical credential is reused
    /// (None = issue a new credential for every poll).
    pub credential_cache_window: Option<Duration>,

    /// Reject poll results containing actions the feed's permissions do
    /// not cover.
    /// Default: true
    pub enforce_folder_permissions: bool,

    /// Max buffered events per watcher before it is dropped.
    /// Default: 256
    pub event_buffer_size: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Some(Duration::from_secs(30)),
            credential_cache_size: 64,
            credential_cache_window: None,
            enforce_folder_permissions: true,
            event_buffer_size: 256,
        }
    }
}

/// Providers and subscriptions, mutated under one lock.
#[derive(Default)]
pub(super) struct ManagerState {
    pub(super) providers: ProviderRegistry,
    pub(super) subscriptions: SubscriptionStore,
}

/// Owns feed subscriptions and polls them.
///
/// Mutations of providers and subscriptions are serialized by a single lock;
/// polling reads a snapshot of the subscription list and runs without it.
pub struct SubscriptionManager {
    config: ManagerConfig,
    pub(super) state: RwLock<ManagerState>,
    errors: Arc<ErrorTracker>,
    engine: PollEngine,
    events: EventBus,
}

impl SubscriptionManager {
    /// Create a manager with default configuration.
    pub fn new(transport: Arc<dyn FeedTransport>, issuer: Arc<dyn CredentialIssuer>) -> Self {
        Self::with_config(transport, issuer, ManagerConfig::default())
    }

    pub fn with_config(
        transport: Arc<dyn FeedTransport>,
        issuer: Arc<dyn CredentialIssuer>,
        config: ManagerConfig,
    ) -> Self {
        let errors = Arc::new(ErrorTracker::new());
        let engine = PollEngine::new(transport, issuer, Arc::clone(&errors), &config);
        let events = EventBus::new(config.event_buffer_size);

        Self {
            config,
            state: RwLock::new(ManagerState::default()),
            errors,
            engine,
            events,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    // --- Providers ---

    /// Register a provider, or rename it if already known.
    pub fn add_provider(&self, provider_url: &str, provider_name: &str) {
        let outcome = self.state.write().providers.upsert(provider_url, provider_name);

        match outcome {
            Upsert::Added => {
                debug!(provider_url, "provider added");
                self.events.broadcast(ManagerEvent::ProviderAdded {
                    provider_url: provider_url.to_string(),
                });
            }
            Upsert::Renamed => {
                self.events.broadcast(ManagerEvent::ProviderRenamed {
                    provider_url: provider_url.to_string(),
                    provider_name: provider_name.to_string(),
                });
            }
            Upsert::Unchanged => {}
        }
    }

    /// Remove a provider no subscription refers to.
    pub fn remove_provider(&self, provider_url: &str) -> Result<Provider> {
        let removed = {
            let mut state = self.state.write();
            if !state.providers.contains(provider_url) {
                return Err(FeedError::ProviderNotFound(provider_url.to_string()));
            }
            if state.subscriptions.references_provider(provider_url) {
                return Err(FeedError::InvalidOperation(format!(
                    "provider {} still has active subscriptions",
                    provider_url
                )));
            }
            state
                .providers
                .remove(provider_url)
                .ok_or_else(|| FeedError::ProviderNotFound(provider_url.to_string()))?
        };

        debug!(provider_url, "provider removed");
        self.events.broadcast(ManagerEvent::ProviderRemoved {
            provider_url: provider_url.to_string(),
        });
        Ok(removed)
    }

    pub fn get_providers(&self) -> Vec<Provider> {
        self.state.read().providers.all().to_vec()
    }

    pub fn get_provider(&self, provider_url: &str) -> Option<Provider> {
        self.state.read().providers.get(provider_url).cloned()
    }

    pub fn has_provider(&self, provider_url: &str) -> bool {
        self.state.read().providers.contains(provider_url)
    }

    // --- Subscriptions ---

    /// Subscribe to `feed` at `provider_url`.
    ///
    /// If a subscription for the same provider and feed id exists, this
    /// fails with [`FeedError::AlreadySubscribed`] unless `force` is set, in
    /// which case the existing subscription's feed is replaced and the same
    /// handle is returned. Unknown providers are registered under their URL.
    pub fn subscribe(
        &self,
        provider_url: &str,
        feed: Feed,
        credential: Option<SerializedPcd>,
        force: bool,
    ) -> Result<Arc<Subscription>> {
        let mut events = Vec::new();

        let subscription = {
            let mut state = self.state.write();

            if let Some(existing) = state.subscriptions.find(provider_url, &feed.id) {
                if !force {
                    return Err(FeedError::AlreadySubscribed {
                        provider_url: provider_url.to_string(),
                        feed_id: feed.id,
                    });
                }

                existing.replace_feed(feed);
                events.push(ManagerEvent::SubscriptionUpdated {
                    subscription_id: existing.id().clone(),
                });
                Arc::clone(existing)
            } else {
                if state.providers.upsert_if_absent(provider_url) {
                    events.push(ManagerEvent::ProviderAdded {
                        provider_url: provider_url.to_string(),
                    });
                }

                let subscription = Arc::new(Subscription::new(provider_url, feed, credential));
                state.subscriptions.insert(Arc::clone(&subscription));
                events.push(ManagerEvent::Subscribed {
                    subscription_id: subscription.id().clone(),
                });
                subscription
            }
        };

        info!(
            subscription_id = %subscription.id(),
            provider_url,
            feed_id = %subscription.feed_id(),
            "subscribed"
        );
        for event in events {
            self.events.broadcast(event);
        }
        Ok(subscription)
    }

    /// Remove a subscription, and its provider if it was the last one.
    pub fn unsubscribe(&self, id: &SubscriptionId) -> Result<Arc<Subscription>> {
        let mut events = Vec::new();

        let removed = {
            let mut state = self.state.write();
            let removed = state
                .subscriptions
                .remove(id)
                .ok_or_else(|| FeedError::SubscriptionNotFound(id.clone()))?;

            events.push(ManagerEvent::Unsubscribed {
                subscription_id: id.clone(),
            });

            let provider_url = removed.provider_url();
            if !state.subscriptions.references_provider(provider_url)
                && state.providers.remove(provider_url).is_some()
            {
                events.push(ManagerEvent::ProviderRemoved {
                    provider_url: provider_url.to_string(),
                });
            }
            removed
        };

        self.errors.clear(id);
        info!(subscription_id = %id, "unsubscribed");
        for event in events {
            self.events.broadcast(event);
        }
        Ok(removed)
    }

    pub fn get_active_subscriptions(&self) -> Vec<Arc<Subscription>> {
        self.state.read().subscriptions.all().to_vec()
    }

    pub fn get_subscription(&self, id: &SubscriptionId) -> Option<Arc<Subscription>> {
        self.state.read().subscriptions.get(id).cloned()
    }

    pub fn has_subscription(&self, id: &SubscriptionId) -> bool {
        self.state.read().subscriptions.contains(id)
    }

    /// The subscription for `feed_id` at `provider_url`, if any.
    pub fn find_subscription(&self, provider_url: &str, feed_id: &str) -> Option<Arc<Subscription>> {
        self.state
            .read()
            .subscriptions
            .find(provider_url, feed_id)
            .cloned()
    }

    pub fn get_subscriptions_for_provider(&self, provider_url: &str) -> Vec<Arc<Subscription>> {
        self.state.read().subscriptions.for_provider(provider_url)
    }

    /// Active subscriptions grouped by provider URL.
    pub fn get_subscriptions_by_provider(&self) -> BTreeMap<String, Vec<Arc<Subscription>>> {
        let state = self.state.read();
        let mut grouped: BTreeMap<String, Vec<Arc<Subscription>>> = BTreeMap::new();
        for subscription in state.subscriptions.all() {
            grouped
                .entry(subscription.provider_url().to_string())
                .or_default()
                .push(Arc::clone(subscription));
        }
        grouped
    }

    // --- Network ---

    /// Ask a provider which feeds it offers.
    pub async fn list_feeds(&self, provider_url: &str) -> Result<ListFeedsResponse> {
        Ok(self.engine.list_feeds(provider_url).await?)
    }

    /// Poll every active subscription concurrently.
    ///
    /// Returns the batches of the polls that succeeded. Failures are
    /// recorded per subscription and can be read with
    /// [`get_error`](Self::get_error).
    pub async fn poll_subscriptions(&self, identity: &RequesterIdentity) -> Vec<ActionBatch> {
        self.poll_subscriptions_with_cancel(identity, &CancellationToken::new())
            .await
    }

    /// Like [`poll_subscriptions`](Self::poll_subscriptions), but stops
    /// waiting when `cancel` fires or the configured poll timeout passes.
    /// Subscriptions still outstanding at that point get a
    /// [`Timeout`](crate::error::SubscriptionErrorKind::Timeout) error.
    pub async fn poll_subscriptions_with_cancel(
        &self,
        identity: &RequesterIdentity,
        cancel: &CancellationToken,
    ) -> Vec<ActionBatch> {
        let subscriptions = self.get_active_subscriptions();
        let mut outstanding: HashSet<SubscriptionId> =
            subscriptions.iter().map(|s| s.id().clone()).collect();

        let mut polls: FuturesUnordered<_> = subscriptions
            .iter()
            .map(|subscription| async move {
                let result = self.engine.poll(subscription, identity).await;
                (subscription.id().clone(), result)
            })
            .collect();

        let deadline = self.config.poll_timeout;
        let expired = async move {
            match deadline {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expired);

        let mut batches = Vec::new();
        loop {
            tokio::select! {
                biased;
                next = polls.next() => match next {
                    Some((id, result)) => {
                        outstanding.remove(&id);
                        self.emit_poll_outcome(&id, &result);
                        if let Ok(batch) = result {
                            batches.push(batch);
                        }
                    }
                    None => break,
                },
                _ = cancel.cancelled() => {
                    debug!(outstanding = outstanding.len(), "poll round cancelled");
                    break;
                }
                _ = &mut expired => {
                    warn!(outstanding = outstanding.len(), "poll round timed out");
                    break;
                }
            }
        }
        drop(polls);

        for id in outstanding {
            let error = SubscriptionError::timeout();
            self.errors.record(&id, error.clone());
            self.emit_poll_outcome(&id, &Err(error));
        }
        self.prune_errors();

        batches
    }

    /// Poll one subscription, recording the outcome.
    pub async fn poll_single_subscription(
        &self,
        subscription: &Subscription,
        identity: &RequesterIdentity,
    ) -> std::result::Result<ActionBatch, SubscriptionError> {
        let result = self.engine.poll(subscription, identity).await;
        self.emit_poll_outcome(subscription.id(), &result);
        self.prune_errors();
        result
    }

    fn emit_poll_outcome(
        &self,
        id: &SubscriptionId,
        result: &std::result::Result<ActionBatch, SubscriptionError>,
    ) {
        let event = match result {
            Ok(batch) => ManagerEvent::PollSucceeded {
                subscription_id: id.clone(),
                actions: batch.actions.len(),
            },
            Err(error) => ManagerEvent::PollFailed {
                subscription_id: id.clone(),
                kind: error.kind,
            },
        };
        self.events.broadcast(event);
    }

    /// Drop errors recorded for subscriptions that no longer exist, e.g.
    /// when an unsubscribe raced a poll.
    fn prune_errors(&self) {
        let state = self.state.read();
        self.errors.retain(|id| state.subscriptions.contains(id));
    }

    /// Forget cached credentials, forcing new ones on the next poll.
    pub fn clear_credentials(&self) {
        self.engine.clear_credentials();
    }

    // --- Errors ---

    /// Last poll failure of `id`, cleared by its next successful poll.
    pub fn get_error(&self, id: &SubscriptionId) -> Option<SubscriptionError> {
        self.errors.get(id)
    }

    pub fn get_all_errors(&self) -> HashMap<SubscriptionId, SubscriptionError> {
        self.errors.all()
    }

    pub fn reset_errors(&self) {
        self.errors.reset();
    }

    // --- Events ---

    /// Receive change notifications.
    pub fn watch(&self) -> EventHandle {
        self.events.watch()
    }

    pub fn unwatch(&self, id: WatcherId) {
        self.events.unwatch(id);
    }
}
