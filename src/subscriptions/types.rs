//! Subscription records and manager events.

use crate::error::SubscriptionErrorKind;
use crate::types::{Feed, SerializedPcd, SubscriptionId, Timestamp};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Binds a provider and one of its feeds to polling state.
///
/// Managers hand out `Arc<Subscription>`. A forced re-subscription swaps the
/// feed in place, so every holder of the handle sees the refreshed feed.
/// Everything else is fixed at creation.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    provider_url: String,
    feed: RwLock<Feed>,
    credential: Option<SerializedPcd>,
    subscribed_timestamp: Timestamp,
}

impl Subscription {
    /// Create a subscription with a fresh id, stamped now.
    pub fn new(
        provider_url: impl Into<String>,
        feed: Feed,
        credential: Option<SerializedPcd>,
    ) -> Self {
        Self {
            id: SubscriptionId::generate(),
            provider_url: provider_url.into(),
            feed: RwLock::new(feed),
            credential,
            subscribed_timestamp: Timestamp::now(),
        }
    }

    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    pub fn provider_url(&self) -> &str {
        &self.provider_url
    }

    /// Copy of the current feed snapshot.
    pub fn feed(&self) -> Feed {
        self.feed.read().clone()
    }

    pub fn feed_id(&self) -> String {
        self.feed.read().id.clone()
    }

    /// PCD embedded into every credential built for this subscription.
    pub fn credential(&self) -> Option<&SerializedPcd> {
        self.credential.as_ref()
    }

    pub fn subscribed_timestamp(&self) -> Timestamp {
        self.subscribed_timestamp
    }

    pub(crate) fn replace_feed(&self, feed: Feed) {
        *self.feed.write() = feed;
    }

    /// Whether this subscription is for `feed_id` at `provider_url`.
    pub fn matches(&self, provider_url: &str, feed_id: &str) -> bool {
        self.provider_url == provider_url && self.feed.read().id == feed_id
    }

    /// Plain value copy, as persisted.
    pub fn to_record(&self) -> SubscriptionRecord {
        SubscriptionRecord {
            id: self.id.clone(),
            provider_url: self.provider_url.clone(),
            feed: self.feed(),
            credential: self.credential.clone(),
            subscribed_timestamp: self.subscribed_timestamp,
        }
    }
}

impl From<SubscriptionRecord> for Subscription {
    fn from(record: SubscriptionRecord) -> Self {
        Self {
            id: record.id,
            provider_url: record.provider_url,
            feed: RwLock::new(record.feed),
            credential: record.credential,
            subscribed_timestamp: record.subscribed_timestamp,
        }
    }
}

impl PartialEq for Subscription {
    fn eq(&self, other: &Self) -> bool {
        self.to_record() == other.to_record()
    }
}

/// Serialized form of a [`Subscription`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    pub id: SubscriptionId,
    pub provider_url: String,
    pub feed: Feed,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<SerializedPcd>,
    pub subscribed_timestamp: Timestamp,
}

/// Changes broadcast to watchers of a manager.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ManagerEvent {
    ProviderAdded {
        provider_url: String,
    },
    ProviderRenamed {
        provider_url: String,
        provider_name: String,
    },
    ProviderRemoved {
        provider_url: String,
    },
    Subscribed {
        subscription_id: SubscriptionId,
    },
    /// A forced re-subscription replaced the feed.
    SubscriptionUpdated {
        subscription_id: SubscriptionId,
    },
    Unsubscribed {
        subscription_id: SubscriptionId,
    },
    PollSucceeded {
        subscription_id: SubscriptionId,
        actions: usize,
    },
    PollFailed {
        subscription_id: SubscriptionId,
        kind: SubscriptionErrorKind,
    },
}

/// Unique identifier for an event watcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WatcherId(pub u64);

/// Receiving end of a watch on a manager.
pub struct EventHandle {
    pub id: WatcherId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<ManagerEvent>,
}

impl EventHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<ManagerEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<ManagerEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<ManagerEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything received so far, without blocking.
    pub fn drain(&self) -> Vec<ManagerEvent> {
        self.receiver.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_wire_shape() {
        let record = SubscriptionRecord {
            id: SubscriptionId::from("abc"),
            provider_url: "test url".into(),
            feed: Feed::new("1", "test feed"),
            credential: None,
            subscribed_timestamp: Timestamp(1700000000000),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            json!({
                "id": "abc",
                "providerUrl": "test url",
                "feed": {"id": "1", "name": "test feed", "description": "", "permissions": []},
                "subscribedTimestamp": 1700000000000i64
            })
        );
    }

    #[test]
    fn test_replace_feed_is_visible_through_handle() {
        let sub = std::sync::Arc::new(Subscription::new("url", Feed::new("1", "old"), None));
        let other = std::sync::Arc::clone(&sub);

        sub.replace_feed(Feed::new("1", "new"));
        assert_eq!(other.feed().name, "new");
    }
}
