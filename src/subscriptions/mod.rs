//! Feed subscriptions and their bookkeeping.
//!
//! This module provides the [`SubscriptionManager`] façade over:
//! - the provider registry (known feed providers)
//! - the subscription store (one subscription per provider/feed pair)
//! - the error tracker (last poll failure per subscription)
//! - change notifications for watchers
//!
//! # Example
//!
//! ```ignore
//! let manager = SubscriptionManager::new(transport, issuer);
//!
//! let feeds = manager.list_feeds("https://provider.example/feeds").await?.feeds;
//! let sub = manager.subscribe("https://provider.example/feeds", feeds[0].clone(), None, false)?;
//!
//! for batch in manager.poll_subscriptions(&identity).await {
//!     collection.apply_batch(&batch)?;
//! }
//! if let Some(error) = manager.get_error(sub.id()) {
//!     println!("{} failed: {}", sub.feed().name, error);
//! }
//! ```

mod events;
mod manager;
mod registry;
mod snapshot;
mod store;
mod tracker;
mod types;

pub use events::EventBus;
pub use manager::{ManagerConfig, SubscriptionManager};
pub use registry::{ProviderRegistry, Upsert};
pub use snapshot::{ManagerSnapshot, SnapshotFile};
pub use store::SubscriptionStore;
pub use tracker::ErrorTracker;
pub use types::{EventHandle, ManagerEvent, Subscription, SubscriptionRecord, WatcherId};
