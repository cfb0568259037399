//! # Feed Subscriptions
//!
//! Client side of a feed protocol: subscribe to feeds offered by remote
//! providers, poll them with signed credentials, and apply the returned
//! folder actions to a local PCD collection.
//!
//! ## Core Concepts
//!
//! - **Providers**: Network endpoints offering feeds
//! - **Subscriptions**: One per provider/feed pair, holding polling state
//! - **Credentials**: Signed payloads binding the requester identity to a poll
//! - **Action batches**: Ordered folder mutations, applied all-or-nothing
//!
//! ## Example
//!
//! ```ignore
//! use feed_subscriptions::{FolderCollection, RequesterIdentity, SubscriptionManager};
//!
//! let manager = SubscriptionManager::new(transport, issuer);
//! manager.add_provider("https://zupass.example/feeds", "Zupass");
//!
//! let feeds = manager.list_feeds("https://zupass.example/feeds").await?.feeds;
//! manager.subscribe("https://zupass.example/feeds", feeds[0].clone(), None, false)?;
//!
//! let collection = FolderCollection::new();
//! let identity = RequesterIdentity::new(commitment);
//! for batch in manager.poll_subscriptions(&identity).await {
//!     collection.apply_batch(&batch)?;
//! }
//!
//! // Persist between sessions
//! let saved = manager.serialize()?;
//! let restored = SubscriptionManager::deserialize(transport, issuer, &saved)?;
//! ```

pub mod collection;
pub mod error;
pub mod pcd;
pub mod poll;
pub mod subscriptions;
pub mod sync;
pub mod types;

// Re-exports
pub use collection::{apply_action, FolderCollection, FolderMap};
pub use error::{
    CredentialError, FeedError, Result, SubscriptionError, SubscriptionErrorKind, TransportError,
};
pub use pcd::{PcdRegistry, PcdVerifier};
pub use poll::{
    decode_list_feeds, decode_poll_response, CredentialCache, CredentialIssuer, FeedTransport,
    PollEngine,
};
pub use subscriptions::{
    ErrorTracker, EventHandle, ManagerConfig, ManagerEvent, ManagerSnapshot, SnapshotFile,
    Subscription, SubscriptionManager, SubscriptionRecord, WatcherId,
};
pub use sync::{KeyedGuard, KeyedLock};
pub use tokio_util::sync::CancellationToken;
pub use types::*;
