//! Polling of subscribed feeds.
//!
//! The engine talks to two collaborators it does not implement:
//! - [`FeedTransport`]: the network boundary (list feeds, poll one feed)
//! - [`CredentialIssuer`]: signs a payload on behalf of a requester identity
//!
//! A poll either yields an [`ActionBatch`](crate::types::ActionBatch) or a
//! [`SubscriptionError`](crate::error::SubscriptionError) that is recorded
//! for the subscription. Applying the batch is left to the caller.

mod credential;
mod engine;
mod transport;

pub use credential::{CredentialCache, CredentialIssuer};
pub use engine::PollEngine;
pub use transport::{decode_list_feeds, decode_poll_response, FeedTransport};
