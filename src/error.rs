//! Error types for feed subscriptions.

use crate::types::SubscriptionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main error type for manager, collection and snapshot operations.
///
/// Poll-time failures are not raised through this type; they are recorded
/// per subscription as a [`SubscriptionError`].
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Already subscribed to feed {feed_id} at {provider_url}")]
    AlreadySubscribed {
        provider_url: String,
        feed_id: String,
    },

    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(SubscriptionId),

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Invalid folder path: {0:?}")]
    InvalidFolder(String),

    #[error("Invalid PCD in folder {folder}: {reason}")]
    InvalidPcd { folder: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },
}

impl FeedError {
    /// True for usage errors returned synchronously to a mutating caller.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            FeedError::AlreadySubscribed { .. }
                | FeedError::SubscriptionNotFound(_)
                | FeedError::ProviderNotFound(_)
                | FeedError::InvalidOperation(_)
        )
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(e: serde_json::Error) -> Self {
        FeedError::Serialization(e.to_string())
    }
}

/// Result type for feed subscription operations.
pub type Result<T> = std::result::Result<T, FeedError>;

/// Failure reported by a [`FeedTransport`](crate::poll::FeedTransport).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// No such provider or feed (404-equivalent).
    #[error("service not found: {0}")]
    NotFound(String),

    /// Non-success status other than not-found.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The request did not complete (connection failure, timeout).
    #[error("network failure: {0}")]
    Network(String),

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Failure reported by a [`CredentialIssuer`](crate::poll::CredentialIssuer).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("identity rejected: {0}")]
    Identity(String),

    #[error("proof generation failed: {0}")]
    Proof(String),

    #[error("credential construction cancelled")]
    Cancelled,
}

/// Classification of a poll-time failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionErrorKind {
    /// The feed rejected the request for a missing or invalid permission.
    PermissionError,
    /// The transport reported no such feed or provider.
    ServiceNotFoundError,
    /// The transport call failed to complete or returned garbage.
    NetworkError,
    /// The poll was still outstanding when the deadline or cancellation hit.
    Timeout,
    /// Anything not classified above.
    Unknown,
}

impl fmt::Display for SubscriptionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubscriptionErrorKind::PermissionError => "PermissionError",
            SubscriptionErrorKind::ServiceNotFoundError => "ServiceNotFoundError",
            SubscriptionErrorKind::NetworkError => "NetworkError",
            SubscriptionErrorKind::Timeout => "Timeout",
            SubscriptionErrorKind::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// The most recent poll failure of one subscription.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct SubscriptionError {
    pub kind: SubscriptionErrorKind,
    pub message: String,
}

impl SubscriptionError {
    pub fn new(kind: SubscriptionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(SubscriptionErrorKind::PermissionError, message)
    }

    pub fn timeout() -> Self {
        Self::new(
            SubscriptionErrorKind::Timeout,
            "poll did not complete before the deadline",
        )
    }
}

impl From<TransportError> for SubscriptionError {
    fn from(e: TransportError) -> Self {
        let kind = match &e {
            TransportError::NotFound(_) => SubscriptionErrorKind::ServiceNotFoundError,
            TransportError::Status { status: 404, .. } => {
                SubscriptionErrorKind::ServiceNotFoundError
            }
            TransportError::Status { .. }
            | TransportError::Network(_)
            | TransportError::Malformed(_) => SubscriptionErrorKind::NetworkError,
        };
        Self::new(kind, e.to_string())
    }
}

impl From<CredentialError> for SubscriptionError {
    fn from(e: CredentialError) -> Self {
        let kind = match e {
            CredentialError::Cancelled => SubscriptionErrorKind::Timeout,
            CredentialError::Identity(_) | CredentialError::Proof(_) => {
                SubscriptionErrorKind::Unknown
            }
        };
        Self::new(kind, e.to_string())
    }
}
