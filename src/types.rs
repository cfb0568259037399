//! Core types for feed subscriptions.
//!
//! Field names serialize in camelCase because these values cross the wire
//! to feed providers and into persisted snapshots.

use crate::collection::path;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique identifier for a subscription.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub String);

impl SubscriptionId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        SubscriptionId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriptionId {
    fn from(s: &str) -> Self {
        SubscriptionId(s.to_string())
    }
}

/// Milliseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time. A clock set before the epoch reads as zero.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();
        Timestamp(millis)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// A self-describing claim-plus-proof object in serialized form.
///
/// `pcd` is opaque to this crate; only the verifier registered for
/// `pcd_type` knows how to read it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SerializedPcd {
    #[serde(rename = "type")]
    pub pcd_type: String,
    pub pcd: String,
}

impl SerializedPcd {
    pub fn new(pcd_type: impl Into<String>, pcd: impl Into<String>) -> Self {
        Self {
            pcd_type: pcd_type.into(),
            pcd: pcd.into(),
        }
    }
}

/// The identity on whose behalf polls are made.
///
/// Only the public commitment is held here; any secret material lives with
/// the [`CredentialIssuer`](crate::poll::CredentialIssuer).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequesterIdentity {
    pub commitment: String,
}

impl RequesterIdentity {
    pub fn new(commitment: impl Into<String>) -> Self {
        Self {
            commitment: commitment.into(),
        }
    }
}

/// A network endpoint hosting one or more feeds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub provider_url: String,
    pub provider_name: String,
}

/// A requirement a feed places on its subscribers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PermissionRequest {
    /// The feed may append items under `folder`.
    AppendToFolder { folder: String },
    /// The feed may replace the contents of `folder` and its descendants.
    ReplaceInFolder { folder: String },
    /// The feed may delete `folder` and its descendants.
    DeleteFolder { folder: String },
    /// Polls must carry a credential signed by the requester identity.
    SignedIdentity,
    /// A requirement this client does not understand. It grants nothing.
    #[serde(other)]
    Unknown,
}

impl PermissionRequest {
    /// Whether this permission allows the given action.
    pub fn covers(&self, action: &Action) -> bool {
        match (self, action) {
            (
                PermissionRequest::AppendToFolder { folder },
                Action::AppendToFolder { folder: target, .. },
            )
            | (
                PermissionRequest::ReplaceInFolder { folder },
                Action::ReplaceInFolder { folder: target, .. },
            )
            | (
                PermissionRequest::DeleteFolder { folder },
                Action::DeleteFolder { folder: target, .. },
            ) => path::is_within(target, folder),
            _ => false,
        }
    }
}

/// A pollable content stream offered by a provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permissions: Vec<PermissionRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_pcd_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_args: Option<serde_json::Value>,
}

impl Feed {
    /// Create a feed with no permissions.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            permissions: Vec::new(),
            input_pcd_type: None,
            partial_args: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_permission(mut self, permission: PermissionRequest) -> Self {
        self.permissions.push(permission);
        self
    }

    pub fn with_input_pcd_type(mut self, pcd_type: impl Into<String>) -> Self {
        self.input_pcd_type = Some(pcd_type.into());
        self
    }

    /// Whether polls of this feed must carry a signed credential.
    pub fn requires_credential(&self) -> bool {
        self.input_pcd_type.is_some()
            || self
                .permissions
                .iter()
                .any(|p| matches!(p, PermissionRequest::SignedIdentity))
    }

    /// Whether some declared permission allows the given action.
    pub fn permits(&self, action: &Action) -> bool {
        self.permissions.iter().any(|p| p.covers(action))
    }
}

/// A single mutation of the receiving collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    /// Clear `folder` and insert `pcds`.
    ReplaceInFolder {
        folder: String,
        #[serde(default)]
        pcds: Vec<SerializedPcd>,
    },
    /// Add `pcds` to `folder` without clearing it.
    AppendToFolder {
        folder: String,
        #[serde(default)]
        pcds: Vec<SerializedPcd>,
    },
    /// Remove `folder`; with `recursive`, its descendants too.
    DeleteFolder {
        folder: String,
        #[serde(default)]
        recursive: bool,
    },
    /// An action type this client does not understand.
    #[serde(other)]
    Unknown,
}

impl Action {
    /// The folder this action targets.
    pub fn folder(&self) -> &str {
        match self {
            Action::ReplaceInFolder { folder, .. }
            | Action::AppendToFolder { folder, .. }
            | Action::DeleteFolder { folder, .. } => folder,
            Action::Unknown => "",
        }
    }

    /// Short name used in logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::ReplaceInFolder { .. } => "ReplaceInFolder",
            Action::AppendToFolder { .. } => "AppendToFolder",
            Action::DeleteFolder { .. } => "DeleteFolder",
            Action::Unknown => "Unknown",
        }
    }
}

/// The ordered actions returned by one successful poll.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionBatch {
    pub subscription_id: SubscriptionId,
    pub provider_url: String,
    pub feed_id: String,
    pub actions: Vec<Action>,
}

/// Payload bound inside a credential.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pcd: Option<SerializedPcd>,
    pub timestamp: Timestamp,
}

/// Body of a poll sent to a provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollRequest {
    pub feed_id: String,
    /// Signed credential, present when the feed requires one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pcd: Option<SerializedPcd>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
}

/// Actions carried by a successful poll response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollValue {
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// Error carried by a failed poll response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollFailure {
    pub kind: String,
    #[serde(default)]
    pub detail: String,
}

/// Body of a poll response as decoded by the transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<PollValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PollFailure>,
}

impl PollResponse {
    pub fn ok(actions: Vec<Action>) -> Self {
        Self {
            success: true,
            value: Some(PollValue { actions }),
            error: None,
        }
    }

    pub fn failure(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            success: false,
            value: None,
            error: Some(PollFailure {
                kind: kind.into(),
                detail: detail.into(),
            }),
        }
    }
}

/// Response to a list-feeds request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListFeedsResponse {
    pub feeds: Vec<Feed>,
}
