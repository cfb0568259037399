//! Shared test doubles: an in-memory feed provider and a signing stub.

#![allow(dead_code)]

use async_trait::async_trait;
use feed_subscriptions::{
    Action, CredentialError, CredentialIssuer, CredentialPayload, Feed, FeedTransport,
    ListFeedsResponse, PermissionRequest, PollRequest, PollResponse, RequesterIdentity,
    SerializedPcd, TransportError,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const MOCK_PROVIDER_URL: &str = "http://localhost:3000/feeds";
pub const MOCK_SIGNATURE_TYPE: &str = "mock-signature";

/// What the mock provider does when a feed is polled.
#[derive(Clone)]
pub enum Behavior {
    /// Answer with these actions.
    Respond(Vec<Action>),
    /// Answer with these actions after a delay.
    Slow(Duration, Vec<Action>),
    /// Answer with a failure body.
    Refuse { kind: String, detail: String },
    /// Fail at the transport level.
    Break(TransportError),
}

/// The message a [`MockIssuer`] credential carries.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedMessage {
    pub commitment: String,
    pub payload: CredentialPayload,
}

/// Signs by writing the identity and payload into the PCD body.
#[derive(Default)]
pub struct MockIssuer {
    pub issued: AtomicUsize,
}

#[async_trait]
impl CredentialIssuer for MockIssuer {
    async fn issue(
        &self,
        identity: &RequesterIdentity,
        payload: &CredentialPayload,
    ) -> Result<SerializedPcd, CredentialError> {
        self.issued.fetch_add(1, Ordering::SeqCst);
        let message = SignedMessage {
            commitment: identity.commitment.clone(),
            payload: payload.clone(),
        };
        let body = serde_json::to_string(&message).map_err(|e| CredentialError::Proof(e.to_string()))?;
        Ok(SerializedPcd::new(MOCK_SIGNATURE_TYPE, body))
    }
}

/// One provider with three feeds:
/// - `"1"`: signed, replaces folder `Mock`
/// - `"2"`: signed, always refuses with a permission error
/// - `"3"`: email credential, replaces folder `Email`
pub struct MockFeedApi {
    feeds: Mutex<HashMap<String, Vec<Feed>>>,
    behaviors: Mutex<HashMap<String, Behavior>>,
    pub received_payload: Mutex<Option<CredentialPayload>>,
    pub requests: Mutex<Vec<PollRequest>>,
    pub polls: AtomicUsize,
}

impl MockFeedApi {
    pub fn new() -> Self {
        let feeds = vec![
            Feed::new("1", "Mock Feed")
                .with_description("first feed")
                .with_permission(PermissionRequest::SignedIdentity)
                .with_permission(PermissionRequest::ReplaceInFolder {
                    folder: "Mock".into(),
                }),
            Feed::new("2", "Bad Feed")
                .with_description("feed that refuses every poll")
                .with_permission(PermissionRequest::SignedIdentity),
            Feed::new("3", "Email Feed")
                .with_description("feed reading an email credential")
                .with_input_pcd_type("email-pcd")
                .with_permission(PermissionRequest::ReplaceInFolder {
                    folder: "Email".into(),
                }),
        ];

        let mut behaviors = HashMap::new();
        behaviors.insert("1".to_string(), Behavior::Respond(vec![mock_action("Mock", 1)]));
        behaviors.insert(
            "2".to_string(),
            Behavior::Refuse {
                kind: "PermissionError".into(),
                detail: "missing required permission".into(),
            },
        );
        behaviors.insert("3".to_string(), Behavior::Respond(vec![mock_action("Email", 1)]));

        let mut by_provider = HashMap::new();
        by_provider.insert(MOCK_PROVIDER_URL.to_string(), feeds);

        Self {
            feeds: Mutex::new(by_provider),
            behaviors: Mutex::new(behaviors),
            received_payload: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            polls: AtomicUsize::new(0),
        }
    }

    pub fn provider_urls(&self) -> Vec<String> {
        self.feeds.lock().keys().cloned().collect()
    }

    /// Add a feed at `provider_url` with the given behavior.
    pub fn add_feed(&self, provider_url: &str, feed: Feed, behavior: Behavior) {
        self.behaviors.lock().insert(feed.id.clone(), behavior);
        self.feeds
            .lock()
            .entry(provider_url.to_string())
            .or_default()
            .push(feed);
    }

    pub fn set_behavior(&self, feed_id: &str, behavior: Behavior) {
        self.behaviors.lock().insert(feed_id.to_string(), behavior);
    }

    fn find_feed(&self, provider_url: &str, feed_id: &str) -> Option<Feed> {
        self.feeds
            .lock()
            .get(provider_url)?
            .iter()
            .find(|f| f.id == feed_id)
            .cloned()
    }
}

#[async_trait]
impl FeedTransport for MockFeedApi {
    async fn list_feeds(&self, provider_url: &str) -> Result<ListFeedsResponse, TransportError> {
        match self.feeds.lock().get(provider_url) {
            Some(feeds) => Ok(ListFeedsResponse {
                feeds: feeds.clone(),
            }),
            None => Err(TransportError::NotFound(provider_url.to_string())),
        }
    }

    async fn poll_feed(
        &self,
        provider_url: &str,
        request: &PollRequest,
    ) -> Result<PollResponse, TransportError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let feed = self
            .find_feed(provider_url, &request.feed_id)
            .ok_or_else(|| TransportError::NotFound(format!("feed {}", request.feed_id)))?;

        if feed.requires_credential() {
            let Some(credential) = &request.pcd else {
                return Ok(PollResponse::failure("PermissionError", "credential required"));
            };
            if credential.pcd_type != MOCK_SIGNATURE_TYPE {
                return Ok(PollResponse::failure("PermissionError", "unknown signature"));
            }
            let message: SignedMessage = serde_json::from_str(&credential.pcd)
                .map_err(|e| TransportError::Malformed(e.to_string()))?;
            if let Some(input) = &feed.input_pcd_type {
                let presented = message.payload.pcd.as_ref().map(|p| p.pcd_type.as_str());
                if presented != Some(input.as_str()) {
                    *self.received_payload.lock() = Some(message.payload);
                    return Ok(PollResponse::failure(
                        "PermissionError",
                        format!("expected a {} credential", input),
                    ));
                }
            }
            *self.received_payload.lock() = Some(message.payload);
        }

        let behavior = self
            .behaviors
            .lock()
            .get(&request.feed_id)
            .cloned()
            .unwrap_or(Behavior::Respond(vec![]));

        match behavior {
            Behavior::Respond(actions) => Ok(PollResponse::ok(actions)),
            Behavior::Slow(delay, actions) => {
                tokio::time::sleep(delay).await;
                Ok(PollResponse::ok(actions))
            }
            Behavior::Refuse { kind, detail } => Ok(PollResponse::failure(kind, detail)),
            Behavior::Break(error) => Err(error),
        }
    }
}

/// Route `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn mock_pcd(n: u32) -> SerializedPcd {
    SerializedPcd::new("mock-ticket", format!("{{\"ticket\":{}}}", n))
}

pub fn mock_action(folder: &str, n: u32) -> Action {
    Action::ReplaceInFolder {
        folder: folder.to_string(),
        pcds: (1..=n).map(mock_pcd).collect(),
    }
}

pub fn email_pcd() -> SerializedPcd {
    SerializedPcd::new(
        "email-pcd",
        r#"{"emailAddress":"test@example.com","semaphoreId":"12345"}"#,
    )
}

pub fn identity() -> RequesterIdentity {
    RequesterIdentity::new("0x1f2e3d4c")
}

pub fn test_feed() -> Feed {
    Feed {
        description: "description".into(),
        ..Feed::new("1", "test feed")
    }
}
