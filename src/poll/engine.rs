//! Single-subscription poll algorithm.

use super::credential::{CredentialCache, CredentialIssuer};
use super::transport::FeedTransport;
use crate::error::{SubscriptionError, SubscriptionErrorKind, TransportError};
use crate::subscriptions::{ErrorTracker, ManagerConfig, Subscription};
use crate::types::{
    Action, ActionBatch, Feed, ListFeedsResponse, PollRequest, PollResponse, RequesterIdentity,
    Timestamp,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds credentials, calls the transport and validates what comes back.
///
/// Every poll outcome is written to the shared [`ErrorTracker`]: a success
/// clears the subscription's entry, a failure replaces it. The engine never
/// retries; the caller decides when to poll again.
pub struct PollEngine {
    transport: Arc<dyn FeedTransport>,
    issuer: Arc<dyn CredentialIssuer>,
    credentials: CredentialCache,
    errors: Arc<ErrorTracker>,
    enforce_folder_permissions: bool,
}

impl PollEngine {
    pub fn new(
        transport: Arc<dyn FeedTransport>,
        issuer: Arc<dyn CredentialIssuer>,
        errors: Arc<ErrorTracker>,
        config: &ManagerConfig,
    ) -> Self {
        Self {
            transport,
            issuer,
            credentials: CredentialCache::new(
                config.credential_cache_size,
                config.credential_cache_window,
            ),
            errors,
            enforce_folder_permissions: config.enforce_folder_permissions,
        }
    }

    /// List the feeds of a provider. Failures go straight to the caller.
    pub async fn list_feeds(&self, provider_url: &str) -> Result<ListFeedsResponse, TransportError> {
        self.transport.list_feeds(provider_url).await
    }

    /// Poll one subscription and record the outcome.
    pub async fn poll(
        &self,
        subscription: &Subscription,
        identity: &RequesterIdentity,
    ) -> Result<ActionBatch, SubscriptionError> {
        let feed = subscription.feed();
        debug!(
            subscription_id = %subscription.id(),
            provider_url = %subscription.provider_url(),
            feed_id = %feed.id,
            "polling feed"
        );

        match self.poll_inner(subscription, &feed, identity).await {
            Ok(actions) => {
                self.errors.clear(subscription.id());
                info!(
                    subscription_id = %subscription.id(),
                    feed_id = %feed.id,
                    actions = actions.len(),
                    "poll succeeded"
                );
                Ok(ActionBatch {
                    subscription_id: subscription.id().clone(),
                    provider_url: subscription.provider_url().to_string(),
                    feed_id: feed.id,
                    actions,
                })
            }
            Err(error) => {
                warn!(
                    subscription_id = %subscription.id(),
                    feed_id = %feed.id,
                    kind = %error.kind,
                    error = %error.message,
                    "poll failed"
                );
                self.errors.record(subscription.id(), error.clone());
                Err(error)
            }
        }
    }

    async fn poll_inner(
        &self,
        subscription: &Subscription,
        feed: &Feed,
        identity: &RequesterIdentity,
    ) -> Result<Vec<Action>, SubscriptionError> {
        let pcd = if feed.requires_credential() {
            let credential = self
                .credentials
                .get_or_issue(self.issuer.as_ref(), identity, subscription.credential())
                .await?;
            Some(credential)
        } else {
            None
        };

        let request = PollRequest {
            feed_id: feed.id.clone(),
            pcd,
            timestamp: Some(Timestamp::now()),
        };

        let response = self
            .transport
            .poll_feed(subscription.provider_url(), &request)
            .await?;

        self.validate(feed, response)
    }

    fn validate(&self, feed: &Feed, response: PollResponse) -> Result<Vec<Action>, SubscriptionError> {
        if !response.success {
            return Err(match response.error {
                Some(failure) => {
                    SubscriptionError::new(classify_failure(&failure.kind), failure.detail)
                }
                None => SubscriptionError::new(
                    SubscriptionErrorKind::Unknown,
                    "feed reported failure without an error",
                ),
            });
        }

        let actions = response
            .value
            .ok_or_else(|| {
                SubscriptionError::new(
                    SubscriptionErrorKind::NetworkError,
                    "success response without a value",
                )
            })?
            .actions;

        // Never granted, whatever the permission setting.
        if actions.iter().any(|a| matches!(a, Action::Unknown)) {
            return Err(SubscriptionError::permission(format!(
                "feed {} sent an action of unknown type",
                feed.id
            )));
        }

        if self.enforce_folder_permissions {
            if let Some(action) = actions.iter().find(|a| !feed.permits(a)) {
                return Err(SubscriptionError::permission(format!(
                    "feed {} has no permission for {} on folder {:?}",
                    feed.id,
                    action.kind(),
                    action.folder()
                )));
            }
        }

        Ok(actions)
    }

    /// Drop every cached credential.
    pub fn clear_credentials(&self) {
        self.credentials.clear();
    }
}

fn classify_failure(kind: &str) -> SubscriptionErrorKind {
    match kind {
        "PermissionError" | "Permission" | "Unauthorized" | "Forbidden" => {
            SubscriptionErrorKind::PermissionError
        }
        "ServiceNotFoundError" | "ServiceNotFound" | "NotFound" => {
            SubscriptionErrorKind::ServiceNotFoundError
        }
        "NetworkError" => SubscriptionErrorKind::NetworkError,
        _ => SubscriptionErrorKind::Unknown,
    }
}
