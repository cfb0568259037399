//! Credential construction.

use crate::error::CredentialError;
use crate::pcd::fingerprint;
use crate::sync::KeyedLock;
use crate::types::{CredentialPayload, RequesterIdentity, SerializedPcd, Timestamp};
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::time::Duration;
use tracing::debug;

/// Produces signed, time-stamped credentials.
///
/// The returned PCD binds `identity` to `payload`; its format belongs to the
/// issuer and the verifying provider. Issuing may be slow (proof
/// generation), and the future may be dropped mid-way if the poll is
/// cancelled.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    async fn issue(
        &self,
        identity: &RequesterIdentity,
        payload: &CredentialPayload,
    ) -> Result<SerializedPcd, CredentialError>;
}

/// Reuses credentials for identical requests within a time window.
///
/// The cache key covers the identity, the embedded PCD and the window the
/// current time falls into. Construction is claim-once per key: concurrent
/// callers with the same key wait for the first one and then read its
/// result. A failed construction stores nothing, so the next caller tries
/// again.
///
/// With no window every call issues a new credential.
pub struct CredentialCache {
    window: Option<Duration>,
    entries: Mutex<LruCache<String, SerializedPcd>>,
    claims: KeyedLock<String>,
}

impl CredentialCache {
    pub fn new(capacity: usize, window: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            window,
            entries: Mutex::new(LruCache::new(capacity)),
            claims: KeyedLock::new(),
        }
    }

    /// Get a credential for `identity` carrying `pcd`, issuing one if needed.
    pub async fn get_or_issue(
        &self,
        issuer: &dyn CredentialIssuer,
        identity: &RequesterIdentity,
        pcd: Option<&SerializedPcd>,
    ) -> Result<SerializedPcd, CredentialError> {
        self.get_or_issue_at(issuer, identity, pcd, Timestamp::now())
            .await
    }

    pub(crate) async fn get_or_issue_at(
        &self,
        issuer: &dyn CredentialIssuer,
        identity: &RequesterIdentity,
        pcd: Option<&SerializedPcd>,
        now: Timestamp,
    ) -> Result<SerializedPcd, CredentialError> {
        let payload = CredentialPayload {
            pcd: pcd.cloned(),
            timestamp: now,
        };

        let Some(window) = self.window else {
            return issue(issuer, identity, &payload).await;
        };

        let key = cache_key(identity, pcd, window_index(now, window));
        let _claim = self.claims.lock(key.clone()).await;

        let cached = self.entries.lock().get(&key).cloned();
        if let Some(credential) = cached {
            debug!(identity = %identity.commitment, "reusing cached credential");
            return Ok(credential);
        }

        let credential = issue(issuer, identity, &payload).await?;
        self.entries.lock().put(key, credential.clone());
        Ok(credential)
    }

    /// Drop every cached credential.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

async fn issue(
    issuer: &dyn CredentialIssuer,
    identity: &RequesterIdentity,
    payload: &CredentialPayload,
) -> Result<SerializedPcd, CredentialError> {
    debug!(
        identity = %identity.commitment,
        with_pcd = payload.pcd.is_some(),
        "issuing credential"
    );
    issuer.issue(identity, payload).await
}

fn window_index(now: Timestamp, window: Duration) -> i64 {
    let width = (window.as_millis() as i64).max(1);
    now.0.div_euclid(width)
}

fn cache_key(identity: &RequesterIdentity, pcd: Option<&SerializedPcd>, window: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identity.commitment.as_bytes());
    hasher.update([0u8]);
    if let Some(pcd) = pcd {
        hasher.update(fingerprint(pcd).as_bytes());
    }
    hasher.update([0u8]);
    hasher.update(window.to_le_bytes());
    hex::encode(hasher.finalize())
}
