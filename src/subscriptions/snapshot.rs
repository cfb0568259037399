//! Snapshot and restore of manager state.
//!
//! The snapshot is JSON, in creation order, so serializing the same state
//! twice yields the same bytes. Unknown fields are ignored on load.
//!
//! [`SnapshotFile`] wraps the JSON in a small checksummed envelope:
//!
//! ```text
//! magic "FSS\0" | version u8 | crc32 u32 LE | length u64 LE | JSON body
//! ```

use super::manager::{ManagerConfig, SubscriptionManager};
use super::types::{Subscription, SubscriptionRecord};
use crate::error::{FeedError, Result};
use crate::poll::{CredentialIssuer, FeedTransport};
use crate::types::Provider;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Magic bytes for snapshot files.
const SNAPSHOT_MAGIC: &[u8; 4] = b"FSS\0";

/// Current snapshot file format version.
const SNAPSHOT_VERSION: u8 = 1;

const HEADER_LEN: usize = 4 + 1 + 4 + 8;

/// Providers and subscriptions of a manager, as persisted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ManagerSnapshot {
    #[serde(default)]
    pub providers: Vec<Provider>,
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionRecord>,
}

impl SubscriptionManager {
    /// Value copy of providers and active subscriptions.
    pub fn snapshot(&self) -> ManagerSnapshot {
        let state = self.state.read();
        ManagerSnapshot {
            providers: state.providers.all().to_vec(),
            subscriptions: state
                .subscriptions
                .all()
                .iter()
                .map(|s| s.to_record())
                .collect(),
        }
    }

    /// Serialize providers and subscriptions to JSON.
    pub fn serialize(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    /// Rebuild a manager with default configuration from [`serialize`](Self::serialize) output.
    pub fn deserialize(
        transport: Arc<dyn FeedTransport>,
        issuer: Arc<dyn CredentialIssuer>,
        serialized: &str,
    ) -> Result<Self> {
        let snapshot: ManagerSnapshot = serde_json::from_str(serialized)
            .map_err(|e| FeedError::Deserialization(e.to_string()))?;
        Self::from_snapshot(transport, issuer, ManagerConfig::default(), snapshot)
    }

    /// Rebuild a manager from a snapshot.
    ///
    /// Subscriptions whose provider is missing from the snapshot get the
    /// provider registered under its URL. Duplicate ids or duplicate
    /// provider/feed pairs are rejected as corruption.
    pub fn from_snapshot(
        transport: Arc<dyn FeedTransport>,
        issuer: Arc<dyn CredentialIssuer>,
        config: ManagerConfig,
        snapshot: ManagerSnapshot,
    ) -> Result<Self> {
        let manager = Self::with_config(transport, issuer, config);

        {
            let mut state = manager.state.write();
            for provider in &snapshot.providers {
                state
                    .providers
                    .upsert(&provider.provider_url, &provider.provider_name);
            }

            let mut ids = HashSet::new();
            for record in snapshot.subscriptions {
                if !ids.insert(record.id.clone()) {
                    return Err(FeedError::Corruption(format!(
                        "duplicate subscription id {}",
                        record.id
                    )));
                }
                if state
                    .subscriptions
                    .find(&record.provider_url, &record.feed.id)
                    .is_some()
                {
                    return Err(FeedError::Corruption(format!(
                        "duplicate subscription to feed {} at {}",
                        record.feed.id, record.provider_url
                    )));
                }
                if state.providers.upsert_if_absent(&record.provider_url) {
                    warn!(
                        provider_url = %record.provider_url,
                        "snapshot subscription without provider entry"
                    );
                }
                state
                    .subscriptions
                    .insert(Arc::new(Subscription::from(record)));
            }
        }

        debug!(
            providers = manager.get_providers().len(),
            subscriptions = manager.get_active_subscriptions().len(),
            "restored manager from snapshot"
        );
        Ok(manager)
    }
}

/// Checksummed snapshot file on local disk.
pub struct SnapshotFile;

impl SnapshotFile {
    /// Write `snapshot` to `path`, replacing any previous file atomically.
    pub fn save(path: impl AsRef<Path>, snapshot: &ManagerSnapshot) -> Result<()> {
        let path = path.as_ref();
        let body = serde_json::to_vec(snapshot)?;
        let checksum = crc32fast::hash(&body);

        let tmp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(SNAPSHOT_MAGIC)?;
            file.write_all(&[SNAPSHOT_VERSION])?;
            file.write_all(&checksum.to_le_bytes())?;
            file.write_all(&(body.len() as u64).to_le_bytes())?;
            file.write_all(&body)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Read a snapshot written by [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>) -> Result<ManagerSnapshot> {
        let bytes = fs::read(path)?;
        if bytes.len() < HEADER_LEN {
            return Err(FeedError::Corruption("snapshot file truncated".into()));
        }

        let (header, body) = bytes.split_at(HEADER_LEN);
        if &header[0..4] != SNAPSHOT_MAGIC {
            return Err(FeedError::Corruption("not a snapshot file".into()));
        }
        if header[4] != SNAPSHOT_VERSION {
            return Err(FeedError::Corruption(format!(
                "unsupported snapshot version {}",
                header[4]
            )));
        }

        let expected = u32::from_le_bytes([header[5], header[6], header[7], header[8]]);
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&header[9..17]);
        let len = u64::from_le_bytes(len_bytes) as usize;

        if body.len() != len {
            return Err(FeedError::Corruption(format!(
                "snapshot body is {} bytes, header says {}",
                body.len(),
                len
            )));
        }

        let got = crc32fast::hash(body);
        if got != expected {
            return Err(FeedError::ChecksumMismatch { expected, got });
        }

        serde_json::from_slice(body).map_err(|e| FeedError::Deserialization(e.to_string()))
    }
}
