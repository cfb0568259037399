//! Folder action application.

use crate::collection::path;
use crate::error::{FeedError, Result};
use crate::pcd::PcdRegistry;
use crate::types::{Action, ActionBatch, SerializedPcd};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Folder path to the items it holds.
pub type FolderMap = BTreeMap<String, Vec<SerializedPcd>>;

/// Apply a single action to a folder map.
///
/// On error the map may be partially modified; callers wanting atomicity
/// apply to a copy, as [`FolderCollection::apply_actions`] does.
pub fn apply_action(folders: &mut FolderMap, action: &Action) -> Result<()> {
    match action {
        Action::ReplaceInFolder { folder, pcds } => {
            let folder = path::normalize(folder)?;
            check_items(&folder, pcds)?;
            folders.insert(folder, pcds.clone());
            Ok(())
        }

        Action::AppendToFolder { folder, pcds } => {
            let folder = path::normalize(folder)?;
            check_items(&folder, pcds)?;
            folders.entry(folder).or_default().extend(pcds.iter().cloned());
            Ok(())
        }

        Action::DeleteFolder { folder, recursive } => {
            let folder = path::normalize(folder)?;
            if *recursive {
                folders.retain(|name, _| !path::is_within(name, &folder));
            } else {
                folders.remove(&folder);
            }
            Ok(())
        }

        Action::Unknown => Err(FeedError::InvalidOperation(
            "cannot apply an action of unknown type".to_string(),
        )),
    }
}

/// Structural checks every item must pass, registry or not.
fn check_items(folder: &str, pcds: &[SerializedPcd]) -> Result<()> {
    for pcd in pcds {
        if pcd.pcd_type.is_empty() {
            return Err(FeedError::InvalidPcd {
                folder: folder.to_string(),
                reason: "missing PCD type".to_string(),
            });
        }
        if pcd.pcd.is_empty() {
            return Err(FeedError::InvalidPcd {
                folder: folder.to_string(),
                reason: format!("empty {} payload", pcd.pcd_type),
            });
        }
    }
    Ok(())
}

#[derive(Default)]
struct CollectionState {
    folders: FolderMap,
    version: u64,
}

/// A versioned, folder-structured PCD collection.
///
/// Batches are the unit of atomicity: every action of a batch is applied to
/// a staged copy, and the copy replaces the live folders only if all of them
/// succeed. The version increments once per committed non-empty batch.
pub struct FolderCollection {
    state: RwLock<CollectionState>,
    registry: Option<Arc<PcdRegistry>>,
}

impl FolderCollection {
    /// Create an empty collection that performs structural checks only.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CollectionState::default()),
            registry: None,
        }
    }

    /// Create an empty collection that also verifies every incoming item
    /// against `registry`.
    pub fn with_registry(registry: Arc<PcdRegistry>) -> Self {
        Self {
            state: RwLock::new(CollectionState::default()),
            registry: Some(registry),
        }
    }

    /// Apply the actions of a poll result.
    pub fn apply_batch(&self, batch: &ActionBatch) -> Result<u64> {
        debug!(
            subscription_id = %batch.subscription_id,
            feed_id = %batch.feed_id,
            actions = batch.actions.len(),
            "applying action batch"
        );
        self.apply_actions(&batch.actions).map_err(|e| {
            warn!(
                subscription_id = %batch.subscription_id,
                error = %e,
                "action batch rejected"
            );
            e
        })
    }

    /// Apply `actions` in order, all or nothing. Returns the new version.
    pub fn apply_actions(&self, actions: &[Action]) -> Result<u64> {
        // Verification can be slow; do it before taking the write lock.
        self.verify_items(actions)?;

        let mut state = self.state.write();
        if actions.is_empty() {
            return Ok(state.version);
        }

        let mut staged = state.folders.clone();
        for action in actions {
            apply_action(&mut staged, action)?;
        }

        state.folders = staged;
        state.version += 1;
        Ok(state.version)
    }

    fn verify_items(&self, actions: &[Action]) -> Result<()> {
        let Some(registry) = &self.registry else {
            return Ok(());
        };

        for action in actions {
            let pcds = match action {
                Action::ReplaceInFolder { pcds, .. } | Action::AppendToFolder { pcds, .. } => pcds,
                Action::DeleteFolder { .. } | Action::Unknown => continue,
            };
            for pcd in pcds {
                registry
                    .verify(pcd)
                    .map_err(|reason| FeedError::InvalidPcd {
                        folder: action.folder().to_string(),
                        reason,
                    })?;
            }
        }
        Ok(())
    }

    /// Items in `folder`, or None if the folder does not exist.
    pub fn get_folder(&self, folder: &str) -> Option<Vec<SerializedPcd>> {
        let folder = path::normalize(folder).ok()?;
        self.state.read().folders.get(&folder).cloned()
    }

    /// Names of all folders, sorted.
    pub fn folders(&self) -> Vec<String> {
        self.state.read().folders.keys().cloned().collect()
    }

    /// Copy of the whole collection.
    pub fn snapshot(&self) -> FolderMap {
        self.state.read().folders.clone()
    }

    /// Total number of items across all folders.
    pub fn item_count(&self) -> usize {
        self.state.read().folders.values().map(Vec::len).sum()
    }

    /// Number of committed batches.
    pub fn version(&self) -> u64 {
        self.state.read().version
    }
}

impl Default for FolderCollection {
    fn default() -> Self {
        Self::new()
    }
}
