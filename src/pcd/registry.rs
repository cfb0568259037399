//! Verifier lookup table with memoized results.

use super::fingerprint;
use crate::types::SerializedPcd;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

/// Checks one kind of PCD.
pub trait PcdVerifier: Send + Sync {
    /// Returns the rejection reason if `pcd` does not verify.
    fn verify(&self, pcd: &SerializedPcd) -> Result<(), String>;
}

struct FnVerifier<F>(F);

impl<F> PcdVerifier for FnVerifier<F>
where
    F: Fn(&SerializedPcd) -> Result<(), String> + Send + Sync,
{
    fn verify(&self, pcd: &SerializedPcd) -> Result<(), String> {
        (self.0)(pcd)
    }
}

/// Registered verifiers plus a bounded cache of PCDs that already verified.
///
/// Only successes are cached, so a PCD that failed (perhaps because its
/// verifier was registered late) is checked again on the next attempt.
pub struct PcdRegistry {
    verifiers: RwLock<HashMap<String, Arc<dyn PcdVerifier>>>,
    verified: Mutex<LruCache<String, ()>>,
}

impl PcdRegistry {
    /// Create an empty registry remembering up to `cache_size` verified PCDs.
    pub fn new(cache_size: usize) -> Self {
        let cache_size = NonZeroUsize::new(cache_size.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            verifiers: RwLock::new(HashMap::new()),
            verified: Mutex::new(LruCache::new(cache_size)),
        }
    }

    /// Register (or replace) the verifier for `pcd_type`.
    pub fn register(&self, pcd_type: impl Into<String>, verifier: impl PcdVerifier + 'static) {
        let pcd_type = pcd_type.into();
        debug!(pcd_type = %pcd_type, "registering PCD verifier");
        self.verifiers.write().insert(pcd_type, Arc::new(verifier));
        // A new verifier may disagree with the old one.
        self.verified.lock().clear();
    }

    /// Register a closure as the verifier for `pcd_type`.
    pub fn register_fn<F>(&self, pcd_type: impl Into<String>, verify: F)
    where
        F: Fn(&SerializedPcd) -> Result<(), String> + Send + Sync + 'static,
    {
        self.register(pcd_type, FnVerifier(verify));
    }

    pub fn is_registered(&self, pcd_type: &str) -> bool {
        self.verifiers.read().contains_key(pcd_type)
    }

    /// Registered PCD types, sorted.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.verifiers.read().keys().cloned().collect();
        types.sort();
        types
    }

    /// Verify `pcd` with the verifier registered for its type.
    pub fn verify(&self, pcd: &SerializedPcd) -> Result<(), String> {
        let key = fingerprint(pcd);
        if self.verified.lock().get(&key).is_some() {
            return Ok(());
        }

        let verifier = self
            .verifiers
            .read()
            .get(&pcd.pcd_type)
            .cloned()
            .ok_or_else(|| format!("no verifier registered for {}", pcd.pcd_type))?;

        verifier.verify(pcd)?;
        self.verified.lock().put(key, ());
        Ok(())
    }

    /// Drop a cached verification result.
    pub fn forget(&self, pcd: &SerializedPcd) {
        self.verified.lock().pop(&fingerprint(pcd));
    }

    /// Number of cached verification results.
    pub fn cached_results(&self) -> usize {
        self.verified.lock().len()
    }
}
