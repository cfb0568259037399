//! PCD kinds and their verifiers.
//!
//! A serialized PCD is a tagged value `{type, pcd}`. Each type gets one
//! verifier, looked up by tag in a [`PcdRegistry`]. The registry is an
//! explicit handle: whoever builds a collection decides which kinds it
//! accepts by registering them first.

mod registry;

pub use registry::{PcdRegistry, PcdVerifier};

use crate::types::SerializedPcd;
use sha2::{Digest, Sha256};

/// Stable hex fingerprint of a serialized PCD.
pub fn fingerprint(pcd: &SerializedPcd) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pcd.pcd_type.as_bytes());
    hasher.update([0u8]);
    hasher.update(pcd.pcd.as_bytes());
    hex::encode(hasher.finalize())
}
