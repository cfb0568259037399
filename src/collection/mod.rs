//! The receiving collection: PCDs grouped into slash-delimited folders.
//!
//! Feeds never touch the collection directly. A poll yields an
//! [`ActionBatch`](crate::types::ActionBatch) and the caller hands it to
//! [`FolderCollection::apply_batch`], which applies the whole batch or
//! nothing.

mod folders;
pub mod path;

pub use folders::{apply_action, FolderCollection, FolderMap};
