//! Folder path helpers.
//!
//! Paths are slash-delimited. Leading and trailing slashes are ignored, so
//! `"/tickets/"` and `"tickets"` name the same folder. The empty path is the
//! root folder.

use crate::error::{FeedError, Result};

/// Canonical form of a folder path.
///
/// Rejects empty segments (`"a//b"`) and relative segments (`"."`, `".."`).
pub fn normalize(folder: &str) -> Result<String> {
    let trimmed = folder.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }

    for segment in trimmed.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(FeedError::InvalidFolder(folder.to_string()));
        }
    }

    Ok(trimmed.to_string())
}

/// Whether `target` is `ancestor` or lies below it.
pub fn is_within(target: &str, ancestor: &str) -> bool {
    let target = target.trim_matches('/');
    let ancestor = ancestor.trim_matches('/');

    if ancestor.is_empty() || target == ancestor {
        return true;
    }

    target
        .strip_prefix(ancestor)
        .map_or(false, |rest| rest.starts_with('/'))
}
