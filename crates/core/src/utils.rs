//! Utility functions

use sha2::{Digest, Sha256};
use std::path::Path;
use walkdir::WalkDir;

/// SHA256 over the relative paths and contents of every file below `root`
///
/// Build output (`target`) and hidden entries are skipped. Entries are visited
/// in file-name order so the hash only depends on the tree's contents.
pub fn hash_source_tree(root: &Path) -> String {
    let mut hasher = Sha256::new();
    let mut file_count = 0;

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || {
                let name = e.file_name().to_string_lossy();
                name != "target" && !name.starts_with('.')
            }
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if let Ok(content) = std::fs::read(entry.path()) {
            hasher.update(relative.to_string_lossy().as_bytes());
            hasher.update([0u8]);
            hasher.update(&content);
            file_count += 1;
        }
    }

    tracing::debug!("Calculated source hash from {} files", file_count);
    format!("{:x}", hasher.finalize())
}
