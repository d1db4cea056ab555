//! Workflow file discovery.

use std::path::{Path, PathBuf};

use crate::error::DocError;

/// Files matching `pattern` (relative to `workspace` unless absolute), sorted.
pub fn discover_workflows(workspace: &Path, pattern: &str) -> Result<Vec<PathBuf>, DocError> {
    let full_pattern = if Path::new(pattern).is_absolute() {
        pattern.to_string()
    } else {
        workspace.join(pattern).to_string_lossy().to_string()
    };

    let entries = glob::glob(&full_pattern)
        .map_err(|e| DocError::Config(format!("Invalid workflow pattern '{}': {}", pattern, e)))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("[Discovery] Skipping unreadable path: {}", e);
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files.dedup();

    tracing::info!("[Discovery] Found {} workflow file(s) matching '{}'", files.len(), full_pattern);
    Ok(files)
}
