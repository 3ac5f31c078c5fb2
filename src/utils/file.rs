// Event-log file discovery

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// File utilities for locating event logs
pub struct FileUtils;

impl FileUtils {
    /// Collect all `.ndjson` event logs under a directory, in path order
    pub fn collect_event_logs(path: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();

        if path.is_file() {
            if Self::is_event_log(path) {
                files.push(path.to_path_buf());
            }
        } else if path.is_dir() {
            let walker = walkdir::WalkDir::new(path).into_iter().filter_entry(|e| {
                // Always include the root directory itself, even if it starts with '.'
                if e.depth() == 0 {
                    return true;
                }
                !e.file_name().to_string_lossy().starts_with('.')
            });

            for entry in walker.flatten() {
                if entry.file_type().is_file() && Self::is_event_log(entry.path()) {
                    files.push(entry.path().to_path_buf());
                }
            }
        }

        files.sort();
        files
    }

    /// Check if file has the .ndjson extension
    pub fn is_event_log(path: &Path) -> bool {
        path.extension().is_some_and(|e| e == "ndjson")
    }

    /// Resolve `path` against the current directory without touching the filesystem
    pub fn absolute(path: &Path) -> Result<PathBuf> {
        std::path::absolute(path)
            .with_context(|| format!("Failed to resolve path: {}", path.display()))
    }

    /// Resolve the event logs named by a CLI path: a single file, or every log under a directory
    pub fn resolve_event_logs(path: &Path) -> Result<Vec<PathBuf>> {
        let path = Self::absolute(path)?;
        if !path.exists() {
            anyhow::bail!("Event log path '{}' does not exist.", path.display());
        }
        if path.is_file() {
            return Ok(vec![path]);
        }

        let logs = Self::collect_event_logs(&path);
        if logs.is_empty() {
            anyhow::bail!("No .ndjson event logs found under '{}'", path.display());
        }
        Ok(logs)
    }
}
