//! Source tree discovery

use std::io;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Directory names never descended into
pub const SKIPPED_DIRECTORIES: [&str; 8] = [
    "__pycache__",
    "venv",
    ".venv",
    "env",
    "node_modules",
    "site-packages",
    "build",
    "dist",
];

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRECTORIES.contains(&name.as_ref())
}

fn is_python_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "py")
}

/// List the Python files to scan, sorted by path
///
/// A file root yields itself regardless of extension. Entries that cannot be read
/// during the walk are logged and skipped.
pub fn discover(root: &Path) -> io::Result<Vec<PathBuf>> {
    let metadata = std::fs::metadata(root)?;
    if metadata.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_skipped_dir(entry))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_python_file(entry.path()))
        .map(DirEntry::into_path)
        .collect();

    files.sort();
    tracing::debug!(root = %root.display(), files = files.len(), "Discovered source files");
    Ok(files)
}
