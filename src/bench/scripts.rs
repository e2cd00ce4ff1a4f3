//! Test script discovery

use anyhow::{bail, Result};
use std::path::Path;
use walkdir::WalkDir;

/// List runnable scripts directly inside `dir`, sorted by name.
///
/// Only regular files ending in `.<extension>` are kept, minus the names in
/// `exclude` (support modules that are imported by tests, not run).
pub fn list_scripts(dir: &Path, extension: &str, exclude: &[String]) -> Result<Vec<String>> {
    if !dir.is_dir() {
        bail!("{} not found", dir.display());
    }

    let mut scripts: Vec<String> = WalkDir::new(dir)
        .follow_links(true)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .is_some_and(|ext| ext == extension)
        })
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| !exclude.iter().any(|ex| ex == name))
        .collect();

    scripts.sort();
    Ok(scripts)
}
