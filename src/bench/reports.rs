//! JSON test report browsing

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// The `*.json` files of a reports directory
#[derive(Debug, Clone, Default)]
pub struct ReportIndex {
    dir: PathBuf,
    names: Vec<String>,
}

impl ReportIndex {
    pub fn scan(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            bail!("Reports directory not found.");
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
            let entry = entry?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(".json") {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(Self {
            dir: dir.to_path_buf(),
            names,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Reports whose file name contains `barcode`, ignoring case
    pub fn filter(&self, barcode: &str) -> Vec<&str> {
        let needle = barcode.to_lowercase();
        self.names
            .iter()
            .filter(|name| name.to_lowercase().contains(&needle))
            .map(String::as_str)
            .collect()
    }

    /// Report contents for display; pretty-printed when it is valid JSON
    pub fn load(&self, name: &str) -> Result<String> {
        let path = self.dir.join(name);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(value) => serde_json::to_string_pretty(&value).unwrap_or(content),
            Err(_) => content,
        })
    }
}
