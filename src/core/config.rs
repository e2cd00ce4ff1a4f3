//! Configuration management with YAML persistence

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Test script discovery and execution
    #[serde(default)]
    pub scripts: ScriptsConfig,

    /// Report browsing
    #[serde(default)]
    pub reports: ReportsConfig,

    /// Startup self-update
    #[serde(default)]
    pub update: UpdateConfig,

    /// UI preferences
    #[serde(default)]
    pub ui: UiPreferences,
}

/// Where test scripts live and how they are launched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptsConfig {
    /// Scripts directory, relative to the workspace unless absolute
    #[serde(default = "default_scripts_dir")]
    pub dir: PathBuf,

    /// Program used to run each script
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// File extension of runnable scripts (without the dot)
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Support modules that are never listed
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

/// Where JSON test reports are stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    #[serde(default = "default_reports_dir")]
    pub dir: PathBuf,
}

/// Git based self-update settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Check for updates before the UI starts
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// git executable
    #[serde(default = "default_git")]
    pub git: String,

    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    /// Show a notice when the checkout is already current
    #[serde(default)]
    pub notify_up_to_date: bool,
}

/// UI preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiPreferences {
    /// Show timestamps in the output pane
    #[serde(default)]
    pub show_timestamps: bool,

    /// Use plain ASCII icons
    #[serde(default)]
    pub ascii_icons: bool,

    /// Color theme
    #[serde(default)]
    pub theme: Theme,
}

/// Color theme
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("test_programs")
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_extension() -> String {
    "py".to_string()
}

fn default_exclude() -> Vec<String> {
    ["__init__.py", "dwfconstants.py", "Enumerate.py"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_git() -> String {
    "git".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            dir: default_scripts_dir(),
            interpreter: default_interpreter(),
            extension: default_extension(),
            exclude: default_exclude(),
        }
    }
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            dir: default_reports_dir(),
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            git: default_git(),
            remote: default_remote(),
            branch: default_branch(),
            notify_up_to_date: false,
        }
    }
}

impl Default for UiPreferences {
    fn default() -> Self {
        Self {
            show_timestamps: false,
            ascii_icons: false,
            theme: Theme::Dark,
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("benchterm")
            .join("config.yaml")
    }

    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = path.unwrap_or_else(Self::default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let config: Config = serde_yaml::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: Option<PathBuf>) -> Result<()> {
        let path = path.unwrap_or_else(Self::default_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }
}
