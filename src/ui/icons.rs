//! Icon system using Unicode characters
//!
//! Provides consistent iconography throughout the UI.

use std::sync::RwLock;

use crate::process::RunStatus;

/// Icon set for the application
#[derive(Debug, Clone)]
pub struct Icons {
    // Status indicators
    pub running: &'static str,
    pub pending: &'static str,
    pub success: &'static str,
    pub error: &'static str,
    pub warning: &'static str,

    // Items
    pub script: &'static str,
    pub report: &'static str,
    pub folder: &'static str,
    pub update: &'static str,

    pub separator: &'static str,
    pub highlight: &'static str,
}

impl Icons {
    /// Unicode icon set (default)
    pub fn unicode() -> Self {
        Self {
            running: "●",
            pending: "◐",
            success: "✓",
            error: "✗",
            warning: "⚠",

            script: "▶",
            report: "▣",
            folder: "▬",
            update: "⟲",

            separator: "›",
            highlight: "❯ ",
        }
    }

    /// ASCII fallback for limited terminals
    pub fn ascii() -> Self {
        Self {
            running: "*",
            pending: "~",
            success: "+",
            error: "x",
            warning: "!",

            script: ">",
            report: "[R]",
            folder: "+",
            update: "[u]",

            separator: ">",
            highlight: "> ",
        }
    }

    /// Icon for a run's status: passed, failed or aborted once finished
    pub fn status_icon(&self, status: &RunStatus) -> &'static str {
        match status {
            RunStatus::Starting => self.pending,
            RunStatus::Running => self.running,
            RunStatus::Finished(report) if report.is_success() => self.success,
            RunStatus::Finished(report) if report.exit_code().is_some() => self.warning,
            RunStatus::Finished(_) => self.error,
        }
    }
}

impl Default for Icons {
    fn default() -> Self {
        Self::unicode()
    }
}

static CURRENT_ICONS: RwLock<Option<Icons>> = RwLock::new(None);

/// Get the current icon set
pub fn current() -> Icons {
    CURRENT_ICONS
        .read()
        .ok()
        .and_then(|icons| icons.clone())
        .unwrap_or_default()
}

pub fn set_icons(icons: Icons) {
    if let Ok(mut current) = CURRENT_ICONS.write() {
        *current = Some(icons);
    }
}
