//! Git based self-update
//!
//! Runs once, synchronously, before the terminal UI starts: fetch, count
//! commits behind upstream, pull, then offer to restart the program.

mod applier;
mod checker;
mod flow;
mod git;
mod restart;

pub use applier::*;
pub use checker::*;
pub use flow::*;
pub use git::*;
pub use restart::*;

use thiserror::Error;

use crate::core::UpdateConfig;

/// Version-control failures, each carrying the captured command output
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpdateError {
    #[error("Git fetch failed:\n{output}")]
    Fetch { output: String },
    #[error("Git status failed:\n{output}")]
    Compare { output: String },
    #[error("Git pull failed:\n{output}")]
    Pull { output: String },
}

impl UpdateError {
    /// The captured output, without the step prefix
    pub fn output(&self) -> &str {
        match self {
            UpdateError::Fetch { output }
            | UpdateError::Compare { output }
            | UpdateError::Pull { output } => output,
        }
    }
}

/// Remote and branch to follow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    pub remote: String,
    pub branch: String,
}

impl Upstream {
    pub fn new(remote: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            branch: branch.into(),
        }
    }

    /// e.g. `origin/main`
    pub fn tracking_ref(&self) -> String {
        format!("{}/{}", self.remote, self.branch)
    }
}

impl Default for Upstream {
    fn default() -> Self {
        Self::new("origin", "main")
    }
}

impl From<&UpdateConfig> for Upstream {
    fn from(config: &UpdateConfig) -> Self {
        Self::new(config.remote.clone(), config.branch.clone())
    }
}
