//! Detects whether the local checkout is behind its upstream branch

use chrono::{DateTime, Local};
use std::path::Path;
use tracing::info;

use super::git::GitRunner;
use super::{UpdateError, Upstream};

/// Result of one update check. Recomputed every time; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStatus {
    pub commits_behind: u32,
    pub checked_at: DateTime<Local>,
}

impl UpdateStatus {
    pub fn is_behind(&self) -> bool {
        self.commits_behind > 0
    }
}

pub struct UpdateChecker<G> {
    git: G,
    upstream: Upstream,
}

impl<G: GitRunner> UpdateChecker<G> {
    pub fn new(git: G, upstream: Upstream) -> Self {
        Self { git, upstream }
    }

    /// Fetch remote refs, then count commits on the tracking branch that
    /// `HEAD` does not have. Blocks until both git commands finish.
    pub fn check(&self, repository_root: &Path) -> Result<UpdateStatus, UpdateError> {
        let fetch = self
            .git
            .git(repository_root, &["fetch", &self.upstream.remote])
            .map_err(|e| UpdateError::Fetch {
                output: e.to_string(),
            })?;
        if !fetch.success {
            return Err(UpdateError::Fetch {
                output: fetch.message(),
            });
        }

        let range = format!("HEAD..{}", self.upstream.tracking_ref());
        let count = self
            .git
            .git(repository_root, &["rev-list", "--count", &range])
            .map_err(|e| UpdateError::Compare {
                output: e.to_string(),
            })?;
        if !count.success {
            return Err(UpdateError::Compare {
                output: count.message(),
            });
        }

        let commits_behind = count
            .stdout
            .trim()
            .parse::<u32>()
            .map_err(|_| UpdateError::Compare {
                output: format!("unexpected rev-list output: {:?}", count.stdout.trim()),
            })?;

        info!(commits_behind, upstream = %self.upstream.tracking_ref(), "update check complete");
        Ok(UpdateStatus {
            commits_behind,
            checked_at: Local::now(),
        })
    }
}
