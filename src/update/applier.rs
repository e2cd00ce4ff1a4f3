//! Pulls upstream changes into the local checkout

use std::path::Path;
use tracing::info;

use super::git::GitRunner;
use super::{UpdateError, Upstream};

/// What to do with the process after an update was pulled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartRequest {
    /// Pulled; the operator has not been asked yet
    AskOperator,
    Restart,
    Defer,
}

impl RestartRequest {
    /// Settle a pending request with the operator's answer
    pub fn resolve(self, confirmed: bool) -> Self {
        match self {
            RestartRequest::AskOperator if confirmed => RestartRequest::Restart,
            RestartRequest::AskOperator => RestartRequest::Defer,
            settled => settled,
        }
    }
}

pub struct UpdateApplier<G> {
    git: G,
    upstream: Upstream,
}

impl<G: GitRunner> UpdateApplier<G> {
    pub fn new(git: G, upstream: Upstream) -> Self {
        Self { git, upstream }
    }

    /// Pull the upstream branch. Never restarts anything itself.
    pub fn apply(&self, repository_root: &Path) -> Result<RestartRequest, UpdateError> {
        let pull = self
            .git
            .git(
                repository_root,
                &["pull", &self.upstream.remote, &self.upstream.branch],
            )
            .map_err(|e| UpdateError::Pull {
                output: e.to_string(),
            })?;
        if !pull.success {
            return Err(UpdateError::Pull {
                output: pull.message(),
            });
        }

        info!(upstream = %self.upstream.tracking_ref(), "update pulled");
        Ok(RestartRequest::AskOperator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        assert_eq!(RestartRequest::AskOperator.resolve(true), RestartRequest::Restart);
        assert_eq!(RestartRequest::AskOperator.resolve(false), RestartRequest::Defer);
        assert_eq!(RestartRequest::Defer.resolve(true), RestartRequest::Defer);
    }
}
