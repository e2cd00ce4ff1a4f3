//! Blocking git invocations used by the startup update check

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Captured result of one git command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Text to show the operator: stderr, or stdout when stderr is empty
    pub fn message(&self) -> String {
        let stderr = self.stderr.trim_end();
        if stderr.is_empty() {
            self.stdout.trim_end().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Something that can run git in a repository
pub trait GitRunner {
    fn git(&self, repo: &Path, args: &[&str]) -> io::Result<CommandOutput>;
}

impl<T: GitRunner + ?Sized> GitRunner for &T {
    fn git(&self, repo: &Path, args: &[&str]) -> io::Result<CommandOutput> {
        (**self).git(repo, args)
    }
}

/// Runs the real git executable
#[derive(Debug, Clone)]
pub struct SystemGit {
    program: String,
}

impl SystemGit {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SystemGit {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitRunner for SystemGit {
    fn git(&self, repo: &Path, args: &[&str]) -> io::Result<CommandOutput> {
        debug!(repo = %repo.display(), ?args, "running {}", self.program);
        let output = Command::new(&self.program)
            .args(args)
            .current_dir(repo)
            .stdin(Stdio::null())
            // Never stall startup on a credential prompt
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_prefers_stderr() {
        let out = CommandOutput {
            success: false,
            stdout: "ignored\n".into(),
            stderr: "fatal: bad thing\n".into(),
        };
        assert_eq!(out.message(), "fatal: bad thing");

        let out = CommandOutput {
            stdout: "only stdout\n".into(),
            ..Default::default()
        };
        assert_eq!(out.message(), "only stdout");
    }

    #[test]
    fn test_missing_git_binary_is_io_error() {
        let git = SystemGit::new("/nonexistent/benchterm-git");
        let dir = tempfile::tempdir().unwrap();
        assert!(git.git(dir.path(), &["status"]).is_err());
    }
}
