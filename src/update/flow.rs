//! Startup update state machine
//!
//! `Idle -> Fetching -> {UpToDate | Behind} -> Pulling -> {Pulled | PullFailed}
//! -> AwaitingConfirmation -> {Restarting | Deferred}`, plus `FetchFailed` and
//! `CompareFailed` when the check itself fails.
//!
//! Everything here blocks. It is only called from the pre-UI startup phase
//! in `main`, before the terminal is switched into raw mode.

use std::ffi::OsString;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;
use tracing::{error, info, warn};

use super::applier::{RestartRequest, UpdateApplier};
use super::checker::UpdateChecker;
use super::git::{GitRunner, SystemGit};
use super::restart::restart;
use super::{UpdateError, Upstream};
use crate::core::UpdateConfig;

const ERROR_TITLE: &str = "Update Error";

/// States of the startup update flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdatePhase {
    Idle,
    Fetching,
    FetchFailed(String),
    CompareFailed(String),
    UpToDate,
    Behind(u32),
    Pulling,
    Pulled,
    PullFailed(String),
    AwaitingConfirmation,
    Restarting,
    Deferred,
}

impl UpdatePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UpdatePhase::UpToDate
                | UpdatePhase::FetchFailed(_)
                | UpdatePhase::CompareFailed(_)
                | UpdatePhase::PullFailed(_)
                | UpdatePhase::Deferred
                | UpdatePhase::Restarting
        )
    }

    /// One-line summary for the status bar
    pub fn summary(&self) -> String {
        match self {
            UpdatePhase::Idle => "Update check skipped".to_string(),
            UpdatePhase::Fetching => "Checking for updates".to_string(),
            UpdatePhase::FetchFailed(_) | UpdatePhase::CompareFailed(_) => {
                "Update check failed".to_string()
            }
            UpdatePhase::UpToDate => "Up to date".to_string(),
            UpdatePhase::Behind(n) => format!("{n} update(s) available"),
            UpdatePhase::Pulling => "Pulling updates".to_string(),
            UpdatePhase::Pulled | UpdatePhase::AwaitingConfirmation => {
                "Updates pulled".to_string()
            }
            UpdatePhase::PullFailed(_) => "Update pull failed".to_string(),
            UpdatePhase::Restarting => "Restarting".to_string(),
            UpdatePhase::Deferred => "Updates pulled, restart pending".to_string(),
        }
    }
}

/// Operator interaction for the startup phase
pub trait Prompter {
    /// Show a message and wait until it is acknowledged
    fn notify(&mut self, title: &str, message: &str);
    /// Ask a yes/no question
    fn confirm(&mut self, title: &str, message: &str) -> bool;
}

/// Prompts on stderr/stdin while the terminal is still in cooked mode
pub struct ConsolePrompter<R> {
    input: R,
    interactive: bool,
}

impl ConsolePrompter<io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        let stdin = io::stdin();
        let interactive = stdin.is_terminal();
        Self {
            input: stdin.lock(),
            interactive,
        }
    }
}

impl<R: BufRead> ConsolePrompter<R> {
    pub fn new(input: R, interactive: bool) -> Self {
        Self { input, interactive }
    }

    fn read_answer(&mut self) -> String {
        let mut line = String::new();
        if self.input.read_line(&mut line).is_err() {
            line.clear();
        }
        line.trim().to_lowercase()
    }
}

impl<R: BufRead> Prompter for ConsolePrompter<R> {
    fn notify(&mut self, title: &str, message: &str) {
        eprintln!("[{title}] {message}");
        if self.interactive {
            eprint!("Press Enter to continue...");
            let _ = io::stderr().flush();
            self.read_answer();
        }
    }

    fn confirm(&mut self, title: &str, message: &str) -> bool {
        eprint!("[{title}] {message} [y/N] ");
        let _ = io::stderr().flush();
        if !self.interactive {
            eprintln!();
            return false;
        }
        matches!(self.read_answer().as_str(), "y" | "yes")
    }
}

/// Drives checker and applier through the phases, recording each one
pub struct UpdateFlow<G> {
    git: G,
    upstream: Upstream,
    notify_up_to_date: bool,
    phases: Vec<UpdatePhase>,
}

impl<G: GitRunner> UpdateFlow<G> {
    pub fn new(git: G, upstream: Upstream) -> Self {
        Self {
            git,
            upstream,
            notify_up_to_date: false,
            phases: vec![UpdatePhase::Idle],
        }
    }

    pub fn notify_up_to_date(mut self, enabled: bool) -> Self {
        self.notify_up_to_date = enabled;
        self
    }

    /// Every phase entered so far, starting with `Idle`
    pub fn phases(&self) -> &[UpdatePhase] {
        &self.phases
    }

    pub fn phase(&self) -> &UpdatePhase {
        // Never empty: starts with Idle
        &self.phases[self.phases.len() - 1]
    }

    /// Run to a terminal phase. Failures are reported through `prompter`.
    pub fn run(&mut self, repository_root: &Path, prompter: &mut dyn Prompter) -> UpdatePhase {
        self.enter(UpdatePhase::Fetching);
        let checker = UpdateChecker::new(&self.git, self.upstream.clone());
        let status = match checker.check(repository_root) {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "update check failed");
                prompter.notify(ERROR_TITLE, &e.to_string());
                let phase = match e {
                    UpdateError::Fetch { output } => UpdatePhase::FetchFailed(output),
                    other => UpdatePhase::CompareFailed(other.output().to_string()),
                };
                return self.enter(phase);
            }
        };

        if !status.is_behind() {
            if self.notify_up_to_date {
                prompter.notify("No Updates", "No updates found. You are on the latest version.");
            }
            return self.enter(UpdatePhase::UpToDate);
        }
        self.enter(UpdatePhase::Behind(status.commits_behind));

        self.enter(UpdatePhase::Pulling);
        let applier = UpdateApplier::new(&self.git, self.upstream.clone());
        let request = match applier.apply(repository_root) {
            Ok(request) => request,
            Err(e) => {
                error!(error = %e, "update pull failed");
                prompter.notify(ERROR_TITLE, &e.to_string());
                return self.enter(UpdatePhase::PullFailed(e.output().to_string()));
            }
        };
        self.enter(UpdatePhase::Pulled);

        self.enter(UpdatePhase::AwaitingConfirmation);
        let confirmed = prompter.confirm(
            "Updates Applied",
            "Updates have been applied. The application needs to restart. Restart now?",
        );
        match request.resolve(confirmed) {
            RestartRequest::Restart => self.enter(UpdatePhase::Restarting),
            _ => self.enter(UpdatePhase::Deferred),
        }
    }

    fn enter(&mut self, phase: UpdatePhase) -> UpdatePhase {
        info!(?phase, "update phase");
        self.phases.push(phase.clone());
        phase
    }
}

/// The pre-UI startup phase: check, pull, and restart if the operator agrees.
///
/// Returns the terminal phase when the program keeps running. A failed
/// restart is reported and the old image carries on with the new files on disk.
pub fn run_startup_phase(
    repository_root: &Path,
    config: &UpdateConfig,
    original_argv: &[OsString],
    prompter: &mut dyn Prompter,
) -> UpdatePhase {
    let mut flow = UpdateFlow::new(SystemGit::new(config.git.clone()), Upstream::from(config))
        .notify_up_to_date(config.notify_up_to_date);

    let phase = flow.run(repository_root, prompter);
    if phase != UpdatePhase::Restarting {
        return phase;
    }

    match restart(original_argv) {
        Ok(never) => match never {},
        Err(e) => {
            error!(error = %e, "restart failed");
            prompter.notify(
                "Restart Error",
                &format!(
                    "{e}\nThe update is installed but this session is still running \
                     the old version. Restart manually to load it."
                ),
            );
            UpdatePhase::Deferred
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::CommandOutput;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Answers git subcommands from a table and records every call
    #[derive(Default)]
    struct ScriptedGit {
        replies: HashMap<&'static str, CommandOutput>,
        calls: RefCell<Vec<String>>,
    }

    impl ScriptedGit {
        fn reply(
            mut self,
            subcommand: &'static str,
            success: bool,
            stdout: &str,
            stderr: &str,
        ) -> Self {
            self.replies.insert(
                subcommand,
                CommandOutput {
                    success,
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                },
            );
            self
        }

        fn called(&self, subcommand: &str) -> bool {
            self.calls.borrow().iter().any(|c| c.starts_with(subcommand))
        }
    }

    impl GitRunner for ScriptedGit {
        fn git(&self, _repo: &Path, args: &[&str]) -> io::Result<CommandOutput> {
            self.calls.borrow_mut().push(args.join(" "));
            self.replies
                .get(args[0])
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "unscripted git call"))
        }
    }

    #[derive(Default)]
    struct RecordingPrompter {
        answer: bool,
        notices: Vec<(String, String)>,
        questions: usize,
    }

    impl Prompter for RecordingPrompter {
        fn notify(&mut self, title: &str, message: &str) {
            self.notices.push((title.to_string(), message.to_string()));
        }

        fn confirm(&mut self, _title: &str, _message: &str) -> bool {
            self.questions += 1;
            self.answer
        }
    }

    fn repo() -> &'static Path {
        Path::new("/bench")
    }

    #[test]
    fn test_up_to_date_never_pulls() {
        let git = ScriptedGit::default()
            .reply("fetch", true, "", "")
            .reply("rev-list", true, "0\n", "");
        let mut prompter = RecordingPrompter::default();
        let mut flow = UpdateFlow::new(&git, Upstream::default());

        assert_eq!(flow.run(repo(), &mut prompter), UpdatePhase::UpToDate);
        assert!(!git.called("pull"));
        assert!(prompter.notices.is_empty());
        assert_eq!(prompter.questions, 0);
        assert_eq!(
            flow.phases(),
            &[UpdatePhase::Idle, UpdatePhase::Fetching, UpdatePhase::UpToDate]
        );
    }

    #[test]
    fn test_up_to_date_notice_is_optional() {
        let git = ScriptedGit::default()
            .reply("fetch", true, "", "")
            .reply("rev-list", true, "0\n", "");
        let mut prompter = RecordingPrompter::default();
        let mut flow = UpdateFlow::new(&git, Upstream::default()).notify_up_to_date(true);

        flow.run(repo(), &mut prompter);
        assert_eq!(prompter.notices.len(), 1);
        assert_eq!(prompter.notices[0].0, "No Updates");
    }

    #[test]
    fn test_fetch_failure_surfaces_stderr_and_skips_pull() {
        let git = ScriptedGit::default().reply("fetch", false, "", "network unreachable\n");
        let mut prompter = RecordingPrompter::default();
        let mut flow = UpdateFlow::new(&git, Upstream::default());

        let phase = flow.run(repo(), &mut prompter);
        assert_eq!(phase, UpdatePhase::FetchFailed("network unreachable".to_string()));
        assert!(!git.called("rev-list"));
        assert!(!git.called("pull"));

        let (title, message) = &prompter.notices[0];
        assert_eq!(title, "Update Error");
        assert!(message.contains("network unreachable"), "{message}");
    }

    #[test]
    fn test_compare_failure() {
        let git = ScriptedGit::default()
            .reply("fetch", true, "", "")
            .reply("rev-list", false, "", "fatal: ambiguous argument 'HEAD..origin/main'");
        let mut prompter = RecordingPrompter::default();
        let mut flow = UpdateFlow::new(&git, Upstream::default());

        let phase = flow.run(repo(), &mut prompter);
        assert!(matches!(phase, UpdatePhase::CompareFailed(ref out) if out.contains("ambiguous")));
        assert!(!git.called("pull"));
        assert!(prompter.notices[0].1.starts_with("Git status failed"));
    }

    #[test]
    fn test_unparsable_count_is_compare_failure() {
        let git = ScriptedGit::default()
            .reply("fetch", true, "", "")
            .reply("rev-list", true, "lots\n", "");
        let mut prompter = RecordingPrompter::default();
        let mut flow = UpdateFlow::new(&git, Upstream::default());

        assert!(matches!(flow.run(repo(), &mut prompter), UpdatePhase::CompareFailed(_)));
    }

    #[test]
    fn test_behind_pull_and_confirm_restart() {
        let git = ScriptedGit::default()
            .reply("fetch", true, "", "")
            .reply("rev-list", true, "3\n", "")
            .reply("pull", true, "Fast-forward\n", "");
        let mut prompter = RecordingPrompter {
            answer: true,
            ..Default::default()
        };
        let mut flow = UpdateFlow::new(&git, Upstream::new("upstream", "release"));

        assert_eq!(flow.run(repo(), &mut prompter), UpdatePhase::Restarting);
        assert_eq!(prompter.questions, 1);
        assert_eq!(
            git.calls.borrow().as_slice(),
            &[
                "fetch upstream".to_string(),
                "rev-list --count HEAD..upstream/release".to_string(),
                "pull upstream release".to_string(),
            ]
        );
        assert_eq!(
            flow.phases(),
            &[
                UpdatePhase::Idle,
                UpdatePhase::Fetching,
                UpdatePhase::Behind(3),
                UpdatePhase::Pulling,
                UpdatePhase::Pulled,
                UpdatePhase::AwaitingConfirmation,
                UpdatePhase::Restarting,
            ]
        );
    }

    #[test]
    fn test_declined_restart_is_deferred() {
        let git = ScriptedGit::default()
            .reply("fetch", true, "", "")
            .reply("rev-list", true, "1\n", "")
            .reply("pull", true, "", "");
        let mut prompter = RecordingPrompter::default();
        let mut flow = UpdateFlow::new(&git, Upstream::default());

        assert_eq!(flow.run(repo(), &mut prompter), UpdatePhase::Deferred);
        assert!(flow.phase().is_terminal());
    }

    #[test]
    fn test_pull_failure_never_asks() {
        let git = ScriptedGit::default()
            .reply("fetch", true, "", "")
            .reply("rev-list", true, "2\n", "")
            .reply("pull", false, "", "error: Your local changes would be overwritten");
        let mut prompter = RecordingPrompter {
            answer: true,
            ..Default::default()
        };
        let mut flow = UpdateFlow::new(&git, Upstream::default());

        let phase = flow.run(repo(), &mut prompter);
        assert!(matches!(phase, UpdatePhase::PullFailed(ref out) if out.contains("local changes")));
        assert_eq!(prompter.questions, 0);
        assert!(prompter.notices[0].1.starts_with("Git pull failed"));
    }

    #[test]
    fn test_console_prompter_reads_answer() {
        let mut yes = ConsolePrompter::new(io::Cursor::new(b"y\n".to_vec()), true);
        assert!(yes.confirm("Updates Applied", "Restart now?"));

        let mut no = ConsolePrompter::new(io::Cursor::new(b"\n".to_vec()), true);
        assert!(!no.confirm("Updates Applied", "Restart now?"));

        let mut detached = ConsolePrompter::new(io::Cursor::new(b"y\n".to_vec()), false);
        assert!(!detached.confirm("Updates Applied", "Restart now?"));
    }
}
