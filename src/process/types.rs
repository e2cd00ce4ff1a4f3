//! Script invocation and run status types

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

use crate::core::{ExitReport, ExitStatus, RunId};

/// A request to run one external program with fixed arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl ScriptInvocation {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: working_dir.into(),
        }
    }

    /// `interpreter <script_name>` run from inside `scripts_dir`
    pub fn for_script(interpreter: &str, scripts_dir: &Path, script_name: &str) -> Self {
        Self::new(interpreter, vec![script_name.to_string()], scripts_dir)
    }

    /// Command line as shown to the operator
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Status of the current script run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// Spawn requested, no Started event yet
    Starting,
    Running,
    Finished(ExitReport),
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Starting => "Starting",
            RunStatus::Running => "Running",
            RunStatus::Finished(report) if report.is_success() => "Passed",
            RunStatus::Finished(report) => match report.status {
                ExitStatus::Code(_) => "Failed",
                ExitStatus::Abnormal => "Aborted",
            },
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, RunStatus::Starting | RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Starting => write!(f, "Starting"),
            RunStatus::Running => write!(f, "Running"),
            RunStatus::Finished(report) => match (&report.status, &report.detail) {
                (ExitStatus::Code(code), _) => write!(f, "Exited ({code})"),
                (ExitStatus::Abnormal, Some(detail)) => write!(f, "Aborted: {detail}"),
                (ExitStatus::Abnormal, None) => write!(f, "Aborted"),
            },
        }
    }
}

/// Book-keeping for the run shown in the launcher
#[derive(Debug, Clone)]
pub struct ScriptRun {
    pub id: RunId,
    /// Script file name
    pub script: String,
    pub invocation: ScriptInvocation,
    pub status: RunStatus,
    pub pid: Option<u32>,
    pub started_at: DateTime<Local>,
    pub ended_at: Option<DateTime<Local>>,
}

impl ScriptRun {
    pub fn new(id: RunId, script: String, invocation: ScriptInvocation) -> Self {
        Self {
            id,
            script,
            invocation,
            status: RunStatus::Starting,
            pid: None,
            started_at: Local::now(),
            ended_at: None,
        }
    }

    pub fn finish(&mut self, report: ExitReport) {
        self.status = RunStatus::Finished(report);
        self.pid = None;
        self.ended_at = Some(Local::now());
    }

    /// Time since start, or total runtime once finished
    pub fn elapsed(&self) -> String {
        let end = self.ended_at.unwrap_or_else(Local::now);
        format_duration(end.signed_duration_since(self.started_at))
    }
}

/// Format a duration as a human-readable string
fn format_duration(duration: chrono::Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_for_script_runs_inside_scripts_dir() {
        let dir = Path::new("/bench/test_programs");
        let inv = ScriptInvocation::for_script("python3", dir, "today.py");
        assert_eq!(inv.program, "python3");
        assert_eq!(inv.args, vec!["today.py".to_string()]);
        assert_eq!(inv.working_dir, PathBuf::from("/bench/test_programs"));
        assert_eq!(inv.command_line(), "python3 today.py");
    }

    #[test]
    fn test_run_status_labels() {
        assert_eq!(RunStatus::Finished(ExitReport::code(0)).as_str(), "Passed");
        assert_eq!(RunStatus::Finished(ExitReport::code(3)).as_str(), "Failed");
        assert_eq!(
            RunStatus::Finished(ExitReport::abnormal("cancelled")).to_string(),
            "Aborted: cancelled"
        );
        assert!(RunStatus::Starting.is_running());
    }

    #[test]
    fn test_finish_clears_pid() {
        let inv = ScriptInvocation::new("sh", vec![], "/tmp");
        let mut run = ScriptRun::new(Uuid::new_v4(), "x.py".into(), inv);
        run.pid = Some(42);
        run.finish(ExitReport::code(1));
        assert_eq!(run.pid, None);
        assert!(run.ended_at.is_some());
        assert!(!run.status.is_running());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(chrono::Duration::seconds(5)), "5s");
        assert_eq!(format_duration(chrono::Duration::seconds(65)), "1m 5s");
        assert_eq!(format_duration(chrono::Duration::seconds(3725)), "1h 2m 5s");
    }
}
