//! Message types passed from the process runner to the UI loop

use uuid::Uuid;

/// Unique identifier for one script run
pub type RunId = Uuid;

/// Which pipe a chunk of output arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

/// One chunk of raw bytes read from a child's stdout or stderr.
///
/// `seq` counts chunks per stream, starting at zero. There is no ordering
/// relation between a stdout event and a stderr event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputEvent {
    pub stream: StreamKind,
    pub payload: Vec<u8>,
    pub seq: u64,
}

/// How a child process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    /// Clean exit with the child's own exit code
    Code(i32),
    /// Killed by a signal, crashed, cancelled or never started
    Abnormal,
}

/// Terminal status of one run, delivered exactly once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    pub status: ExitStatus,
    /// Extra context for abnormal endings (signal, spawn error, ...)
    pub detail: Option<String>,
}

impl ExitReport {
    pub fn code(code: i32) -> Self {
        Self {
            status: ExitStatus::Code(code),
            detail: None,
        }
    }

    pub fn abnormal(detail: impl Into<String>) -> Self {
        Self {
            status: ExitStatus::Abnormal,
            detail: Some(detail.into()),
        }
    }

    /// The raw exit code, if the child exited on its own
    pub fn exit_code(&self) -> Option<i32> {
        match self.status {
            ExitStatus::Code(code) => Some(code),
            ExitStatus::Abnormal => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == Some(0)
    }

    /// Line appended to the output pane when the run is over
    pub fn summary(&self) -> String {
        match (&self.status, &self.detail) {
            (ExitStatus::Code(code), _) => format!("Test finished with exit code: {code}"),
            (ExitStatus::Abnormal, Some(detail)) => {
                format!("Test terminated abnormally: {detail}")
            }
            (ExitStatus::Abnormal, None) => "Test terminated abnormally".to_string(),
        }
    }
}

/// Events emitted by the process runner
#[derive(Debug, Clone)]
pub enum RunnerEvent {
    /// Child process is alive
    Started { id: RunId, pid: Option<u32> },
    /// Child produced output
    Output { id: RunId, event: OutputEvent },
    /// Child is gone; always the last event of a run
    Exited { id: RunId, report: ExitReport },
}

impl RunnerEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            RunnerEvent::Started { id, .. }
            | RunnerEvent::Output { id, .. }
            | RunnerEvent::Exited { id, .. } => *id,
        }
    }
}
