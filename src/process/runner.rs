//! Single-slot runner that spawns a script and streams its output

use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ScriptInvocation;
use crate::core::{ExitReport, OutputEvent, RunId, RunnerEvent, StreamKind};

/// Bytes requested per read from a child pipe
const READ_CHUNK: usize = 4096;

/// How long readers may keep draining after a cancelled child was killed
const DRAIN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunnerError {
    #[error("a test is already running ({0})")]
    Busy(RunId),
    #[error("no test is running")]
    NotRunning,
}

/// Owner of the one live child process
#[derive(Debug)]
pub struct ProcessHandle {
    id: RunId,
    cancel_tx: Option<oneshot::Sender<()>>,
    supervisor: JoinHandle<()>,
}

impl ProcessHandle {
    pub fn id(&self) -> RunId {
        self.id
    }
}

/// Runs at most one script at a time.
///
/// Every run produces `Started` (unless the spawn failed), any number of
/// `Output` events and then exactly one `Exited`. The slot stays occupied
/// until the consumer has received that `Exited` event, so a second
/// [`ProcessRunner::run`] can never interleave with pending output.
pub struct ProcessRunner {
    slot: Option<ProcessHandle>,
    event_tx: mpsc::UnboundedSender<RunnerEvent>,
    event_rx: mpsc::UnboundedReceiver<RunnerEvent>,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            slot: None,
            event_tx,
            event_rx,
        }
    }

    /// Start a script. Must be called from within a tokio runtime.
    ///
    /// A spawn failure is not an `Err`: the returned run id receives an
    /// immediate abnormal `Exited` event describing the failure.
    pub fn run(&mut self, invocation: ScriptInvocation) -> Result<RunId, RunnerError> {
        if let Some(active) = &self.slot {
            return Err(RunnerError::Busy(active.id));
        }

        let id = Uuid::new_v4();
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own group, so a cancel also reaches anything the script started
        #[cfg(unix)]
        command.process_group(0);

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(run = %id, program = %invocation.program, error = %e, "spawn failed");
                let report = ExitReport::abnormal(format!(
                    "failed to start {}: {}",
                    invocation.program, e
                ));
                let _ = self.event_tx.send(RunnerEvent::Exited { id, report });
                return Ok(id);
            }
        };

        let pid = child.id();
        info!(run = %id, pid = ?pid, command = %invocation.command_line(), "script started");
        let _ = self.event_tx.send(RunnerEvent::Started { id, pid });

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let supervisor = tokio::spawn(supervise(id, child, cancel_rx, self.event_tx.clone()));
        self.slot = Some(ProcessHandle {
            id,
            cancel_tx: Some(cancel_tx),
            supervisor,
        });

        Ok(id)
    }

    /// Ask the running child to terminate.
    ///
    /// The run still ends with its own `Exited` event, carrying the
    /// abnormal status. Repeated calls before that event are no-ops.
    pub fn cancel(&mut self) -> Result<RunId, RunnerError> {
        let handle = self.slot.as_mut().ok_or(RunnerError::NotRunning)?;
        if let Some(cancel_tx) = handle.cancel_tx.take() {
            info!(run = %handle.id, "cancelling script");
            let _ = cancel_tx.send(());
        }
        Ok(handle.id)
    }

    pub fn is_busy(&self) -> bool {
        self.slot.is_some()
    }

    pub fn active_run(&self) -> Option<RunId> {
        self.slot.as_ref().map(ProcessHandle::id)
    }

    /// Non-blocking receive, for the UI tick
    pub fn try_next_event(&mut self) -> Option<RunnerEvent> {
        let event = self.event_rx.try_recv().ok()?;
        self.observe(&event);
        Some(event)
    }

    /// Wait for the next event
    pub async fn next_event(&mut self) -> Option<RunnerEvent> {
        let event = self.event_rx.recv().await?;
        self.observe(&event);
        Some(event)
    }

    fn observe(&mut self, event: &RunnerEvent) {
        if let RunnerEvent::Exited { id, .. } = event {
            if self.slot.as_ref().is_some_and(|h| h.id == *id) {
                self.slot = None;
            }
        }
    }
}

impl Drop for ProcessRunner {
    fn drop(&mut self) {
        if let Some(handle) = self.slot.take() {
            // Dropping the child inside the task kills it
            handle.supervisor.abort();
        }
    }
}

/// Owns the child until it exits, then reports once both pipes are drained.
///
/// Cancellation is honoured while waiting for the child and while draining
/// its pipes, which a background grandchild may keep open after the child
/// itself has exited.
async fn supervise(
    id: RunId,
    mut child: Child,
    cancel_rx: oneshot::Receiver<()>,
    tx: mpsc::UnboundedSender<RunnerEvent>,
) {
    let group = child.id();
    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(tokio::spawn(pump(id, StreamKind::Stdout, stdout, tx.clone())));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(tokio::spawn(pump(id, StreamKind::Stderr, stderr, tx.clone())));
    }

    // Resolves only on an explicit cancel, never on a dropped sender
    let cancel = async move {
        if cancel_rx.await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    tokio::pin!(cancel);

    let mut cancelled = false;
    let waited = tokio::select! {
        status = child.wait() => status,
        _ = &mut cancel => {
            cancelled = true;
            kill_tree(id, &mut child, group);
            child.wait().await
        }
    };

    if !cancelled {
        let drain = async {
            for reader in &mut readers {
                let _ = reader.await;
            }
        };
        tokio::select! {
            _ = drain => {}
            _ = &mut cancel => {
                cancelled = true;
                kill_tree(id, &mut child, group);
            }
        }
    }

    if cancelled {
        let drain = async {
            for reader in &mut readers {
                let _ = reader.await;
            }
        };
        if tokio::time::timeout(DRAIN_GRACE, drain).await.is_err() {
            debug!(run = %id, "output still open after cancel, detaching readers");
            for reader in &readers {
                reader.abort();
            }
        }
    }

    let report = if cancelled {
        ExitReport::abnormal("cancelled")
    } else {
        match waited {
            Ok(status) => report_from_status(status),
            Err(e) => ExitReport::abnormal(format!("failed to wait for child: {e}")),
        }
    };
    info!(run = %id, report = ?report, "script exited");
    let _ = tx.send(RunnerEvent::Exited { id, report });
}

/// Kill the child and every process left in its group
fn kill_tree(id: RunId, child: &mut Child, group: Option<u32>) {
    if let Err(e) = child.start_kill() {
        // Already reaped when only a grandchild is left
        debug!(run = %id, error = %e, "child kill failed");
    }
    kill_group(id, group);
}

#[cfg(unix)]
fn kill_group(id: RunId, group: Option<u32>) {
    let Some(pgid) = group.and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
        return;
    };
    // SAFETY: killpg takes no pointers; a stale group id only yields ESRCH
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        let error = std::io::Error::last_os_error();
        debug!(run = %id, pgid, error = %error, "group kill failed");
    }
}

#[cfg(not(unix))]
fn kill_group(_id: RunId, _group: Option<u32>) {}

/// Forward chunks from one pipe as soon as they are read
async fn pump<R>(
    id: RunId,
    stream: StreamKind,
    mut reader: R,
    tx: mpsc::UnboundedSender<RunnerEvent>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    let mut seq = 0;
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let event = OutputEvent {
                    stream,
                    payload: buf[..n].to_vec(),
                    seq,
                };
                seq += 1;
                if tx.send(RunnerEvent::Output { id, event }).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(run = %id, stream = stream.as_str(), error = %e, "read failed");
                break;
            }
        }
    }
}

fn report_from_status(status: std::process::ExitStatus) -> ExitReport {
    if let Some(code) = status.code() {
        return ExitReport::code(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ExitReport::abnormal(format!("terminated by signal {signal}"));
        }
    }
    ExitReport::abnormal("terminated abnormally")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::{ExitStatus, LineSource, OutputSink};
    use tempfile::tempdir;

    fn sh(script: &str, dir: &std::path::Path) -> ScriptInvocation {
        ScriptInvocation::new("sh", vec!["-c".to_string(), script.to_string()], dir)
    }

    /// Drain events for `id` until its exit, collecting output into a sink
    async fn collect(
        runner: &mut ProcessRunner,
        id: RunId,
    ) -> (OutputSink, ExitReport, Vec<RunnerEvent>) {
        let mut sink = OutputSink::new();
        let mut seen = Vec::new();
        let result = tokio::time::timeout(Duration::from_secs(20), async {
            loop {
                let event = runner.next_event().await.expect("channel open");
                assert_eq!(event.run_id(), id);
                seen.push(event.clone());
                match event {
                    RunnerEvent::Output { event, .. } => {
                        sink.append(&event);
                    }
                    RunnerEvent::Exited { report, .. } => return report,
                    RunnerEvent::Started { .. } => {}
                }
            }
        })
        .await
        .expect("run finished in time");
        sink.flush();
        (sink, result, seen)
    }

    #[tokio::test]
    async fn test_stdout_order_and_exit_last() {
        let dir = tempdir().unwrap();
        let mut runner = ProcessRunner::new();
        let id = runner
            .run(sh("for i in 1 2 3 4 5; do echo L$i; done", dir.path()))
            .unwrap();

        let (sink, report, seen) = collect(&mut runner, id).await;
        assert_eq!(sink.content_of(LineSource::Stdout), vec!["L1", "L2", "L3", "L4", "L5"]);
        assert_eq!(report, ExitReport::code(0));
        assert!(matches!(seen.first(), Some(RunnerEvent::Started { .. })));
        assert!(matches!(seen.last(), Some(RunnerEvent::Exited { .. })));
        assert!(!runner.is_busy());
    }

    #[tokio::test]
    async fn test_exit_codes_pass_through() {
        let dir = tempdir().unwrap();
        let mut runner = ProcessRunner::new();

        let id = runner.run(sh("exit 0", dir.path())).unwrap();
        let (_, report, _) = collect(&mut runner, id).await;
        assert_eq!(report.exit_code(), Some(0));

        let id = runner.run(sh("echo failing >&2; exit 7", dir.path())).unwrap();
        let (sink, report, _) = collect(&mut runner, id).await;
        assert_eq!(report.exit_code(), Some(7));
        assert_eq!(sink.content_of(LineSource::Stderr), vec!["failing"]);
    }

    #[tokio::test]
    async fn test_signal_death_is_abnormal() {
        let dir = tempdir().unwrap();
        let mut runner = ProcessRunner::new();
        let id = runner.run(sh("kill -9 $$", dir.path())).unwrap();

        let (_, report, _) = collect(&mut runner, id).await;
        assert_eq!(report.status, ExitStatus::Abnormal);
        assert_eq!(report.exit_code(), None);
        assert_eq!(report.detail.as_deref(), Some("terminated by signal 9"));
    }

    #[tokio::test]
    async fn test_spawn_failure_reports_abnormal() {
        let dir = tempdir().unwrap();
        let mut runner = ProcessRunner::new();
        let inv = ScriptInvocation::new("/nonexistent/benchterm-missing", vec![], dir.path());
        let id = runner.run(inv).unwrap();
        assert!(!runner.is_busy());

        let (sink, report, seen) = collect(&mut runner, id).await;
        assert_eq!(seen.len(), 1);
        assert!(sink.is_empty());
        assert_eq!(report.status, ExitStatus::Abnormal);
        let detail = report.detail.unwrap();
        assert!(detail.starts_with("failed to start /nonexistent/benchterm-missing"), "{detail}");
    }

    #[tokio::test]
    async fn test_working_directory_is_used() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here\n").unwrap();
        let mut runner = ProcessRunner::new();
        let id = runner.run(sh("cat marker.txt", dir.path())).unwrap();

        let (sink, report, _) = collect(&mut runner, id).await;
        assert!(report.is_success());
        assert_eq!(sink.content_of(LineSource::Stdout), vec!["here"]);
    }

    #[tokio::test]
    async fn test_second_run_rejected_while_busy() {
        let dir = tempdir().unwrap();
        let mut runner = ProcessRunner::new();
        let first = runner
            .run(sh("echo one; sleep 0.3; echo two", dir.path()))
            .unwrap();

        let second = runner.run(sh("echo intruder", dir.path()));
        assert_eq!(second, Err(RunnerError::Busy(first)));
        assert_eq!(runner.active_run(), Some(first));

        let (sink, report, _) = collect(&mut runner, first).await;
        assert_eq!(sink.content_of(LineSource::Stdout), vec!["one", "two"]);
        assert!(report.is_success());

        let third = runner.run(sh("echo again", dir.path())).unwrap();
        let (sink, _, _) = collect(&mut runner, third).await;
        assert_eq!(sink.content_of(LineSource::Stdout), vec!["again"]);
    }

    #[tokio::test]
    async fn test_cancel_delivers_single_abnormal_exit() {
        let dir = tempdir().unwrap();
        let mut runner = ProcessRunner::new();
        assert_eq!(runner.cancel(), Err(RunnerError::NotRunning));

        let id = runner.run(sh("echo start; exec sleep 30", dir.path())).unwrap();

        // Wait until the script is demonstrably running
        loop {
            match runner.next_event().await.unwrap() {
                RunnerEvent::Output { .. } => break,
                RunnerEvent::Exited { .. } => panic!("exited before cancel"),
                RunnerEvent::Started { .. } => {}
            }
        }
        assert_eq!(runner.cancel(), Ok(id));
        assert_eq!(runner.cancel(), Ok(id));

        let (_, report, seen) = collect(&mut runner, id).await;
        assert_eq!(report, ExitReport::abnormal("cancelled"));
        let exits = seen
            .iter()
            .filter(|e| matches!(e, RunnerEvent::Exited { .. }))
            .count();
        assert_eq!(exits, 1);
        assert_eq!(runner.cancel(), Err(RunnerError::NotRunning));
    }

    #[tokio::test]
    async fn test_cancel_after_child_exit_with_background_holder() {
        let dir = tempdir().unwrap();
        let mut runner = ProcessRunner::new();
        let id = runner.run(sh("(sleep 10) & echo hi", dir.path())).unwrap();

        // The shell exits at once; the background sleep keeps the pipes open
        loop {
            match runner.next_event().await.unwrap() {
                RunnerEvent::Output { .. } => break,
                RunnerEvent::Exited { .. } => panic!("exited while pipes were open"),
                RunnerEvent::Started { .. } => {}
            }
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(runner.is_busy());
        assert_eq!(runner.cancel(), Ok(id));

        let report = tokio::time::timeout(Duration::from_secs(4), async {
            loop {
                if let Some(RunnerEvent::Exited { report, .. }) = runner.next_event().await {
                    return report;
                }
            }
        })
        .await
        .expect("exit reported after cancel");
        assert_eq!(report, ExitReport::abnormal("cancelled"));
        assert!(!runner.is_busy());

        let next = runner.run(sh("echo next", dir.path())).unwrap();
        let (sink, report, _) = collect(&mut runner, next).await;
        assert_eq!(sink.content_of(LineSource::Stdout), vec!["next"]);
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_large_output_fully_drained_before_exit() {
        let dir = tempdir().unwrap();
        let mut runner = ProcessRunner::new();
        let id = runner
            .run(sh("i=0; while [ $i -lt 2000 ]; do echo line$i; i=$((i+1)); done", dir.path()))
            .unwrap();

        let (sink, report, _) = collect(&mut runner, id).await;
        let lines = sink.content_of(LineSource::Stdout);
        assert_eq!(lines.len(), 2000);
        assert_eq!(lines[0], "line0");
        assert_eq!(lines[1999], "line1999");
        assert!(report.is_success());
    }
}
