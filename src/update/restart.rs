//! Replaces the running program with a fresh instance of itself

use std::convert::Infallible;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RestartError {
    #[error("cannot locate the running executable: {0}")]
    CurrentExe(#[source] io::Error),
    #[error("failed to restart {}: {source}", .program.display())]
    Exec {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Re-run the current executable with `original_argv` (including argv[0]).
///
/// Only returns on failure, in which case the caller keeps running.
pub fn restart(original_argv: &[OsString]) -> Result<Infallible, RestartError> {
    let program = std::env::current_exe().map_err(RestartError::CurrentExe)?;
    restart_with(&program, original_argv)
}

/// Replace the process image with `program`. The PID is kept.
#[cfg(unix)]
pub fn restart_with(
    program: &Path,
    original_argv: &[OsString],
) -> Result<Infallible, RestartError> {
    use std::os::unix::process::CommandExt;

    let mut command = Command::new(program);
    command.args(original_argv.iter().skip(1));
    if let Some(arg0) = original_argv.first() {
        command.arg0(arg0);
    }
    info!(program = %program.display(), "re-executing");
    let source = command.exec();
    Err(RestartError::Exec {
        program: program.to_path_buf(),
        source,
    })
}

/// No in-place exec here: start a detached twin, then exit this instance.
#[cfg(not(unix))]
pub fn restart_with(
    program: &Path,
    original_argv: &[OsString],
) -> Result<Infallible, RestartError> {
    let spawned = Command::new(program)
        .args(original_argv.iter().skip(1))
        .spawn();
    match spawned {
        Ok(child) => {
            info!(program = %program.display(), pid = child.id(), "restarted as new instance");
            std::process::exit(0)
        }
        Err(source) => Err(RestartError::Exec {
            program: program.to_path_buf(),
            source,
        }),
    }
}
