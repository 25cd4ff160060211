//! Worker process lifecycle
//!
//! Each relay session owns exactly one `WorkerProcess`. The child is placed
//! in its own process group so that termination signals reach any
//! grandchildren the worker spawns.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use super::command::WorkerCommand;
use super::error::ProcessError;

/// Spawn a worker with all three stdio channels piped.
pub fn spawn(command: &WorkerCommand) -> Result<WorkerProcess, ProcessError> {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args);

    for (key, value) in &command.env {
        cmd.env(key, value);
    }

    if let Some(dir) = &command.working_dir {
        cmd.current_dir(dir);
    }

    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    #[cfg(unix)]
    {
        cmd.process_group(0);
    }

    tracing::debug!("spawning worker: {}", command.display());

    let child = cmd.spawn().map_err(|e| map_spawn_error(e, command))?;
    Ok(WorkerProcess { child })
}

fn map_spawn_error(error: std::io::Error, command: &WorkerCommand) -> ProcessError {
    if error.kind() == std::io::ErrorKind::NotFound {
        ProcessError::CommandNotFound(command.program.clone())
    } else {
        ProcessError::SpawnFailed {
            command: command.display(),
            source: error,
        }
    }
}

/// Exclusive ownership handle over one spawned worker.
pub struct WorkerProcess {
    child: Child,
}

impl WorkerProcess {
    /// Write the request payload to the worker's stdin, then close it so the
    /// worker sees EOF and knows no more input is coming.
    pub async fn write_request(&mut self, payload: &[u8]) -> Result<(), ProcessError> {
        let mut stdin = self
            .child
            .stdin
            .take()
            .ok_or(ProcessError::StreamCapture("stdin"))?;
        stdin
            .write_all(payload)
            .await
            .map_err(ProcessError::StdinWrite)?;
        stdin.shutdown().await.map_err(ProcessError::StdinWrite)?;
        Ok(())
    }

    pub fn take_stdout(&mut self) -> Result<ChildStdout, ProcessError> {
        self.child
            .stdout
            .take()
            .ok_or(ProcessError::StreamCapture("stdout"))
    }

    pub fn take_stderr(&mut self) -> Result<ChildStderr, ProcessError> {
        self.child
            .stderr
            .take()
            .ok_or(ProcessError::StreamCapture("stderr"))
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub async fn wait(&mut self) -> std::io::Result<std::process::ExitStatus> {
        self.child.wait().await
    }

    /// Exit code mapping shared by every exit path: `Some(code)` for a
    /// normal exit, `None` when the worker was killed by a signal.
    pub fn exit_code(status: std::process::ExitStatus) -> Option<i32> {
        if let Some(code) = status.code() {
            return Some(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                tracing::debug!("worker terminated by signal {signal}");
            }
        }
        None
    }

    /// Two-stage termination: request cooperative shutdown first, and only
    /// if the worker is still alive after the grace window, force-kill it.
    pub async fn shutdown(mut self, grace: Duration) {
        self.signal_group(TerminateSignal::Graceful);

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!("worker exited after graceful signal: {status}");
            }
            Ok(Err(err)) => {
                tracing::warn!("failed waiting for worker after graceful signal: {err}");
            }
            Err(_) => {
                tracing::warn!(
                    "worker still alive {} ms after graceful signal, force-killing",
                    grace.as_millis()
                );
                self.signal_group(TerminateSignal::Forceful);
                if let Err(err) = self.child.kill().await {
                    tracing::warn!("failed to force-kill worker: {err}");
                }
            }
        }
    }

    #[cfg(unix)]
    fn signal_group(&self, signal: TerminateSignal) {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.child.id() else {
            return; // already reaped
        };

        let sig = match signal {
            TerminateSignal::Graceful => Signal::SIGTERM,
            TerminateSignal::Forceful => Signal::SIGKILL,
        };

        // Negative pid addresses the whole process group.
        let pgid = Pid::from_raw(-(pid as i32));
        if let Err(err) = signal::kill(pgid, sig) {
            tracing::debug!("failed to signal worker group {pgid} with {sig}: {err}");
        }
    }

    #[cfg(not(unix))]
    fn signal_group(&mut self, signal: TerminateSignal) {
        if matches!(signal, TerminateSignal::Forceful) {
            let _ = self.child.start_kill();
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum TerminateSignal {
    Graceful,
    Forceful,
}
