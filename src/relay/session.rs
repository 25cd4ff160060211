//! Per-request relay session
//!
//! One session bridges one inbound request to one worker invocation: the
//! request payload goes to the worker's stdin, the worker's stdout comes
//! back as SSE data frames, and the session guarantees exactly one terminal
//! outcome no matter which of {worker exit, timeout, caller disconnect}
//! happens first.

use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::sync::mpsc;

use super::events::{ErrorEvent, RelayFrame};
use super::framing::LineFramer;
use crate::subprocess::{self, ProcessError, WorkerCommand, WorkerProcess};

/// Grace window between the cooperative and the forceful termination signal.
/// The same window applies on every termination path.
pub const KILL_GRACE_PERIOD: Duration = Duration::from_millis(5000);

const STDOUT_CHUNK_SIZE: usize = 8192;

/// Session lifecycle states. The four terminal states are mutually
/// exclusive; `Lifecycle::finish` is the only way in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Running,
    /// Worker exited with code 0 and the stream closed cleanly.
    Completed,
    /// The wall-clock budget elapsed before the worker exited.
    TimedOut,
    /// Spawn failure, abnormal exit, or an output-handling failure.
    Errored,
    /// The caller dropped the connection before the worker finished.
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed
                | SessionState::TimedOut
                | SessionState::Errored
                | SessionState::Cancelled
        )
    }
}

/// Single transition point for the session state machine.
#[derive(Debug)]
struct Lifecycle {
    state: SessionState,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            state: SessionState::Starting,
        }
    }

    fn running(&mut self) {
        if self.state == SessionState::Starting {
            self.state = SessionState::Running;
        }
    }

    /// Move into a terminal state. Returns false, leaving the state
    /// untouched, if another trigger already finished the session.
    fn finish(&mut self, next: SessionState) -> bool {
        debug_assert!(next.is_terminal());
        if self.state.is_terminal() {
            tracing::debug!(
                "ignoring transition to {next:?}, session already {:?}",
                self.state
            );
            return false;
        }
        self.state = next;
        true
    }
}

/// Guarded writer over the outbound frame channel. Once the channel is
/// gone (caller disconnected, stream finalized), further writes are
/// absorbed and logged, never propagated.
pub struct EventSink {
    tx: mpsc::Sender<RelayFrame>,
    closed: bool,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<RelayFrame>) -> Self {
        Self { tx, closed: false }
    }

    /// Returns false if the frame could not be delivered because the
    /// stream is already finalized.
    async fn send(&mut self, frame: RelayFrame) -> bool {
        if self.closed {
            tracing::debug!("dropping frame, stream already closed");
            return false;
        }
        if self.tx.send(frame).await.is_err() {
            self.closed = true;
            return false;
        }
        true
    }

    /// Resolves when the receiving side of the stream is gone.
    async fn disconnected(&self) {
        if self.closed {
            return;
        }
        self.tx.closed().await;
    }
}

/// Worker invocation parameters for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub command: WorkerCommand,
    pub timeout: Duration,
}

/// One inbound request, one worker, one outcome.
pub struct RelaySession {
    config: SessionConfig,
    payload: Vec<u8>,
    sink: EventSink,
}

impl RelaySession {
    pub fn new(config: SessionConfig, payload: Vec<u8>, sink: EventSink) -> Self {
        Self {
            config,
            payload,
            sink,
        }
    }

    /// Drive the session to its terminal state.
    pub async fn run(self) -> SessionState {
        let RelaySession {
            config,
            payload,
            mut sink,
        } = self;

        let mut lifecycle = Lifecycle::new();
        let mut framer = LineFramer::new();
        let started = Instant::now();

        let mut worker = match subprocess::spawn(&config.command) {
            Ok(worker) => worker,
            Err(err) => {
                return fail_startup(&mut lifecycle, &mut sink, &err).await;
            }
        };

        if let Err(err) = worker.write_request(&payload).await {
            let state = fail_startup(&mut lifecycle, &mut sink, &err).await;
            tokio::spawn(worker.shutdown(KILL_GRACE_PERIOD));
            return state;
        }

        let (mut stdout, stderr) = match (worker.take_stdout(), worker.take_stderr()) {
            (Ok(stdout), Ok(stderr)) => (stdout, stderr),
            (Err(err), _) | (_, Err(err)) => {
                let state = fail_startup(&mut lifecycle, &mut sink, &err).await;
                tokio::spawn(worker.shutdown(KILL_GRACE_PERIOD));
                return state;
            }
        };

        lifecycle.running();
        tracing::debug!(pid = worker.id(), "worker running");

        let mut stderr_lines = BufReader::new(stderr).lines();
        let mut chunk = [0u8; STDOUT_CHUNK_SIZE];
        let mut stdout_open = true;
        let mut stderr_open = true;

        let deadline = tokio::time::sleep(config.timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                read = stdout.read(&mut chunk), if stdout_open => match read {
                    Ok(0) => stdout_open = false,
                    Ok(n) => {
                        for line in framer.push(&chunk[..n]) {
                            if !sink.send(RelayFrame::Data(line)).await {
                                return cancel(&mut lifecycle, worker);
                            }
                        }
                    }
                    Err(err) => {
                        tracing::warn!("error reading worker stdout: {err}");
                        stdout_open = false;
                    }
                },

                line = stderr_lines.next_line(), if stderr_open => match line {
                    Ok(Some(text)) => {
                        let frame = RelayFrame::Error(ErrorEvent::runtime_diagnostic(text));
                        if !sink.send(frame).await {
                            return cancel(&mut lifecycle, worker);
                        }
                    }
                    Ok(None) => stderr_open = false,
                    Err(err) => {
                        tracing::warn!("error reading worker stderr: {err}");
                        stderr_open = false;
                    }
                },

                // Exit is only observed once stdout has drained to EOF, so
                // every complete line is forwarded before the outcome.
                status = worker.wait(), if !stdout_open => {
                    while stderr_open {
                        match stderr_lines.next_line().await {
                            Ok(Some(text)) => {
                                let frame =
                                    RelayFrame::Error(ErrorEvent::runtime_diagnostic(text));
                                sink.send(frame).await;
                            }
                            Ok(None) | Err(_) => stderr_open = false,
                        }
                    }
                    return finish_exit(&mut lifecycle, &mut sink, &mut framer, status).await;
                }

                _ = &mut deadline => {
                    let elapsed = started.elapsed();
                    tracing::warn!(
                        "worker exceeded {} ms budget after {} ms, terminating",
                        config.timeout.as_millis(),
                        elapsed.as_millis()
                    );
                    sink.send(RelayFrame::Error(ErrorEvent::timeout(config.timeout, elapsed)))
                        .await;
                    lifecycle.finish(SessionState::TimedOut);
                    // Close the stream now; the kill escalation runs detached
                    // rather than holding the response open.
                    drop(sink);
                    tokio::spawn(worker.shutdown(KILL_GRACE_PERIOD));
                    return lifecycle.state;
                }

                _ = sink.disconnected() => {
                    return cancel(&mut lifecycle, worker);
                }
            }
        }
    }
}

async fn fail_startup(
    lifecycle: &mut Lifecycle,
    sink: &mut EventSink,
    err: &ProcessError,
) -> SessionState {
    tracing::error!("worker startup failed: {err}");
    sink.send(RelayFrame::Error(ErrorEvent::spawn_failure(err)))
        .await;
    lifecycle.finish(SessionState::Errored);
    lifecycle.state
}

async fn finish_exit(
    lifecycle: &mut Lifecycle,
    sink: &mut EventSink,
    framer: &mut LineFramer,
    status: std::io::Result<std::process::ExitStatus>,
) -> SessionState {
    // Flush-on-exit: a trailing unterminated fragment is forwarded as one
    // final event, even when it is not a complete JSON document.
    if let Some(line) = framer.take_remainder() {
        sink.send(RelayFrame::Data(line)).await;
    }

    match status {
        Ok(status) if status.success() => {
            tracing::debug!("worker completed cleanly");
            lifecycle.finish(SessionState::Completed);
        }
        Ok(status) => {
            let exit_code = WorkerProcess::exit_code(status);
            tracing::warn!("worker exited abnormally: {status}");
            sink.send(RelayFrame::Error(ErrorEvent::abnormal_exit(exit_code)))
                .await;
            lifecycle.finish(SessionState::Errored);
        }
        Err(err) => {
            tracing::error!("failed to observe worker exit: {err}");
            sink.send(RelayFrame::Error(ErrorEvent::wait_failure(&err)))
                .await;
            lifecycle.finish(SessionState::Errored);
        }
    }
    lifecycle.state
}

fn cancel(lifecycle: &mut Lifecycle, worker: WorkerProcess) -> SessionState {
    if lifecycle.finish(SessionState::Cancelled) {
        tracing::info!("caller disconnected, terminating worker");
        tokio::spawn(worker.shutdown(KILL_GRACE_PERIOD));
    }
    lifecycle.state
}
