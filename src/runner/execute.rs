//! Process runner: spawn the helper, relay its output and collect the result.
//!
//! A run is a single `tokio::select!` loop on the caller's task. Line
//! delivery, exit detection and the timeout watchdog all happen there, so
//! a slow [`LineSink`] delays completion but never loses lines.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;
use tokio::time::Instant;

use crate::helper::{HelperProcess, LineReader, SpawnOptions};
use crate::runner::RunError;

/// How long to keep reading output after the helper exits.
///
/// A descendant that inherited the pipes can keep them open indefinitely.
pub const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Which helper stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    /// Stream name as used in events.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Receiver for output lines as they arrive.
pub trait LineSink {
    /// Called once per line, in arrival order for each stream.
    fn on_line(&self, stream: OutputStream, line: &str);
}

impl<F> LineSink for F
where
    F: Fn(OutputStream, &str),
{
    fn on_line(&self, stream: OutputStream, line: &str) {
        self(stream, line);
    }
}

/// Sink that discards every line.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LineSink for NullSink {
    fn on_line(&self, _stream: OutputStream, _line: &str) {}
}

/// Final result of one helper run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutcome {
    /// Exit code, `None` if the helper was killed by a signal.
    pub exit_code: Option<i32>,
    /// Standard output, one `\n` after each line.
    pub stdout: String,
    /// Standard error, one `\n` after each line.
    pub stderr: String,
}

impl ProcessOutcome {
    fn push_line(&mut self, stream: OutputStream, line: &str) {
        let buf = match stream {
            OutputStream::Stdout => &mut self.stdout,
            OutputStream::Stderr => &mut self.stderr,
        };
        buf.push_str(line);
        buf.push('\n');
    }

    /// Whether the helper exited with code zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// One helper output stream being read.
struct OpenStream<R> {
    kind: OutputStream,
    reader: Option<LineReader<R>>,
}

impl<R: AsyncRead + Unpin> OpenStream<R> {
    fn new(kind: OutputStream, reader: Option<R>) -> Self {
        Self {
            kind,
            reader: reader.map(LineReader::new),
        }
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    async fn next_line(&mut self) -> Option<String> {
        let reader = self.reader.as_mut()?;
        match reader.next_line().await {
            Ok(Some(line)) => Some(line),
            Ok(None) => {
                self.reader = None;
                None
            }
            Err(e) => {
                tracing::warn!(stream = self.kind.as_str(), error = %e, "Failed to read helper output");
                self.reader = None;
                None
            }
        }
    }
}

/// Spawns the helper and drives it to completion.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
    spawn: SpawnOptions,
}

impl ProcessRunner {
    /// Create a runner for the helper at `program`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, spawn: SpawnOptions) -> Self {
        Self {
            program: program.into(),
            spawn,
        }
    }

    /// Get the helper path.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Get the spawn options.
    #[must_use]
    pub fn spawn_options(&self) -> &SpawnOptions {
        &self.spawn
    }

    /// Run the helper with `args`, relaying each output line to `sink`.
    ///
    /// If `timeout` elapses before the helper exits, the helper is killed
    /// and the run completes with whatever exit status that produces.
    ///
    /// # Errors
    ///
    /// Returns `RunError::Spawn` if the helper cannot be launched,
    /// `RunError::NonZeroExit` if it exits unsuccessfully (carrying the
    /// captured output), and `RunError::Wait` if its status cannot be read.
    pub async fn execute<S: LineSink + ?Sized>(
        &self,
        args: &[String],
        timeout: Option<Duration>,
        sink: &S,
    ) -> Result<ProcessOutcome, RunError> {
        let mut process = HelperProcess::spawn(&self.program, args, &self.spawn)?;

        let mut stdout = OpenStream::new(OutputStream::Stdout, process.take_stdout());
        let mut stderr = OpenStream::new(OutputStream::Stderr, process.take_stderr());
        let mut outcome = ProcessOutcome::default();

        let watchdog = tokio::time::sleep(timeout.unwrap_or(Duration::MAX));
        tokio::pin!(watchdog);
        let mut watchdog_armed = timeout.is_some();

        let drain = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(drain);

        let mut status = None;

        loop {
            if status.is_some() && !stdout.is_open() && !stderr.is_open() {
                break;
            }

            tokio::select! {
                Some(line) = stdout.next_line(), if stdout.is_open() => {
                    outcome.push_line(OutputStream::Stdout, &line);
                    sink.on_line(OutputStream::Stdout, &line);
                }
                Some(line) = stderr.next_line(), if stderr.is_open() => {
                    outcome.push_line(OutputStream::Stderr, &line);
                    sink.on_line(OutputStream::Stderr, &line);
                }
                exit = process.wait(), if status.is_none() => {
                    let exit = exit.map_err(RunError::Wait)?;
                    watchdog_armed = false;
                    drain.as_mut().reset(Instant::now() + DRAIN_GRACE);
                    tracing::debug!(code = exit.code(), "Helper exited");
                    status = Some(exit);
                }
                () = &mut watchdog, if watchdog_armed => {
                    watchdog_armed = false;
                    tracing::info!(
                        pid = process.id(),
                        timeout = ?timeout,
                        "Helper timed out, killing it"
                    );
                    process.terminate();
                }
                () = &mut drain, if status.is_some() => {
                    tracing::debug!(
                        stdout_open = stdout.is_open(),
                        stderr_open = stderr.is_open(),
                        "Abandoning helper output still open after exit"
                    );
                    break;
                }
            }
        }

        outcome.exit_code = status.and_then(|s| s.code());

        if outcome.success() {
            Ok(outcome)
        } else {
            Err(RunError::non_zero_exit(outcome))
        }
    }
}
