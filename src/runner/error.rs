//! Run error types.

use std::fmt;

use crate::helper::SpawnError;
use crate::runner::ProcessOutcome;

/// Exit code as shown in error messages; `null` when killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub Option<i32>);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(code) => write!(f, "{code}"),
            None => f.write_str("null"),
        }
    }
}

/// Error type for a single helper run.
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    /// The helper could not be launched.
    #[error("Failed to spawn helper: {0}")]
    Spawn(#[from] SpawnError),
    /// The helper ran and exited unsuccessfully.
    #[error("Exit code: {code}. {stderr}")]
    NonZeroExit {
        /// Exit code, `null` if the helper was killed by a signal.
        code: ExitCode,
        /// Trimmed standard error.
        stderr: String,
        /// Everything the helper printed.
        outcome: ProcessOutcome,
    },
    /// The helper's exit status could not be collected.
    #[error("Failed to wait for helper: {0}")]
    Wait(#[source] std::io::Error),
}

impl RunError {
    /// Build the error for an unsuccessful exit.
    #[must_use]
    pub fn non_zero_exit(outcome: ProcessOutcome) -> Self {
        Self::NonZeroExit {
            code: ExitCode(outcome.exit_code),
            stderr: outcome.stderr.trim().to_string(),
            outcome,
        }
    }

    /// Captured output, when the helper got far enough to produce any.
    #[must_use]
    pub fn outcome(&self) -> Option<&ProcessOutcome> {
        match self {
            Self::NonZeroExit { outcome, .. } => Some(outcome),
            Self::Spawn(_) | Self::Wait(_) => None,
        }
    }

    /// Take the captured output.
    #[must_use]
    pub fn into_outcome(self) -> Option<ProcessOutcome> {
        match self {
            Self::NonZeroExit { outcome, .. } => Some(outcome),
            Self::Spawn(_) | Self::Wait(_) => None,
        }
    }

    /// The helper's exit code, if it exited normally.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        self.outcome().and_then(|o| o.exit_code)
    }

    /// Whether the helper never started.
    #[must_use]
    pub fn is_spawn_error(&self) -> bool {
        matches!(self, Self::Spawn(_))
    }
}
