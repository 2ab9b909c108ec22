//! Helper process spawning and control.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The binary was not found.
    #[error("Helper binary not found: {0}")]
    NotFound(PathBuf),
    /// Permission denied when spawning.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io(err),
        }
    }
}

/// How the helper process is launched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnOptions {
    /// Working directory for the helper.
    pub working_dir: Option<PathBuf>,
    /// Launch through `cmd /C` (Windows) or `sh -c` instead of directly.
    pub shell: bool,
}

impl SpawnOptions {
    /// Spawn options matching the host platform.
    #[must_use]
    pub fn platform_default() -> Self {
        Self {
            working_dir: None,
            shell: cfg!(windows),
        }
    }

    /// Set the working directory.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Route the spawn through the platform shell.
    #[must_use]
    pub fn shell(mut self, shell: bool) -> Self {
        self.shell = shell;
        self
    }
}

/// Join a program and its arguments into one escaped shell command line.
#[must_use]
pub fn shell_command_line(program: &Path, args: &[String]) -> String {
    std::iter::once(program.to_string_lossy())
        .chain(args.iter().map(|a| std::borrow::Cow::Borrowed(a.as_str())))
        .map(|token| {
            if cfg!(windows) {
                shell_escape::windows::escape(token).into_owned()
            } else {
                shell_escape::unix::escape(token).into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn build_command(program: &Path, args: &[String], options: &SpawnOptions) -> Command {
    let mut cmd = if options.shell {
        let line = shell_command_line(program, args);
        let (shell, flag): (OsString, &str) = if cfg!(windows) {
            (
                std::env::var_os("COMSPEC").unwrap_or_else(|| OsString::from("cmd.exe")),
                "/C",
            )
        } else {
            (OsString::from("/bin/sh"), "-c")
        };
        let mut cmd = Command::new(shell);
        cmd.arg(flag).arg(line);
        cmd
    } else {
        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd
    };

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(ref dir) = options.working_dir {
        cmd.current_dir(dir);
    }

    // Own process group, so termination reaches anything the helper forks.
    #[cfg(unix)]
    cmd.process_group(0);

    cmd
}

/// A running helper process.
#[derive(Debug)]
pub struct HelperProcess {
    child: Child,
}

impl HelperProcess {
    /// Spawn the helper at `program` with `args`.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn(
        program: &Path,
        args: &[String],
        options: &SpawnOptions,
    ) -> Result<Self, SpawnError> {
        let child = build_command(program, args, options)
            .spawn()
            .map_err(|e| SpawnError::from_io(program, e))?;

        tracing::debug!(
            program = %program.display(),
            pid = child.id(),
            shell = options.shell,
            "Spawned helper process"
        );

        Ok(Self { child })
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Check if the process has exited without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the process state cannot be queried.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Forcefully terminate the helper without waiting for it.
    ///
    /// Best effort: a helper that already exited, or a signal that cannot be
    /// delivered, is logged and otherwise ignored.
    pub fn terminate(&mut self) {
        #[cfg(unix)]
        if self.kill_process_group() {
            return;
        }

        if let Err(e) = self.child.start_kill() {
            tracing::debug!(error = %e, "Failed to kill helper process");
        }
    }

    #[cfg(unix)]
    fn kill_process_group(&self) -> bool {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.id() else {
            return false;
        };
        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };

        match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(pid, error = %e, "Failed to kill helper process group");
                false
            }
        }
    }
}
