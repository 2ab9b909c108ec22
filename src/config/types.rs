//! Configuration types.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default location of the helper, relative to the directory holding the
/// running executable.
pub const DEFAULT_HELPER_PATH: &str = "psexec/psexec.py";

/// Helper flags that may be replaced on every run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Reinstall the remote service before running.
    pub reinstall: bool,
    /// Uninstall the remote service after running.
    pub uninstall: bool,
    /// Run the command as SYSTEM.
    pub system: bool,
}

/// Connection settings for one target host.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Target host name or address.
    #[serde(default)]
    pub host: String,
    /// Raw account name, normalized by the client.
    #[serde(default)]
    pub username: String,
    /// Password; empty means authenticate without one.
    #[serde(default)]
    pub password: String,
    /// Default helper flags.
    #[serde(flatten)]
    pub options: RunOptions,
    /// Kill the helper after this many milliseconds.
    #[serde(default, rename = "timeout")]
    pub timeout_ms: Option<u64>,
}

impl ConnectionConfig {
    /// Create a config for `host` authenticating as `username`.
    #[must_use]
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            ..Default::default()
        }
    }

    /// Set the password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Set the default helper flags.
    #[must_use]
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the run timeout in milliseconds.
    #[must_use]
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Whether a non-empty password is configured.
    #[must_use]
    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }

    /// The run timeout, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &if self.has_password() { "***" } else { "" })
            .field("options", &self.options)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Where and how to launch the helper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelperConfig {
    /// Helper executable.
    pub path: PathBuf,
    /// Working directory for the helper process.
    pub working_dir: Option<PathBuf>,
    /// Route the spawn through the platform shell.
    pub shell: bool,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_HELPER_PATH),
            working_dir: None,
            shell: cfg!(windows),
        }
    }
}

impl HelperConfig {
    /// Use a specific helper executable.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Run the helper from `dir`.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Directory the helper runs in and relative paths resolve against.
    ///
    /// Falls back to the directory of the running executable, where the
    /// helper is bundled, so the caller's current directory never matters.
    #[must_use]
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.working_dir.clone().or_else(bundle_dir)
    }

    /// Helper path with a relative `path` anchored at [`Self::base_dir`].
    #[must_use]
    pub fn resolved_path(&self) -> PathBuf {
        match self.base_dir() {
            Some(dir) if self.path.is_relative() => dir.join(&self.path),
            _ => self.path.clone(),
        }
    }
}

/// Directory containing the running executable.
fn bundle_dir() -> Option<PathBuf> {
    match std::env::current_exe() {
        Ok(exe) => exe.parent().map(Path::to_path_buf),
        Err(e) => {
            tracing::debug!(error = %e, "Cannot locate executable, helper path stays relative");
            None
        }
    }
}

/// Top-level configuration file contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Target connection.
    pub connection: ConnectionConfig,
    /// Helper location.
    pub helper: HelperConfig,
}
