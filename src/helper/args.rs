//! Helper argument construction.

use crate::config::{ConnectionConfig, RunOptions};
use crate::identity::Identity;

/// Authenticate without a password.
pub const NO_PASS_FLAG: &str = "-no-pass";
/// Reinstall the remote service.
pub const REINSTALL_FLAG: &str = "--reinstall";
/// Uninstall the remote service.
pub const UNINSTALL_FLAG: &str = "--uninstall";
/// Run as SYSTEM.
pub const SYSTEM_FLAG: &str = "--system";

/// Builder for one helper invocation's argument vector.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct HelperInvocation {
    host: String,
    identity: Identity,
    password: String,
    options: RunOptions,
    command: String,
}

impl HelperInvocation {
    /// Create an invocation running `command` on `host` as `identity`.
    #[must_use]
    pub fn new(host: impl Into<String>, identity: Identity, command: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            identity,
            command: command.into(),
            ..Default::default()
        }
    }

    /// Authenticate with `password`. Empty means no password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Set the helper flags.
    #[must_use]
    pub fn options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Get the command.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The `identity[:password]@host` token.
    #[must_use]
    pub fn target(&self) -> String {
        if self.password.is_empty() {
            format!("{}@{}", self.identity, self.host)
        } else {
            format!("{}:{}@{}", self.identity, self.password, self.host)
        }
    }

    /// Build the command-line arguments.
    ///
    /// The command is passed as one final token; the helper splits it.
    #[must_use]
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(6);

        if self.password.is_empty() {
            args.push(NO_PASS_FLAG.to_string());
        }

        if self.options.reinstall {
            args.push(REINSTALL_FLAG.to_string());
        }

        if self.options.uninstall {
            args.push(UNINSTALL_FLAG.to_string());
        }

        if self.options.system {
            args.push(SYSTEM_FLAG.to_string());
        }

        args.push(self.target());
        args.push(self.command.clone());

        args
    }

    /// Arguments with the password masked, for logs and dry runs.
    #[must_use]
    pub fn redacted_args(&self) -> Vec<String> {
        if self.password.is_empty() {
            return self.build_args();
        }
        self.clone().password("***").build_args()
    }
}

impl std::fmt::Debug for HelperInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.redacted_args()).finish()
    }
}

/// Build the helper arguments for `command` from a connection config.
#[must_use]
pub fn build_args(config: &ConnectionConfig, identity: &Identity, command: &str) -> Vec<String> {
    HelperInvocation::new(config.host.clone(), identity.clone(), command)
        .password(config.password.clone())
        .options(config.options)
        .build_args()
}
