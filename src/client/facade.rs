//! Client facade for running commands on one remote host.

use tokio::sync::broadcast;
use tracing::Instrument;
use uuid::Uuid;

use crate::client::{ClientEvent, EventChannel, RunEvents};
use crate::config::{ConnectionConfig, HelperConfig, RunOptions};
use crate::helper::{HelperInvocation, SpawnOptions};
use crate::identity::Identity;
use crate::runner::{ProcessOutcome, ProcessRunner, RunError};

/// One command to run, with the helper flags it runs under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Identifier attached to this run's events and log span.
    pub id: Uuid,
    /// Command line passed to the helper as a single argument.
    pub command: String,
    /// Helper flags for this run.
    pub options: RunOptions,
}

impl RunRequest {
    /// Create a request with a fresh id.
    #[must_use]
    pub fn new(command: impl Into<String>, options: RunOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            command: command.into(),
            options,
        }
    }
}

/// Runs commands on a remote host through the helper.
///
/// A `Client` is immutable once built: every run carries its own
/// [`RunRequest`], so overlapping runs on a shared client do not interfere.
/// Output lines from all runs are published on the client's event channel,
/// tagged with the run id.
#[derive(Debug)]
pub struct Client {
    config: ConnectionConfig,
    identity: Identity,
    runner: ProcessRunner,
    events: EventChannel,
}

impl Client {
    /// Create a client using the bundled helper location.
    #[must_use]
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_helper(config, HelperConfig::default())
    }

    /// Create a client with an explicit helper configuration.
    #[must_use]
    pub fn with_helper(config: ConnectionConfig, helper: HelperConfig) -> Self {
        let identity = Identity::parse(&config.username);
        let spawn = SpawnOptions {
            working_dir: helper.base_dir(),
            shell: helper.shell,
        };
        let runner = ProcessRunner::new(helper.resolved_path(), spawn);

        tracing::debug!(
            identity = %identity,
            helper = %runner.program().display(),
            "Created client"
        );

        Self {
            config,
            identity,
            runner,
            events: EventChannel::new(),
        }
    }

    /// Get the connection config.
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Get the normalized identity.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Get the process runner.
    #[must_use]
    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    /// Get the event channel.
    #[must_use]
    pub fn events(&self) -> &EventChannel {
        &self.events
    }

    /// Register a listener called inline for every event.
    pub fn on(&self, listener: impl Fn(&ClientEvent) + Send + Sync + 'static) {
        self.events.on(listener);
    }

    /// Subscribe to events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Build a request for `command`.
    ///
    /// `options` replaces the configured flags entirely when given.
    #[must_use]
    pub fn request(&self, command: impl Into<String>, options: Option<RunOptions>) -> RunRequest {
        RunRequest::new(command, options.unwrap_or(self.config.options))
    }

    /// The helper invocation a request would run.
    #[must_use]
    pub fn invocation(&self, request: &RunRequest) -> HelperInvocation {
        HelperInvocation::new(
            self.config.host.clone(),
            self.identity.clone(),
            request.command.clone(),
        )
        .password(self.config.password.clone())
        .options(request.options)
    }

    /// The helper arguments a request would run with.
    #[must_use]
    pub fn args_for(&self, request: &RunRequest) -> Vec<String> {
        self.invocation(request).build_args()
    }

    /// Run `command` with the configured flags.
    ///
    /// # Errors
    ///
    /// See [`Client::execute`].
    pub async fn run(&self, command: impl Into<String>) -> Result<ProcessOutcome, RunError> {
        self.execute(self.request(command, None)).await
    }

    /// Run `command` with `options` in place of the configured flags.
    ///
    /// # Errors
    ///
    /// See [`Client::execute`].
    pub async fn run_with_options(
        &self,
        command: impl Into<String>,
        options: RunOptions,
    ) -> Result<ProcessOutcome, RunError> {
        self.execute(self.request(command, Some(options))).await
    }

    /// Execute a prepared request.
    ///
    /// Output lines are published as [`ClientEvent::Stdout`] and
    /// [`ClientEvent::Stderr`] while the helper runs.
    ///
    /// # Errors
    ///
    /// Returns `RunError::Spawn` (after publishing a [`ClientEvent::Error`])
    /// if the helper cannot be launched, and `RunError::NonZeroExit` if it
    /// exits unsuccessfully, including after being killed on timeout.
    pub async fn execute(&self, request: RunRequest) -> Result<ProcessOutcome, RunError> {
        let invocation = self.invocation(&request);
        let span = tracing::info_span!("run", run_id = %request.id);

        async {
            tracing::debug!(args = ?invocation, "Running helper");

            let sink = RunEvents::new(&self.events, request.id);
            let result = self
                .runner
                .execute(&invocation.build_args(), self.config.timeout(), &sink)
                .await;

            match &result {
                Ok(outcome) => tracing::debug!(
                    stdout_bytes = outcome.stdout.len(),
                    stderr_bytes = outcome.stderr.len(),
                    "Run succeeded"
                ),
                Err(e @ RunError::Spawn(_)) => {
                    tracing::warn!(error = %e, "Helper failed to start");
                    self.events.emit(ClientEvent::Error {
                        run_id: request.id,
                        message: e.to_string(),
                    });
                }
                Err(e) => tracing::debug!(error = %e, "Run failed"),
            }

            result
        }
        .instrument(span)
        .await
    }
}
