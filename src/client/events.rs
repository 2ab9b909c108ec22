//! Client events and the channel that publishes them.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::runner::{LineSink, OutputStream};

/// Default capacity for the event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Events published by a [`Client`](crate::client::Client) while runs are in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// A line the helper wrote to standard output.
    Stdout {
        /// Run that produced the line.
        run_id: Uuid,
        /// Line without its terminator.
        line: String,
    },
    /// A line the helper wrote to standard error.
    Stderr {
        /// Run that produced the line.
        run_id: Uuid,
        /// Line without its terminator.
        line: String,
    },
    /// The helper could not be launched.
    Error {
        /// Run that failed.
        run_id: Uuid,
        /// Error description.
        message: String,
    },
}

impl ClientEvent {
    /// Build a line event for `stream`.
    #[must_use]
    pub fn line(run_id: Uuid, stream: OutputStream, line: impl Into<String>) -> Self {
        let line = line.into();
        match stream {
            OutputStream::Stdout => Self::Stdout { run_id, line },
            OutputStream::Stderr => Self::Stderr { run_id, line },
        }
    }

    /// The run this event belongs to.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        match self {
            Self::Stdout { run_id, .. } | Self::Stderr { run_id, .. } | Self::Error { run_id, .. } => {
                *run_id
            }
        }
    }

    /// The output line, for `Stdout` and `Stderr` events.
    #[must_use]
    pub fn output_line(&self) -> Option<&str> {
        match self {
            Self::Stdout { line, .. } | Self::Stderr { line, .. } => Some(line),
            Self::Error { .. } => None,
        }
    }

    /// The stream a line event came from.
    #[must_use]
    pub fn stream(&self) -> Option<OutputStream> {
        match self {
            Self::Stdout { .. } => Some(OutputStream::Stdout),
            Self::Stderr { .. } => Some(OutputStream::Stderr),
            Self::Error { .. } => None,
        }
    }
}

type Listener = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

/// Publishes client events to listeners and subscribers.
///
/// Listeners registered with [`EventChannel::on`] are called inline, in
/// order, and never miss an event. Broadcast subscribers are decoupled from
/// the run and drop events if they fall more than the channel capacity
/// behind.
pub struct EventChannel {
    listeners: RwLock<Vec<Listener>>,
    tx: broadcast::Sender<ClientEvent>,
}

impl EventChannel {
    /// Create a channel with the default broadcast capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create a channel with a specific broadcast capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            listeners: RwLock::new(Vec::new()),
            tx,
        }
    }

    /// Register a listener called for every event.
    pub fn on(&self, listener: impl Fn(&ClientEvent) + Send + Sync + 'static) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Subscribe to the broadcast side of the channel.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    /// Subscribe as a stream. Lagged events are skipped.
    pub fn stream(&self) -> impl futures_core::Stream<Item = ClientEvent> + Send + 'static {
        use futures_util::StreamExt;

        BroadcastStream::new(self.tx.subscribe()).filter_map(|item| {
            futures_util::future::ready(match item {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!(error = %e, "Event subscriber lagged");
                    None
                }
            })
        })
    }

    /// Publish an event.
    pub fn emit(&self, event: ClientEvent) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in &listeners {
            listener(&event);
        }

        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("listeners", &self.listener_count())
            .field("subscribers", &self.tx.receiver_count())
            .finish()
    }
}

/// Forwards one run's output lines into an [`EventChannel`].
#[derive(Debug)]
pub struct RunEvents<'a> {
    channel: &'a EventChannel,
    run_id: Uuid,
}

impl<'a> RunEvents<'a> {
    /// Tag events from `channel` with `run_id`.
    #[must_use]
    pub fn new(channel: &'a EventChannel, run_id: Uuid) -> Self {
        Self { channel, run_id }
    }
}

impl LineSink for RunEvents<'_> {
    fn on_line(&self, stream: OutputStream, line: &str) {
        self.channel.emit(ClientEvent::line(self.run_id, stream, line));
    }
}
