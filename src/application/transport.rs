// Transport seam between the session coordinator and the backend
use crate::application::error::SessionError;
use crate::domain::command::Command;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    #[default]
    Streaming,
    Polling,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::Streaming => f.write_str("streaming"),
            TransportMode::Polling => f.write_str("polling"),
        }
    }
}

/// Lifecycle of a single transport session. A session never goes back to
/// `Idle`; a new connection attempt uses a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    Connecting,
    Open,
    Closed,
}

/// Events a session pushes to its subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// One inbound frame, in arrival order
    Frame(String),
    /// A poll failed; the session stays alive and retries on the next tick
    Degraded(String),
    /// A poll succeeded after a failure
    Recovered,
    /// The persistent channel is gone
    Closed(Option<String>),
}

pub type EventSender = mpsc::Sender<TransportEvent>;

#[async_trait]
pub trait TransportSession: Send + Sync {
    fn mode(&self) -> TransportMode;

    fn state(&self) -> TransportState;

    /// Open the session and start delivering events to `events`.
    async fn connect(&self, events: EventSender) -> Result<(), SessionError>;

    async fn send(&self, command: &Command) -> Result<(), SessionError>;

    /// Stop delivering events and cancel every background task. Idempotent.
    async fn close(&self);
}

/// Mints a fresh session for every connection attempt.
pub trait TransportConnector: Send + Sync {
    fn mode(&self) -> TransportMode;

    fn open_session(&self) -> Arc<dyn TransportSession>;
}
