// Error taxonomy of the telemetry session
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Connect or poll request failed
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Frame could not be parsed or had the wrong shape
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Backend refused the command or it could not be sent
    #[error("command rejected: {0}")]
    CommandRejected(String),

    #[error("configuration unavailable: {0}")]
    ConfigurationUnavailable(String),

    #[error("transport is not connected")]
    NotConnected,

    #[error("session is not running")]
    NotRunning,
}
