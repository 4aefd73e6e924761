// Connection status as seen by the operator
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting {
        attempt: u32,
    },
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerSeverity {
    Notice,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Banner {
    pub severity: BannerSeverity,
    pub message: String,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    /// Persistent banner for anything but a healthy connection. `Failed`
    /// gets its own severity because only the operator can recover from it.
    pub fn banner(&self) -> Option<Banner> {
        let (severity, message) = match self {
            ConnectionStatus::Connected => return None,
            ConnectionStatus::Disconnected => (
                BannerSeverity::Notice,
                "Disconnected from engine backend".to_string(),
            ),
            ConnectionStatus::Connecting => (
                BannerSeverity::Notice,
                "Connecting to engine backend...".to_string(),
            ),
            ConnectionStatus::Reconnecting { attempt } => (
                BannerSeverity::Notice,
                format!("Connection lost, reconnecting (attempt {})...", attempt),
            ),
            ConnectionStatus::Failed => (
                BannerSeverity::Critical,
                "Connection failed. Retry or refresh to reconnect.".to_string(),
            ),
        };
        Some(Banner { severity, message })
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => f.write_str("disconnected"),
            ConnectionStatus::Connecting => f.write_str("connecting"),
            ConnectionStatus::Connected => f.write_str("connected"),
            ConnectionStatus::Reconnecting { attempt } => {
                write!(f, "reconnecting (attempt {})", attempt)
            }
            ConnectionStatus::Failed => f.write_str("failed"),
        }
    }
}
