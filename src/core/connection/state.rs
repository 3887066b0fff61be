use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse connection state owned by the connection manager.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "message")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error(String),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Error(err) => write!(f, "Error: {}", err),
        }
    }
}

/// Severity of a status notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Ok,
    Warning,
    Error,
}

/// Status notification delivered to the observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub level: StatusLevel,
    pub message: Option<String>,
}

impl StatusUpdate {
    pub fn ok() -> Self {
        Self {
            level: StatusLevel::Ok,
            message: None,
        }
    }

    pub fn connecting() -> Self {
        Self::warning("Connecting")
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Warning,
            message: Some(message.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Error,
            message: Some(message.into()),
        }
    }
}

impl fmt::Display for StatusUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            StatusLevel::Ok => "OK",
            StatusLevel::Warning => "WARNING",
            StatusLevel::Error => "ERROR",
        };
        match &self.message {
            Some(message) => write!(f, "{}: {}", level, message),
            None => write!(f, "{}", level),
        }
    }
}

/// Level of a diagnostic log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Event emitted by the connection manager to its observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ManagerEvent {
    Status(StatusUpdate),
    Log { level: LogLevel, message: String },
}

/// Result of a dispatch call. Dropped commands are not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    Dropped,
}
