use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default controller port
pub const DEFAULT_PORT: u16 = 6464;

/// LayoutLink configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global configuration
    #[serde(default)]
    pub global: GlobalConfig,
    /// Controller endpoint
    #[serde(default)]
    pub endpoint: EndpointConfig,
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Default log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// TCP connect timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Delay before the transport retries a failed connection (0 = never)
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
    /// How long CLI commands wait for the connection to come up
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_ms: u64,
    /// How long to wait for queued writes to flush on close
    #[serde(default = "default_linger")]
    pub linger_ms: u64,
}

/// Controller endpoint and credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Controller address; no connection is attempted without it
    #[serde(default)]
    pub host: Option<String>,
    /// TCP port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Ask the controller to acknowledge commands
    #[serde(default)]
    pub need_ack: AckFlag,
    /// Login username
    #[serde(default = "default_user")]
    pub user: String,
    /// Login password
    #[serde(default)]
    pub pass: String,
}

/// Yes/No flag as it appears on the wire and in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AckFlag {
    #[default]
    Yes,
    No,
}

/// Credentials borrowed from the endpoint configuration for encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub need_ack: AckFlag,
}

/// Transport tuning passed to connectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportSettings {
    pub connect_timeout_ms: u64,
    pub reconnect_delay_ms: u64,
    pub linger_ms: u64,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_connect_timeout() -> u64 {
    3000
}

fn default_reconnect_delay() -> u64 {
    2000
}

fn default_ready_timeout() -> u64 {
    5000
}

fn default_linger() -> u64 {
    500
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_user() -> String {
    "Administrator".to_string()
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            connect_timeout_ms: default_connect_timeout(),
            reconnect_delay_ms: default_reconnect_delay(),
            ready_timeout_ms: default_ready_timeout(),
            linger_ms: default_linger(),
        }
    }
}

impl GlobalConfig {
    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            connect_timeout_ms: self.connect_timeout_ms,
            reconnect_delay_ms: self.reconnect_delay_ms,
            linger_ms: self.linger_ms,
        }
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        GlobalConfig::default().transport_settings()
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_port(),
            need_ack: AckFlag::default(),
            user: default_user(),
            pass: String::new(),
        }
    }
}

impl EndpointConfig {
    /// Create a configuration for `host` with default port and credentials.
    pub fn with_host(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..Self::default()
        }
    }

    /// The configured host, ignoring blank values.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref().map(str::trim).filter(|h| !h.is_empty())
    }

    /// `host:port` for logging, if a host is set.
    pub fn address(&self) -> Option<String> {
        self.host().map(|host| format!("{}:{}", host, self.port))
    }

    pub fn credentials(&self) -> Credentials<'_> {
        Credentials {
            username: &self.user,
            password: &self.pass,
            need_ack: self.need_ack,
        }
    }
}

impl AckFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckFlag::Yes => "Yes",
            AckFlag::No => "No",
        }
    }
}

impl From<bool> for AckFlag {
    fn from(value: bool) -> Self {
        if value {
            AckFlag::Yes
        } else {
            AckFlag::No
        }
    }
}

impl fmt::Display for AckFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AckFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yes" | "true" | "1" => Ok(AckFlag::Yes),
            "no" | "false" | "0" => Ok(AckFlag::No),
            other => Err(format!("expected Yes or No, got '{}'", other)),
        }
    }
}
