use thiserror::Error;

/// LayoutLink unified error type
#[derive(Error, Debug)]
pub enum LayoutLinkError {
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    /// No host is configured; the connection is simply not attempted.
    #[error("Configuration incomplete: no host configured")]
    ConfigurationIncomplete,

    #[error("Connection to {endpoint} failed: {message}")]
    TransportConnect { endpoint: String, message: String },

    #[error("Transport error: {message}")]
    TransportRuntime { message: String },

    /// Dispatch attempted while not connected; the payload was discarded.
    #[error("Not connected ({state}), dropped {command} command")]
    NotConnectedDropped { command: String, state: String },

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Connection manager is no longer running")]
    ChannelClosed,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Output error: {0}")]
    Output(String),
}

pub type LayoutLinkResult<T> = Result<T, LayoutLinkError>;
