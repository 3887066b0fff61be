//! LayoutLink Library
//!
//! Control-channel client for layout and audio routing controllers. Keeps a
//! single TCP connection to the controller, tracks its status and sends
//! credential-prefixed command messages.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use crate::domain::error::{LayoutLinkError, LayoutLinkResult};
pub use crate::domain::command::Command;
pub use crate::domain::config::{AckFlag, AppConfig, EndpointConfig};
pub use crate::core::connection::{
    ConnectionHandle, ConnectionManager, ConnectionState, DispatchOutcome, ManagerEvent, StatusUpdate,
};
pub use crate::core::encoder::encode;
pub use crate::infrastructure::tcp::TcpConnector;
