// Connection module - Connection lifecycle and status state machine
pub mod handle;
pub mod manager;
pub mod state;
pub mod transport;

pub use handle::ConnectionHandle;
pub use manager::{ConnectionManager, ManagerEvents};
pub use state::{ConnectionState, DispatchOutcome, LogLevel, ManagerEvent, StatusLevel, StatusUpdate};
pub use transport::{Connector, EventSink, Generation, Transport, TransportEnvelope, TransportEvent};
