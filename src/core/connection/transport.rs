use crate::core::connection::state::StatusLevel;
use crate::domain::error::LayoutLinkResult;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Identifies one connection attempt. Bumped every time the manager opens
/// a new transport; events from older generations are ignored.
pub type Generation = u64;

/// Lifecycle event reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Fine-grained transport status (resolving, connecting, socket error...)
    StatusChange {
        level: StatusLevel,
        message: Option<String>,
    },
    Connected,
    Error(String),
    Data(Vec<u8>),
}

/// A transport event tagged with the generation that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEnvelope {
    pub generation: Generation,
    pub event: TransportEvent,
}

/// Channel through which a transport reports its lifecycle events.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: Generation,
    sender: mpsc::UnboundedSender<TransportEnvelope>,
}

impl EventSink {
    pub fn new(generation: Generation, sender: mpsc::UnboundedSender<TransportEnvelope>) -> Self {
        Self { generation, sender }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Report an event. Returns `false` once the manager is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.sender
            .send(TransportEnvelope {
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    pub fn status(&self, level: StatusLevel, message: impl Into<String>) -> bool {
        self.emit(TransportEvent::StatusChange {
            level,
            message: Some(message.into()),
        })
    }
}

/// An open (or opening) connection owned by the manager.
#[async_trait]
pub trait Transport: Send {
    /// Queue `payload` for writing. Must not block.
    fn send(&mut self, payload: Vec<u8>) -> LayoutLinkResult<()>;

    /// Close the connection and release its resources.
    async fn close(&mut self);
}

/// Opens transports. Connecting happens in the background; progress is
/// reported through the [`EventSink`].
pub trait Connector: Send {
    fn connect(&mut self, host: &str, port: u16, events: EventSink) -> Box<dyn Transport>;
}
