use crate::core::connection::state::StatusLevel;
use crate::core::connection::transport::{Connector, EventSink, Transport, TransportEvent};
use crate::domain::config::TransportSettings;
use crate::domain::error::{LayoutLinkError, LayoutLinkResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Opens [`TcpTransport`]s with the configured timeouts and retry delay.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    settings: TransportSettings,
}

impl TcpConnector {
    pub fn new(settings: TransportSettings) -> Self {
        Self { settings }
    }
}

impl Connector for TcpConnector {
    fn connect(&mut self, host: &str, port: u16, events: EventSink) -> Box<dyn Transport> {
        Box::new(TcpTransport::spawn(
            host.to_string(),
            port,
            self.settings,
            events,
        ))
    }
}

/// TCP connection driven by a background task.
///
/// The task connects, writes queued payloads and drains inbound data,
/// reporting progress through the event sink. After a failure it retries
/// after `reconnect_delay_ms` unless that is zero. Payloads are only
/// accepted while a socket is up.
pub struct TcpTransport {
    endpoint: String,
    tx_sender: Option<mpsc::UnboundedSender<Vec<u8>>>,
    driver: Option<JoinHandle<()>>,
    connected: Arc<AtomicBool>,
    linger: Duration,
}

enum SessionEnd {
    Closed,
    Failed(String),
}

impl TcpTransport {
    pub fn spawn(host: String, port: u16, settings: TransportSettings, events: EventSink) -> Self {
        let endpoint = format!("{}:{}", host, port);
        let (tx_sender, tx_receiver) = mpsc::unbounded_channel::<Vec<u8>>();
        let connected = Arc::new(AtomicBool::new(false));
        let driver = tokio::spawn(drive(
            host,
            port,
            settings,
            events,
            tx_receiver,
            Arc::clone(&connected),
        ));

        Self {
            endpoint,
            tx_sender: Some(tx_sender),
            driver: Some(driver),
            connected,
            linger: Duration::from_millis(settings.linger_ms),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn send(&mut self, payload: Vec<u8>) -> LayoutLinkResult<()> {
        let sender = self
            .tx_sender
            .as_ref()
            .ok_or_else(|| LayoutLinkError::TransportRuntime {
                message: format!("Transport to {} is closed", self.endpoint),
            })?;

        if !self.connected.load(Ordering::Acquire) {
            return Err(LayoutLinkError::TransportRuntime {
                message: format!("Not connected to {}", self.endpoint),
            });
        }

        sender
            .send(payload)
            .map_err(|e| LayoutLinkError::TransportRuntime {
                message: format!("Failed to queue {} bytes for {}", e.0.len(), self.endpoint),
            })
    }

    async fn close(&mut self) {
        // Dropping the sender lets the driver flush queued writes and exit.
        drop(self.tx_sender.take());

        if let Some(mut driver) = self.driver.take() {
            match tokio::time::timeout(self.linger, &mut driver).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("TCP driver for {} completed with error: {}", self.endpoint, e),
                Err(_) => {
                    warn!("TCP driver for {} did not stop in time, aborting", self.endpoint);
                    driver.abort();
                }
            }
        }

        info!("TCP transport to {} closed", self.endpoint);
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

async fn drive(
    host: String,
    port: u16,
    settings: TransportSettings,
    events: EventSink,
    mut outgoing: mpsc::UnboundedReceiver<Vec<u8>>,
    connected: Arc<AtomicBool>,
) {
    let endpoint = format!("{}:{}", host, port);
    let connect_timeout = Duration::from_millis(settings.connect_timeout_ms);
    let mut retrying = false;

    loop {
        // The owner announces the first attempt itself.
        if retrying {
            events.status(StatusLevel::Warning, "Connecting");
        }
        retrying = true;

        let connect = tokio::time::timeout(connect_timeout, TcpStream::connect((host.as_str(), port)));
        tokio::pin!(connect);

        let attempt = loop {
            tokio::select! {
                result = &mut connect => break Some(result),
                payload = outgoing.recv() => match payload {
                    Some(data) => warn!("Discarding {} bytes queued before connect", data.len()),
                    None => break None,
                },
            }
        };

        let failure = match attempt {
            None => return,
            Some(Err(_)) => format!("Connection timeout to {}", endpoint),
            Some(Ok(Err(e))) => LayoutLinkError::TransportConnect {
                endpoint: endpoint.clone(),
                message: e.to_string(),
            }
            .to_string(),
            Some(Ok(Ok(stream))) => {
                info!("TCP connection established to {}", endpoint);
                connected.store(true, Ordering::Release);
                if !events.emit(TransportEvent::Connected) {
                    return;
                }
                let end = pump(stream, &endpoint, &events, &mut outgoing).await;
                connected.store(false, Ordering::Release);
                match end {
                    SessionEnd::Closed => return,
                    SessionEnd::Failed(message) => message,
                }
            }
        };

        if !events.emit(TransportEvent::Error(failure)) || settings.reconnect_delay_ms == 0 {
            return;
        }

        debug!("Retrying {} in {} ms", endpoint, settings.reconnect_delay_ms);
        let backoff = tokio::time::sleep(Duration::from_millis(settings.reconnect_delay_ms));
        tokio::pin!(backoff);
        loop {
            tokio::select! {
                _ = &mut backoff => break,
                payload = outgoing.recv() => match payload {
                    Some(data) => warn!("Discarding {} bytes queued while disconnected", data.len()),
                    None => return,
                },
            }
        }
    }
}

async fn pump(
    stream: TcpStream,
    endpoint: &str,
    events: &EventSink,
    outgoing: &mut mpsc::UnboundedReceiver<Vec<u8>>,
) -> SessionEnd {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to set TCP_NODELAY: {}", e);
    }

    let (mut reader, mut writer) = stream.into_split();
    let mut buffer = vec![0u8; 4096];

    loop {
        tokio::select! {
            payload = outgoing.recv() => match payload {
                Some(data) => {
                    if let Err(e) = writer.write_all(&data).await {
                        return SessionEnd::Failed(format!("Failed to write to {}: {}", endpoint, e));
                    }
                    if let Err(e) = writer.flush().await {
                        return SessionEnd::Failed(format!("Failed to flush {}: {}", endpoint, e));
                    }
                    debug!("Sent {} bytes to {}", data.len(), endpoint);
                }
                None => {
                    if let Err(e) = writer.shutdown().await {
                        warn!("Failed to shutdown TCP stream to {}: {}", endpoint, e);
                    }
                    return SessionEnd::Closed;
                }
            },
            read = reader.read(&mut buffer) => match read {
                Ok(0) => {
                    info!("TCP connection closed by peer {}", endpoint);
                    return SessionEnd::Failed(format!("Connection closed by {}", endpoint));
                }
                Ok(n) => {
                    events.emit(TransportEvent::Data(buffer[..n].to_vec()));
                }
                Err(e) => {
                    return SessionEnd::Failed(format!("Failed to read from {}: {}", endpoint, e));
                }
            },
        }
    }
}
