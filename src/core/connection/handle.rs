use crate::core::connection::manager::ConnectionManager;
use crate::core::connection::state::{ConnectionState, DispatchOutcome};
use crate::core::connection::transport::Connector;
use crate::domain::command::Command;
use crate::domain::config::EndpointConfig;
use crate::domain::error::{LayoutLinkError, LayoutLinkResult};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

enum Request {
    Configure {
        config: EndpointConfig,
        reply: oneshot::Sender<()>,
    },
    Dispatch {
        command: Command,
        reply: oneshot::Sender<DispatchOutcome>,
    },
    Teardown {
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to a connection manager running in its own task.
///
/// The task owns the manager and interleaves requests from any number of
/// handles with transport events.
#[derive(Clone)]
pub struct ConnectionHandle {
    requests: mpsc::UnboundedSender<Request>,
    state: watch::Receiver<ConnectionState>,
}

impl ConnectionHandle {
    /// Move `manager` into a background task.
    pub fn spawn<C>(manager: ConnectionManager<C>) -> (Self, JoinHandle<()>)
    where
        C: Connector + 'static,
    {
        let (requests, requests_rx) = mpsc::unbounded_channel();
        let state = manager.subscribe_state();
        let task = tokio::spawn(run(manager, requests_rx));
        (Self { requests, state }, task)
    }

    pub async fn configure(&self, config: EndpointConfig) -> LayoutLinkResult<()> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::Configure { config, reply })?;
        rx.await.map_err(|_| LayoutLinkError::ChannelClosed)
    }

    pub async fn dispatch(&self, command: Command) -> LayoutLinkResult<DispatchOutcome> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::Dispatch { command, reply })?;
        rx.await.map_err(|_| LayoutLinkError::ChannelClosed)
    }

    pub async fn teardown(&self) -> LayoutLinkResult<()> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::Teardown { reply })?;
        rx.await.map_err(|_| LayoutLinkError::ChannelClosed)
    }

    /// Stop the manager task. Further requests fail with `ChannelClosed`.
    pub async fn shutdown(&self) -> LayoutLinkResult<()> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::Shutdown { reply })?;
        rx.await.map_err(|_| LayoutLinkError::ChannelClosed)
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Wait until the connection is up, or fail after `timeout`.
    pub async fn wait_connected(&self, timeout: Duration) -> LayoutLinkResult<()> {
        let mut state = self.state.clone();
        let result =
            match tokio::time::timeout(timeout, state.wait_for(ConnectionState::is_connected)).await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(_)) => Err(LayoutLinkError::ChannelClosed),
                Err(_) => Err(LayoutLinkError::Timeout(format!(
                    "connection (last state: {})",
                    self.state()
                ))),
            };
        result
    }

    fn request(&self, request: Request) -> LayoutLinkResult<()> {
        self.requests
            .send(request)
            .map_err(|_| LayoutLinkError::ChannelClosed)
    }
}

async fn run<C: Connector>(
    mut manager: ConnectionManager<C>,
    mut requests: mpsc::UnboundedReceiver<Request>,
) {
    loop {
        tokio::select! {
            request = requests.recv() => match request {
                Some(Request::Configure { config, reply }) => {
                    manager.configure(config).await;
                    let _ = reply.send(());
                }
                Some(Request::Dispatch { command, reply }) => {
                    let _ = reply.send(manager.dispatch(&command));
                }
                Some(Request::Teardown { reply }) => {
                    manager.teardown().await;
                    let _ = reply.send(());
                }
                Some(Request::Shutdown { reply }) => {
                    manager.shutdown().await;
                    let _ = reply.send(());
                    break;
                }
                None => {
                    manager.shutdown().await;
                    break;
                }
            },
            Some(envelope) = manager.next_transport_event() => {
                manager.handle_event(envelope);
            }
        }
    }
    debug!("Connection manager task stopped");
}
