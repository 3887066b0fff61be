use crate::core::connection::state::{
    ConnectionState, DispatchOutcome, LogLevel, ManagerEvent, StatusLevel, StatusUpdate,
};
use crate::core::connection::transport::{
    Connector, EventSink, Generation, Transport, TransportEnvelope, TransportEvent,
};
use crate::core::encoder;
use crate::domain::command::Command;
use crate::domain::config::EndpointConfig;
use crate::domain::error::LayoutLinkError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

/// Receiver for status notifications and diagnostics.
pub type ManagerEvents = mpsc::UnboundedReceiver<ManagerEvent>;

struct ActiveTransport {
    generation: Generation,
    handle: Box<dyn Transport>,
}

/// Owns the connection to a single controller.
///
/// The manager holds at most one transport at a time. Transport events are
/// fed back through [`ConnectionManager::handle_event`]; anything reported by
/// a transport that has since been torn down is ignored.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    config: EndpointConfig,
    state: ConnectionState,
    transport: Option<ActiveTransport>,
    generation: Generation,
    transport_tx: mpsc::UnboundedSender<TransportEnvelope>,
    transport_rx: mpsc::UnboundedReceiver<TransportEnvelope>,
    events: mpsc::UnboundedSender<ManagerEvent>,
    state_tx: watch::Sender<ConnectionState>,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C) -> (Self, ManagerEvents) {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        let manager = Self {
            connector,
            config: EndpointConfig::default(),
            state: ConnectionState::Disconnected,
            transport: None,
            generation: 0,
            transport_tx,
            transport_rx,
            events,
            state_tx,
        };

        (manager, events_rx)
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    /// Replace the configuration and reconnect.
    ///
    /// Any existing transport is closed before the new one is opened.
    /// Without a host the manager stays `Disconnected`.
    pub async fn configure(&mut self, config: EndpointConfig) {
        self.teardown().await;
        self.config = config;

        let Some(host) = self.config.host().map(str::to_string) else {
            debug!("{}", LayoutLinkError::ConfigurationIncomplete);
            self.log(LogLevel::Info, LayoutLinkError::ConfigurationIncomplete.to_string());
            return;
        };
        let port = self.config.port;

        self.generation += 1;
        let sink = EventSink::new(self.generation, self.transport_tx.clone());

        self.set_state(ConnectionState::Connecting);
        self.notify(StatusUpdate::connecting());
        info!("Connecting to {}:{}", host, port);

        let handle = self.connector.connect(&host, port, sink);
        self.transport = Some(ActiveTransport {
            generation: self.generation,
            handle,
        });
    }

    /// Close the current transport, if any. Safe to call repeatedly.
    pub async fn teardown(&mut self) {
        if let Some(mut active) = self.transport.take() {
            active.handle.close().await;
            info!(
                "Closed connection to {} (generation {})",
                self.config.address().unwrap_or_default(),
                active.generation
            );
        }
        self.set_state(ConnectionState::Disconnected);
    }

    /// Final teardown when the manager is disposed.
    pub async fn shutdown(&mut self) {
        self.teardown().await;
        debug!("Connection manager shut down");
    }

    /// Encode `command` and write it if connected, otherwise drop it.
    ///
    /// Transport events already queued are applied first so the decision
    /// sees the latest state.
    pub fn dispatch(&mut self, command: &Command) -> DispatchOutcome {
        self.process_pending_events();

        let payload = encoder::encode(command, &self.config.credentials());
        debug!(
            "Sending {} to {}: {}",
            command.name(),
            self.config.host().unwrap_or("<no host>"),
            String::from_utf8_lossy(&payload)
        );

        let written = match self.transport.as_mut() {
            Some(active) if self.state.is_connected() => Some(active.handle.send(payload)),
            _ => None,
        };

        match written {
            Some(Ok(())) => DispatchOutcome::Sent,
            Some(Err(e)) => {
                self.on_transport_error(e.to_string());
                self.drop_command(command)
            }
            None => self.drop_command(command),
        }
    }

    fn drop_command(&self, command: &Command) -> DispatchOutcome {
        let dropped = LayoutLinkError::NotConnectedDropped {
            command: command.name().to_string(),
            state: self.state.to_string(),
        };
        warn!("{}", dropped);
        self.log(LogLevel::Warn, dropped.to_string());
        DispatchOutcome::Dropped
    }

    /// Wait for the next transport event.
    pub async fn next_transport_event(&mut self) -> Option<TransportEnvelope> {
        self.transport_rx.recv().await
    }

    /// Handle every transport event already queued. Returns how many were taken.
    pub fn process_pending_events(&mut self) -> usize {
        let mut count = 0;
        while let Ok(envelope) = self.transport_rx.try_recv() {
            self.handle_event(envelope);
            count += 1;
        }
        count
    }

    /// Apply a transport event if it belongs to the current transport.
    pub fn handle_event(&mut self, envelope: TransportEnvelope) {
        let current = self.transport.as_ref().map(|active| active.generation);
        if current != Some(envelope.generation) {
            trace!(
                "Ignoring {:?} from stale transport generation {}",
                envelope.event,
                envelope.generation
            );
            return;
        }

        match envelope.event {
            TransportEvent::StatusChange { level, message } => {
                self.on_transport_status_change(level, message)
            }
            TransportEvent::Connected => self.on_transport_connected(),
            TransportEvent::Error(message) => self.on_transport_error(message),
            TransportEvent::Data(data) => self.on_transport_data(&data),
        }
    }

    /// Forward transport status to the observer; the coarse state is untouched.
    pub fn on_transport_status_change(&mut self, level: StatusLevel, message: Option<String>) {
        self.notify(StatusUpdate { level, message });
    }

    pub fn on_transport_error(&mut self, message: String) {
        error!("Network error: {}", message);
        self.set_state(ConnectionState::Error(message.clone()));
        self.notify(StatusUpdate::error(message.clone()));
        self.log(LogLevel::Error, format!("Network error: {}", message));
    }

    pub fn on_transport_connected(&mut self) {
        info!("Connected to {}", self.config.address().unwrap_or_default());
        self.set_state(ConnectionState::Connected);
        self.notify(StatusUpdate::ok());
    }

    /// Inbound data has no defined grammar and is discarded.
    pub fn on_transport_data(&mut self, data: &[u8]) {
        trace!("Discarding {} inbound bytes: {}", data.len(), hex::encode(data));
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!("Connection state {} -> {}", self.state, state);
            self.state = state.clone();
            self.state_tx.send_replace(state);
        }
    }

    fn notify(&self, status: StatusUpdate) {
        let _ = self.events.send(ManagerEvent::Status(status));
    }

    fn log(&self, level: LogLevel, message: String) {
        let _ = self.events.send(ManagerEvent::Log { level, message });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::connection::transport::fake::FakeConnector;
    use crate::domain::config::AckFlag;

    fn scenario_config() -> EndpointConfig {
        EndpointConfig {
            host: Some("10.0.0.5".to_string()),
            port: 6464,
            need_ack: AckFlag::Yes,
            user: "admin".to_string(),
            pass: "secret".to_string(),
        }
    }

    fn drain(events: &mut ManagerEvents) -> Vec<ManagerEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    async fn connected_manager() -> (ConnectionManager<FakeConnector>, FakeConnector, ManagerEvents) {
        let connector = FakeConnector::new();
        let (mut manager, events) = ConnectionManager::new(connector.clone());
        manager.configure(scenario_config()).await;
        connector.log().last_sink().emit(TransportEvent::Connected);
        manager.process_pending_events();
        (manager, connector, events)
    }

    #[tokio::test]
    async fn test_configure_opens_connection() {
        let connector = FakeConnector::new();
        let (mut manager, mut events) = ConnectionManager::new(connector.clone());

        manager.configure(scenario_config()).await;

        assert_eq!(manager.state(), &ConnectionState::Connecting);
        assert_eq!(
            connector.log().opened,
            vec![("10.0.0.5".to_string(), 6464, 1)]
        );
        assert_eq!(
            drain(&mut events),
            vec![ManagerEvent::Status(StatusUpdate::connecting())]
        );
    }

    #[tokio::test]
    async fn test_switch_audio_scenario() {
        let (mut manager, connector, _events) = connected_manager().await;
        assert_eq!(manager.state(), &ConnectionState::Connected);

        let outcome = manager.dispatch(&Command::SwitchAudio { input_id: 3, output_id: 7 });
        assert_eq!(outcome, DispatchOutcome::Sent);

        let log = connector.log();
        assert_eq!(log.writes.len(), 1);
        assert_eq!(
            String::from_utf8(log.writes[0].1.clone()).unwrap(),
            concat!(
                r#"<setup version="1"><username>admin</username><password>secret</password><needack>Yes</needack></setup>"#,
                r#"<audio><connect input_id="3" output_id="7"/></audio>"#
            )
        );
    }

    #[tokio::test]
    async fn test_configure_without_host_stays_disconnected() {
        let connector = FakeConnector::new();
        let (mut manager, mut events) = ConnectionManager::new(connector.clone());

        manager
            .configure(EndpointConfig {
                host: None,
                ..scenario_config()
            })
            .await;
        assert_eq!(manager.state(), &ConnectionState::Disconnected);
        assert!(connector.log().opened.is_empty());
        drain(&mut events);

        assert_eq!(manager.dispatch(&Command::Login), DispatchOutcome::Dropped);
        assert!(connector.log().writes.is_empty());
        assert!(matches!(
            drain(&mut events).as_slice(),
            [ManagerEvent::Log { level: LogLevel::Warn, .. }]
        ));
    }

    #[tokio::test]
    async fn test_dispatch_dropped_unless_connected() {
        let connector = FakeConnector::new();
        let (mut manager, _events) = ConnectionManager::new(connector.clone());

        assert_eq!(manager.dispatch(&Command::Login), DispatchOutcome::Dropped);
        assert_eq!(manager.state(), &ConnectionState::Disconnected);

        manager.configure(scenario_config()).await;
        assert_eq!(manager.dispatch(&Command::Login), DispatchOutcome::Dropped);
        assert_eq!(manager.state(), &ConnectionState::Connecting);

        connector
            .log()
            .last_sink()
            .emit(TransportEvent::Error("connection refused".to_string()));
        manager.process_pending_events();
        assert_eq!(manager.dispatch(&Command::Login), DispatchOutcome::Dropped);
        assert_eq!(
            manager.state(),
            &ConnectionState::Error("connection refused".to_string())
        );

        assert!(connector.log().writes.is_empty());
    }

    #[tokio::test]
    async fn test_error_after_connect() {
        let (mut manager, connector, mut events) = connected_manager().await;
        drain(&mut events);

        connector
            .log()
            .last_sink()
            .emit(TransportEvent::Error("reset by peer".to_string()));
        manager.process_pending_events();

        assert_eq!(
            manager.state(),
            &ConnectionState::Error("reset by peer".to_string())
        );
        let emitted = drain(&mut events);
        assert_eq!(
            emitted[0],
            ManagerEvent::Status(StatusUpdate::error("reset by peer"))
        );
        // The socket stays with the manager; closing is the transport's job.
        assert!(manager.has_transport());
        assert!(connector.log().closed.is_empty());

        let outcome = manager.dispatch(&Command::RecallLayout { id: 2, advance: false });
        assert_eq!(outcome, DispatchOutcome::Dropped);
        assert!(connector.log().writes.is_empty());
    }

    #[tokio::test]
    async fn test_reconfigure_keeps_single_transport() {
        let connector = FakeConnector::new();
        let (mut manager, _events) = ConnectionManager::new(connector.clone());

        manager.configure(scenario_config()).await;
        manager.configure(EndpointConfig::with_host("10.0.0.6")).await;

        let log = connector.log();
        assert_eq!(log.opened.len(), 2);
        assert_eq!(log.closed, vec![1]);
        assert_eq!(log.live(), vec![2]);
    }

    #[tokio::test]
    async fn test_stale_events_are_ignored() {
        let connector = FakeConnector::new();
        let (mut manager, _events) = ConnectionManager::new(connector.clone());

        manager.configure(scenario_config()).await;
        let old_sink = connector.log().last_sink();
        manager.configure(scenario_config()).await;

        old_sink.emit(TransportEvent::Connected);
        manager.process_pending_events();
        assert_eq!(manager.state(), &ConnectionState::Connecting);

        connector.log().last_sink().emit(TransportEvent::Connected);
        manager.process_pending_events();
        assert_eq!(manager.state(), &ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent() {
        let (mut manager, connector, _events) = connected_manager().await;

        manager.teardown().await;
        manager.teardown().await;

        assert_eq!(manager.state(), &ConnectionState::Disconnected);
        assert!(!manager.has_transport());
        assert_eq!(connector.log().closed, vec![1]);
    }

    #[tokio::test]
    async fn test_shutdown_without_connection() {
        let connector = FakeConnector::new();
        let (mut manager, _events) = ConnectionManager::new(connector.clone());

        manager.shutdown().await;

        assert_eq!(manager.state(), &ConnectionState::Disconnected);
        assert!(connector.log().closed.is_empty());
    }

    #[tokio::test]
    async fn test_status_change_forwarded_without_state_change() {
        let connector = FakeConnector::new();
        let (mut manager, mut events) = ConnectionManager::new(connector.clone());
        manager.configure(scenario_config()).await;
        drain(&mut events);

        connector
            .log()
            .last_sink()
            .status(StatusLevel::Warning, "Resolving host");
        manager.process_pending_events();

        assert_eq!(manager.state(), &ConnectionState::Connecting);
        assert_eq!(
            drain(&mut events),
            vec![ManagerEvent::Status(StatusUpdate::warning("Resolving host"))]
        );
    }

    #[tokio::test]
    async fn test_inbound_data_is_ignored() {
        let (mut manager, connector, mut events) = connected_manager().await;
        drain(&mut events);

        connector
            .log()
            .last_sink()
            .emit(TransportEvent::Data(b"<ack/>".to_vec()));
        manager.process_pending_events();

        assert_eq!(manager.state(), &ConnectionState::Connected);
        assert!(drain(&mut events).is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_moves_to_error() {
        let connector = FakeConnector {
            fail_writes: true,
            ..FakeConnector::new()
        };
        let (mut manager, _events) = ConnectionManager::new(connector.clone());
        manager.configure(scenario_config()).await;
        connector.log().last_sink().emit(TransportEvent::Connected);
        manager.process_pending_events();

        assert_eq!(manager.dispatch(&Command::Login), DispatchOutcome::Dropped);
        assert!(matches!(manager.state(), ConnectionState::Error(_)));
    }

    #[tokio::test]
    async fn test_dispatch_applies_queued_error_first() {
        let (mut manager, connector, mut events) = connected_manager().await;
        drain(&mut events);

        // Reported by the transport but not yet handled.
        connector
            .log()
            .last_sink()
            .emit(TransportEvent::Error("reset by peer".to_string()));

        assert_eq!(manager.dispatch(&Command::Login), DispatchOutcome::Dropped);
        assert!(connector.log().writes.is_empty());
        assert_eq!(
            manager.state(),
            &ConnectionState::Error("reset by peer".to_string())
        );
        assert!(drain(&mut events).iter().any(|event| matches!(
            event,
            ManagerEvent::Log { level: LogLevel::Warn, message } if message.contains("dropped login")
        )));
    }

    #[tokio::test]
    async fn test_rejected_write_reports_dropped_command() {
        let connector = FakeConnector {
            fail_writes: true,
            ..FakeConnector::new()
        };
        let (mut manager, mut events) = ConnectionManager::new(connector.clone());
        manager.configure(scenario_config()).await;
        connector.log().last_sink().emit(TransportEvent::Connected);
        manager.process_pending_events();
        drain(&mut events);

        assert_eq!(
            manager.dispatch(&Command::SwitchAudio { input_id: 1, output_id: 2 }),
            DispatchOutcome::Dropped
        );
        let emitted = drain(&mut events);
        assert!(matches!(emitted[0], ManagerEvent::Status(_)));
        assert!(emitted.iter().any(|event| matches!(
            event,
            ManagerEvent::Log { level: LogLevel::Warn, message } if message.contains("switch_audio")
        )));
    }

    #[tokio::test]
    async fn test_state_watch_follows_transitions() {
        let (manager, _connector, _events) = connected_manager().await;
        let watcher = manager.subscribe_state();
        assert_eq!(*watcher.borrow(), ConnectionState::Connected);
    }
}
