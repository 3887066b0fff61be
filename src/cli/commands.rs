use crate::cli::args::{Args, Command, ConfigArgs, ConfigCommand, EndpointArgs};
use crate::cli::output::{ConsoleWriter, OutputWriter};
use crate::core::connection::{
    ConnectionHandle, ConnectionManager, DispatchOutcome, ManagerEvents,
};
use crate::domain::command::Command as DeviceCommand;
use crate::domain::config::{AppConfig, EndpointConfig, GlobalConfig};
use crate::domain::error::{LayoutLinkError, LayoutLinkResult};
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::tcp::TcpConnector;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Execute CLI command
pub async fn execute_command(args: Args) -> LayoutLinkResult<()> {
    let writer = ConsoleWriter::new(args.format, args.quiet);

    // Load configuration using ConfigManager
    let config_manager = ConfigManager::new()?;
    let mut config = if let Some(config_path) = &args.config {
        config_manager.load_config_from_path(config_path.as_ref())?
    } else {
        config_manager.load_config()?
    };
    apply_endpoint_overrides(&mut config.endpoint, args.endpoint);

    // Initialize logging
    if !args.quiet {
        setup_logging(&config.global, args.verbose)?;
    }

    match args.command {
        Command::Login => send_command(DeviceCommand::Login, &config, &writer).await,
        Command::RecallLayout { id, advance } => {
            send_command(DeviceCommand::recall_layout(id, advance)?, &config, &writer).await
        }
        Command::SwitchAudio { input, output } => {
            send_command(DeviceCommand::switch_audio(input, output)?, &config, &writer).await
        }
        Command::Monitor => monitor(&config, &writer).await,
        Command::Config(config_args) => {
            execute_config_command(config_args, &writer, &config, &config_manager)
        }
        Command::Version => {
            writer.write_message(&format!("layoutlink {}", env!("CARGO_PKG_VERSION")))?;
            Ok(())
        }
    }
}

/// Overlay command line endpoint settings on the loaded configuration
pub fn apply_endpoint_overrides(endpoint: &mut EndpointConfig, overrides: EndpointArgs) {
    if let Some(host) = overrides.host {
        endpoint.host = Some(host);
    }
    if let Some(port) = overrides.port {
        endpoint.port = port;
    }
    if let Some(user) = overrides.user {
        endpoint.user = user;
    }
    if let Some(pass) = overrides.pass {
        endpoint.pass = pass;
    }
    if let Some(need_ack) = overrides.need_ack {
        endpoint.need_ack = need_ack;
    }
}

fn start_client(config: &AppConfig) -> (ConnectionHandle, ManagerEvents, JoinHandle<()>) {
    let connector = TcpConnector::new(config.global.transport_settings());
    let (manager, events) = ConnectionManager::new(connector);
    let (handle, task) = ConnectionHandle::spawn(manager);
    (handle, events, task)
}

async fn stop_client(handle: ConnectionHandle, task: JoinHandle<()>) -> LayoutLinkResult<()> {
    handle.shutdown().await?;
    if let Err(e) = task.await {
        warn!("Connection task ended with error: {}", e);
    }
    Ok(())
}

fn flush_events(events: &mut ManagerEvents, writer: &ConsoleWriter) -> LayoutLinkResult<()> {
    while let Ok(event) = events.try_recv() {
        writer.write_event(&event)?;
    }
    Ok(())
}

async fn send_command(
    command: DeviceCommand,
    config: &AppConfig,
    writer: &ConsoleWriter,
) -> LayoutLinkResult<()> {
    if config.endpoint.host().is_none() {
        return Err(LayoutLinkError::ConfigurationIncomplete);
    }

    let (handle, mut events, task) = start_client(config);
    handle.configure(config.endpoint.clone()).await?;

    let ready = handle
        .wait_connected(Duration::from_millis(config.global.ready_timeout_ms))
        .await;
    flush_events(&mut events, writer)?;
    if let Err(e) = ready {
        stop_client(handle, task).await?;
        return Err(e);
    }

    let outcome = handle.dispatch(command).await?;
    writer.write_dispatch(&command, outcome)?;
    let state = handle.state();

    stop_client(handle, task).await?;
    flush_events(&mut events, writer)?;

    match outcome {
        DispatchOutcome::Sent => Ok(()),
        DispatchOutcome::Dropped => Err(LayoutLinkError::NotConnectedDropped {
            command: command.name().to_string(),
            state: state.to_string(),
        }),
    }
}

async fn monitor(config: &AppConfig, writer: &ConsoleWriter) -> LayoutLinkResult<()> {
    if config.endpoint.host().is_none() {
        return Err(LayoutLinkError::ConfigurationIncomplete);
    }

    let (handle, mut events, task) = start_client(config);
    let mut state = handle.subscribe();
    handle.configure(config.endpoint.clone()).await?;

    let current = state.borrow_and_update().clone();
    writer.write_state(&current)?;

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            Some(event) = events.recv() => writer.write_event(&event)?,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = state.borrow_and_update().clone();
                writer.write_state(&current)?;
            }
            _ = &mut interrupt => {
                info!("Interrupted, closing connection");
                break;
            }
        }
    }

    stop_client(handle, task).await
}

fn execute_config_command(
    args: ConfigArgs,
    writer: &ConsoleWriter,
    config: &AppConfig,
    config_manager: &ConfigManager,
) -> LayoutLinkResult<()> {
    match args.command {
        ConfigCommand::Show => {
            let mut shown = config.clone();
            if !shown.endpoint.pass.is_empty() {
                shown.endpoint.pass = "********".to_string();
            }
            writer.write_message(&format!(
                "# global: {}",
                config_manager.get_global_config_path_ref().display()
            ))?;
            if let Some(project) = config_manager.get_project_config_path() {
                writer.write_message(&format!("# project: {}", project.display()))?;
            }
            writer.write_config(&shown)?;
            Ok(())
        }
        ConfigCommand::Init => {
            let current_dir = std::env::current_dir()?;
            let path = config_manager.init_project_config(&current_dir)?;
            writer.write_message(&format!("Created project configuration at {}", path.display()))?;
            Ok(())
        }
    }
}

fn setup_logging(global: &GlobalConfig, verbose: bool) -> LayoutLinkResult<()> {
    let level = if verbose { "debug" } else { global.log_level.as_str() };
    init_logging(level).map_err(|e| LayoutLinkError::Config {
        message: format!("Failed to initialize logging: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::AckFlag;

    #[test]
    fn test_endpoint_overrides() {
        let mut endpoint = EndpointConfig::with_host("10.0.0.1");
        apply_endpoint_overrides(
            &mut endpoint,
            EndpointArgs {
                host: Some("10.0.0.5".to_string()),
                port: None,
                user: Some("admin".to_string()),
                pass: Some("secret".to_string()),
                need_ack: Some(AckFlag::No),
            },
        );

        assert_eq!(endpoint.host(), Some("10.0.0.5"));
        assert_eq!(endpoint.port, 6464);
        assert_eq!(endpoint.user, "admin");
        assert_eq!(endpoint.pass, "secret");
        assert_eq!(endpoint.need_ack, AckFlag::No);
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let mut endpoint = EndpointConfig::with_host("10.0.0.1");
        let before = endpoint.clone();
        apply_endpoint_overrides(&mut endpoint, EndpointArgs::default());
        assert_eq!(endpoint, before);
    }

    #[tokio::test]
    async fn test_send_without_host_fails() {
        let writer = ConsoleWriter::new(crate::cli::args::OutputFormat::Text, true);
        let result = send_command(DeviceCommand::Login, &AppConfig::default(), &writer).await;
        assert!(matches!(result, Err(LayoutLinkError::ConfigurationIncomplete)));
    }
}
