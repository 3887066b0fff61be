use crate::cli::args::OutputFormat;
use crate::core::connection::{ConnectionState, DispatchOutcome, ManagerEvent};
use crate::domain::command::Command;
use crate::domain::config::AppConfig;
use serde::Serialize;
use std::io;

/// Output writer trait for different formats
pub trait OutputWriter {
    fn write_event(&self, event: &ManagerEvent) -> Result<(), OutputError>;
    fn write_state(&self, state: &ConnectionState) -> Result<(), OutputError>;
    fn write_dispatch(&self, command: &Command, outcome: DispatchOutcome) -> Result<(), OutputError>;
    fn write_config(&self, config: &AppConfig) -> Result<(), OutputError>;
    fn write_message(&self, message: &str) -> Result<(), OutputError>;
    fn write_error(&self, error: &str) -> Result<(), OutputError>;
}

/// Output formatting errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("TOML serialization error: {0}")]
    TomlError(#[from] toml::ser::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl From<OutputError> for crate::domain::error::LayoutLinkError {
    fn from(err: OutputError) -> Self {
        Self::Output(err.to_string())
    }
}

#[derive(Serialize)]
struct DispatchRecord<'a> {
    command: &'a Command,
    sent: bool,
}

/// Console output writer
pub struct ConsoleWriter {
    format: OutputFormat,
    quiet: bool,
}

impl ConsoleWriter {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }

    fn print_json<T: Serialize>(&self, value: &T) -> Result<(), OutputError> {
        println!("{}", serde_json::to_string(value)?);
        Ok(())
    }

    fn render_error(&self, error: &str) -> String {
        match self.format {
            OutputFormat::Text => format!("Error: {}", error),
            OutputFormat::Json => serde_json::json!({ "error": error }).to_string(),
        }
    }
}

impl OutputWriter for ConsoleWriter {
    fn write_event(&self, event: &ManagerEvent) -> Result<(), OutputError> {
        if self.quiet {
            return Ok(());
        }
        match self.format {
            OutputFormat::Text => {
                match event {
                    ManagerEvent::Status(status) => println!("status  {}", status),
                    ManagerEvent::Log { level, message } => {
                        println!("log     [{:?}] {}", level, message)
                    }
                }
                Ok(())
            }
            OutputFormat::Json => self.print_json(event),
        }
    }

    fn write_state(&self, state: &ConnectionState) -> Result<(), OutputError> {
        if self.quiet {
            return Ok(());
        }
        match self.format {
            OutputFormat::Text => {
                println!("state   {}", state);
                Ok(())
            }
            OutputFormat::Json => self.print_json(state),
        }
    }

    fn write_dispatch(&self, command: &Command, outcome: DispatchOutcome) -> Result<(), OutputError> {
        if self.quiet {
            return Ok(());
        }
        let sent = outcome == DispatchOutcome::Sent;
        match self.format {
            OutputFormat::Text => {
                if sent {
                    println!("Sent: {}", command);
                } else {
                    println!("Dropped: {} (not connected)", command);
                }
                Ok(())
            }
            OutputFormat::Json => self.print_json(&DispatchRecord { command, sent }),
        }
    }

    fn write_config(&self, config: &AppConfig) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                print!("{}", toml::to_string_pretty(config)?);
                Ok(())
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(config)?);
                Ok(())
            }
        }
    }

    fn write_message(&self, message: &str) -> Result<(), OutputError> {
        if self.quiet {
            return Ok(());
        }
        match self.format {
            OutputFormat::Text => {
                println!("{}", message);
                Ok(())
            }
            OutputFormat::Json => self.print_json(&serde_json::json!({ "message": message })),
        }
    }

    fn write_error(&self, error: &str) -> Result<(), OutputError> {
        eprintln!("{}", self.render_error(error));
        Ok(())
    }
}
