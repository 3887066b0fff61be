use crate::domain::config::AckFlag;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Command line arguments for LayoutLink
#[derive(Parser, Debug)]
#[command(
    name = "layoutlink",
    version = env!("CARGO_PKG_VERSION"),
    about = "Control client for layout and audio routing controllers",
    long_about = "Sends authenticated layout recall and audio routing commands to a controller over a persistent TCP control channel."
)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Endpoint overrides
    #[command(flatten)]
    pub endpoint: EndpointArgs,

    /// Command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Endpoint settings that override the configuration file
#[derive(ClapArgs, Debug, Default)]
pub struct EndpointArgs {
    /// Controller address
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Controller TCP port
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Login username
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Login password
    #[arg(long, global = true)]
    pub pass: Option<String>,

    /// Ask the controller to acknowledge commands (yes/no)
    #[arg(long, global = true)]
    pub need_ack: Option<AckFlag>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send the login block only
    Login,
    /// Recall a stored layout
    RecallLayout {
        /// Layout ID (1-256)
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..=256))]
        id: u16,
        /// Advance the layout
        #[arg(long)]
        advance: bool,
    },
    /// Route an audio input to an output
    SwitchAudio {
        /// Input ID (1-256)
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..=256))]
        input: u16,
        /// Output ID (1-256)
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..=256))]
        output: u16,
    },
    /// Stay connected and print status changes until interrupted
    Monitor,
    /// Configuration management commands
    Config(ConfigArgs),
    /// Display version information
    Version,
}

/// Configuration management arguments
#[derive(ClapArgs, Debug)]
pub struct ConfigArgs {
    /// Configuration subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Create a project configuration in the current directory
    Init,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_switch_audio() {
        let args = Args::try_parse_from([
            "layoutlink",
            "--host",
            "10.0.0.5",
            "switch-audio",
            "--input",
            "3",
            "--output",
            "7",
        ])
        .unwrap();

        assert_eq!(args.endpoint.host.as_deref(), Some("10.0.0.5"));
        assert!(matches!(args.command, Command::SwitchAudio { input: 3, output: 7 }));
    }

    #[test]
    fn test_parse_recall_layout_flags() {
        let args = Args::try_parse_from([
            "layoutlink",
            "recall-layout",
            "--id",
            "256",
            "--advance",
            "--need-ack",
            "no",
        ])
        .unwrap();

        assert!(matches!(args.command, Command::RecallLayout { id: 256, advance: true }));
        assert_eq!(args.endpoint.need_ack, Some(AckFlag::No));
    }

    #[test]
    fn test_ids_out_of_range_rejected() {
        assert!(Args::try_parse_from(["layoutlink", "recall-layout", "--id", "0"]).is_err());
        assert!(Args::try_parse_from([
            "layoutlink",
            "switch-audio",
            "--input",
            "1",
            "--output",
            "257"
        ])
        .is_err());
    }

    #[test]
    fn test_output_format() {
        let args = Args::try_parse_from(["layoutlink", "--format", "json", "monitor"]).unwrap();
        assert_eq!(args.format, OutputFormat::Json);
        assert!(matches!(args.command, Command::Monitor));
    }
}
