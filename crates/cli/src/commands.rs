//! CLI command definitions for chatdeck.
//!
//! Provides the command-line interface for driving a simulated realtime
//! session and managing its configuration.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Main CLI application.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, long_version = LONG_VERSION)]
pub struct Cli {
    /// Logging verbosity
    #[arg(short, long, default_value_t = 0, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "CHATDECK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\nbuilt: ",
    env!("CLI_BUILD_TIMESTAMP"),
    "\ncommit: ",
    env!("CLI_GIT_COMMIT"),
);

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive a simulated realtime session and print its events
    Simulate(SimulateArgs),

    /// List the recognized event types
    Events(EventsArgs),

    /// Inspect or create the configuration file
    Config(ConfigArgs),
}

/// Simulated session arguments.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of messages to send
    #[arg(short, long, default_value_t = 3)]
    pub messages: u32,

    /// Panel the messages are routed to
    #[arg(short, long, default_value = "chat")]
    pub panel: String,

    /// Processing steps run for the last message, comma separated
    #[arg(long, value_delimiter = ',', default_value = "analyze,generate,review")]
    pub steps: Vec<String>,

    /// Force a connection loss after sending to watch the reconnect
    #[arg(long, default_value_t = false)]
    pub drop_connection: bool,

    /// How long to wait for outstanding events before disconnecting
    #[arg(long, default_value_t = 3000)]
    pub settle_ms: u64,

    /// Seed for reproducible jitter and connection loss
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Event listing arguments.
#[derive(Args, Debug)]
pub struct EventsArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Configuration management arguments.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,

    /// Write the default configuration to a file
    Init {
        /// Destination path
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line of text per event
    Text,
    /// One JSON document per line
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
