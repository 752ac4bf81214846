//! CLI application entry point and configuration.
//!
//! This module provides the main CLI application logic, including argument parsing,
//! configuration loading, and command dispatch.

use crate::commands::{
    Cli, Commands, ConfigArgs, ConfigCommand, EventsArgs, OutputFormat, SimulateArgs,
};
use crate::error::{CliError, Result};
use chatdeck_core::{
    ChatdeckConfig, EventKind, LogLevel, OutgoingMessage, ProcessingStep, RealtimeEvent,
};
use chatdeck_realtime::{RealtimeService, SimulatedNetwork};
use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Main CLI application.
#[derive(Debug)]
pub struct App {
    /// Effective configuration.
    pub config: ChatdeckConfig,
    /// File the configuration was read from, if any.
    pub config_path: Option<PathBuf>,
    /// Parsed CLI arguments.
    pub cli: Cli,
}

impl App {
    /// Create a new application instance from command line arguments.
    pub fn new() -> Result<Self> {
        Self::from_cli(Cli::parse())
    }

    /// Create an application instance from already parsed arguments.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let (config, config_path) = Self::load_config(&cli)?;
        Ok(Self {
            config,
            config_path,
            cli,
        })
    }

    /// Load configuration from the given file, else the default location.
    fn load_config(cli: &Cli) -> Result<(ChatdeckConfig, Option<PathBuf>)> {
        if let Some(config_path) = &cli.config {
            if !config_path.exists() {
                return Err(CliError::Config(format!(
                    "Configuration file not found: {}",
                    config_path.display()
                )));
            }
            let config = ChatdeckConfig::load(config_path)?;
            return Ok((config, Some(config_path.clone())));
        }

        match ChatdeckConfig::default_path() {
            Ok(path) if path.exists() => {
                let config = ChatdeckConfig::load(&path)?;
                Ok((config, Some(path)))
            }
            _ => Ok((ChatdeckConfig::default(), None)),
        }
    }

    /// Run the application.
    pub fn run(self) -> Result<()> {
        self.setup_logging();

        match &self.cli.command {
            Commands::Simulate(args) => self.handle_simulate(args),
            Commands::Events(args) => self.handle_events(args),
            Commands::Config(args) => self.handle_config(args),
        }
    }

    /// Set up logging; `-v` flags override the configured level.
    fn setup_logging(&self) {
        let level = log_level(self.cli.verbose, self.config.logging.level);

        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init()
            .ok(); // Ignore errors if a subscriber is already installed
    }

    fn handle_simulate(&self, args: &SimulateArgs) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CliError::Internal(format!("failed to start runtime: {}", e)))?;
        runtime.block_on(self.simulate(args))
    }

    async fn simulate(&self, args: &SimulateArgs) -> Result<()> {
        let realtime = self.config.realtime.clone();
        let service = match args.seed {
            Some(seed) => {
                let network = SimulatedNetwork::seeded(seed, realtime.connection_loss_probability);
                RealtimeService::with_network(realtime, network)?
            }
            None => RealtimeService::new(realtime)?,
        };

        let format = args.format;
        for kind in EventKind::ALL {
            service.subscribe(kind, move |event| {
                println!("{}", render_event(event, format)?);
                Ok(())
            });
        }

        let connection_id = service.connect().await?;
        info!(connection_id = %connection_id, panel = %args.panel, "session started");

        let mut last_message = None;
        for index in 1..=args.messages {
            let draft = OutgoingMessage::text(format!("message {} of {}", index, args.messages));
            let sent = service.send_message(draft, args.panel.as_str()).await?;
            last_message = Some(sent.id);
        }

        let steps = processing_steps(&args.steps);
        match last_message {
            Some(message_id) if !steps.is_empty() => {
                service.start_processing(message_id, steps).await?;
            }
            Some(_) => {}
            None if !steps.is_empty() => warn!("no messages sent, skipping processing"),
            None => {}
        }

        if args.drop_connection && !service.force_connection_loss() {
            warn!("connection was already down, nothing to drop");
        }

        tokio::time::sleep(Duration::from_millis(args.settle_ms)).await;

        service.disconnect().await?;
        service.dispose();
        Ok(())
    }

    fn handle_events(&self, args: &EventsArgs) -> Result<()> {
        write_event_kinds(&mut std::io::stdout().lock(), args.format)
    }

    fn handle_config(&self, args: &ConfigArgs) -> Result<()> {
        match &args.command {
            ConfigCommand::Show => {
                if let Some(path) = &self.config_path {
                    println!("# loaded from {}", path.display());
                }
                print!("{}", toml::to_string_pretty(&self.config)?);
                Ok(())
            }
            ConfigCommand::Init { path, force } => {
                write_default_config(path, *force)?;
                println!("wrote default configuration to {}", path.display());
                Ok(())
            }
        }
    }
}

/// Map `-v` occurrences onto a tracing level, falling back to the config.
fn log_level(verbosity: u8, configured: LogLevel) -> tracing::Level {
    match verbosity {
        0 => match configured {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        },
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}

fn processing_steps(names: &[String]) -> Vec<ProcessingStep> {
    names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(ProcessingStep::from)
        .collect()
}

fn write_event_kinds(out: &mut impl Write, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let names: Vec<&str> = EventKind::ALL.iter().map(EventKind::as_str).collect();
            writeln!(out, "{}", serde_json::to_string_pretty(&names)?)?;
        }
        OutputFormat::Text => {
            for kind in EventKind::ALL {
                writeln!(out, "{}", kind)?;
            }
        }
    }
    Ok(())
}

fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(CliError::Command(format!(
            "{} already exists, use --force to overwrite",
            path.display()
        )));
    }
    ChatdeckConfig::default().save(path)?;
    Ok(())
}

/// One output line for `event`.
fn render_event(event: &RealtimeEvent, format: OutputFormat) -> anyhow::Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string(event)?);
    }

    let detail = match event {
        RealtimeEvent::ConnectionStateChanged(change) => format!(
            "connected={} id={}",
            change.connected,
            change.connection_id.as_deref().unwrap_or("-")
        ),
        RealtimeEvent::MessageSent(sent) => {
            format!("id={} panel={}", sent.id, sent.target_panel)
        }
        RealtimeEvent::MessageReceived(receipt) => format!(
            "message={} receipt={}",
            receipt.original_message_id, receipt.receipt_id
        ),
        RealtimeEvent::ProcessingStarted(started) => format!(
            "message={} steps={}",
            started.message_id,
            started.steps.len()
        ),
        RealtimeEvent::ProcessingStepUpdated(update) => format!(
            "message={} step={} name={}",
            update.message_id, update.current_step, update.step_name
        ),
        RealtimeEvent::ProcessingCompleted(done) => {
            format!("message={} steps={}", done.message_id, done.steps.len())
        }
        RealtimeEvent::Error(payload) => {
            format!("code={} message={:?}", payload.code, payload.message)
        }
    };
    Ok(format!("{:<26} {}", event.kind(), detail))
}


/// Parse command line arguments and run the application.
pub fn run() -> Result<()> {
    let app = App::new()?;
    app.run()
}
