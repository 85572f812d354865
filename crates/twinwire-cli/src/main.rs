#![deny(unsafe_code)]

//! TwinWire command-line entry point.
//!
//! Hosts a daemon pair end to end: `demo` runs a user and a system
//! messenger over the in-memory hub and drives command round-trips
//! between them; `config` validates and prints the resolved settings.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use twinwire_config::AppConfig;
use twinwire_core::{
    ConnectionState, Envelope, MemoryHub, Messenger, MessengerConfig, MessengerEvent,
    MessengerHandle, Payload, Priority, Role,
};

/// TwinWire, a dual-daemon messaging layer.
#[derive(Parser)]
#[command(name = "twinwire", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "twinwire.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a self-contained user/system daemon pair over the in-memory hub.
    Demo {
        /// Command verb the user daemon sends each cycle.
        #[arg(long, default_value = "ping")]
        command: String,

        /// Number of command round-trips to run.
        #[arg(long, default_value_t = 3)]
        cycles: u32,
    },

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(cli.verbose))),
        )
        .init();

    match cli.command {
        Commands::Demo { command, cycles } => cmd_demo(&cli.config, &command, cycles).await?,
        Commands::Config { show } => cmd_config(&cli.config, show).await?,
    }

    Ok(())
}

/// Default log filter for a given `-v` count; `RUST_LOG` overrides it.
fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

async fn cmd_demo(config_path: &Path, command: &str, cycles: u32) -> Result<()> {
    let app = load_config(config_path).await?;
    let base = MessengerConfig::from_app(&app)?;

    let hub = MemoryHub::new();
    let (system, system_events) = start_messenger(&hub, demo_config(&base, Role::System)).await?;
    let (user, mut user_events) = start_messenger(&hub, demo_config(&base, Role::User)).await?;
    println!("demo: user and system daemons connected");

    // The system daemon answers commands until it observes its own
    // disconnect, then the task unwinds on its own.
    let responder = tokio::spawn(respond_loop(system.clone(), system_events));

    for cycle in 1..=cycles {
        let started = Instant::now();
        match user.send_command(command, None, Priority::Normal).await {
            Ok(envelope) => print_response(cycle, cycles, command, &envelope, started),
            Err(err) => println!("[{cycle}/{cycles}] {command}: {err}"),
        }
        drain_user_events(&mut user_events);
    }

    user.disconnect().await?;
    system.disconnect().await?;
    responder.await?;
    println!("demo: disconnected");
    Ok(())
}

fn demo_config(base: &MessengerConfig, role: Role) -> MessengerConfig {
    let mut config = base.clone();
    config.role = role;
    config.client_id = format!("twinwire-demo-{role}");
    // The in-memory hub needs no broker credentials.
    if !config.is_configured() {
        config.publish_key = "demo-local".to_string();
        config.subscribe_key = "demo-local".to_string();
    }
    config
}

async fn start_messenger(
    hub: &MemoryHub,
    config: MessengerConfig,
) -> Result<(MessengerHandle, mpsc::Receiver<MessengerEvent>)> {
    let role = config.role;
    let (transport, transport_rx) = hub.endpoint();
    let (messenger, handle, events) = Messenger::new(config, transport, transport_rx);
    tokio::spawn(messenger.run());
    handle.connect().await?;
    info!(role = %role, "demo messenger connected");
    Ok((handle, events))
}

/// The system daemon's side of the demo: answer every command, stop once
/// the disconnect shows up on the observer channel.
async fn respond_loop(handle: MessengerHandle, mut events: mpsc::Receiver<MessengerEvent>) {
    let started = Instant::now();
    while let Some(event) = events.recv().await {
        let envelope = match event {
            MessengerEvent::Message(envelope) => envelope,
            MessengerEvent::ConnectionStatus(ConnectionState::Disconnected) => break,
            _ => continue,
        };
        let Payload::Command { command, .. } = &envelope.payload else {
            continue;
        };
        println!("  system: answering {command:?}");
        let response = match command.as_str() {
            "ping" => envelope.reply_ok(Role::System, Some("pong".to_string())),
            "status" => {
                let uptime = format!("up {:.1}s, all channels nominal", started.elapsed().as_secs_f64());
                envelope.reply_ok(Role::System, Some(uptime))
            }
            other => envelope.reply_err(Role::System, format!("unknown command {other:?}")),
        };
        if handle.publish_envelope(response, None).await.is_err() {
            break;
        }
    }
}

fn print_response(
    cycle: u32,
    cycles: u32,
    command: &str,
    envelope: &Envelope,
    started: Instant,
) {
    let Payload::Response {
        success,
        result,
        error_message,
        ..
    } = &envelope.payload
    else {
        return;
    };
    let elapsed = started.elapsed().as_millis();
    if *success {
        let result = result.as_deref().unwrap_or("(no result)");
        println!("[{cycle}/{cycles}] {command} ok: {result} ({elapsed} ms)");
    } else {
        let reason = error_message.as_deref().unwrap_or("(no reason)");
        println!("[{cycle}/{cycles}] {command} failed: {reason}");
    }
}

/// Print whatever the user daemon observed since the last cycle.
fn drain_user_events(events: &mut mpsc::Receiver<MessengerEvent>) {
    while let Ok(event) = events.try_recv() {
        match event {
            MessengerEvent::Message(envelope) => match &envelope.payload {
                Payload::Heartbeat { uptime_secs, .. } => {
                    println!("  heartbeat from {}: up {uptime_secs:.1}s", envelope.source);
                }
                Payload::SystemStatus { status, .. } => {
                    println!("  status from {}: {status}", envelope.source);
                }
                _ => {}
            },
            MessengerEvent::ConnectionStatus(state) => {
                info!(state = %state, "user connection state");
            }
            MessengerEvent::Error(cause) => eprintln!("  transport error: {cause}"),
        }
    }
}

async fn cmd_config(config_path: &Path, show: bool) -> Result<()> {
    let config = load_config(config_path).await?;
    if show {
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

async fn load_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        AppConfig::load(path).await.map_err(|e| anyhow::anyhow!(e))
    } else {
        info!(path = %path.display(), "config file not found, using defaults");
        Ok(AppConfig::default())
    }
}
