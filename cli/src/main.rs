// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # AEGIS Fleet Tracker CLI
//!
//! The `aegis-fleet` binary runs the position tracking server and talks to a
//! running one over HTTP.
//!
//! ## Commands
//!
//! - `aegis-fleet serve` - Run the ingest pipeline and HTTP API
//! - `aegis-fleet config show|validate|generate` - Configuration management
//! - `aegis-fleet location latest|history|status <vehicle>` - Query positions
//! - `aegis-fleet publish <topic> --lat --lng` - Inject a position report
//! - `aegis-fleet alerts` - Follow geofence alerts

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use aegis_fleet::commands::{self, ConfigCommand, LocationCommand, PublishArgs};
use aegis_fleet::daemon::{self, ServerOverrides};
use aegis_fleet::logging::{init_logging, resolve_logging};

/// AEGIS Fleet Tracker - vehicle positions and geofence alerts
#[derive(Parser)]
#[command(name = "aegis-fleet")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "AEGIS_FLEET_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// HTTP API port (default: 3001)
    #[arg(long, global = true, env = "AEGIS_FLEET_PORT")]
    port: Option<u16>,

    /// HTTP API host (default: 127.0.0.1)
    #[arg(long, global = true, env = "AEGIS_FLEET_HOST")]
    host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "AEGIS_FLEET_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (text, json)
    #[arg(long, global = true, env = "AEGIS_FLEET_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tracker server
    #[command(name = "serve")]
    Serve,

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Query stored positions on a running server
    #[command(name = "location")]
    Location {
        #[command(subcommand)]
        command: LocationCommand,
    },

    /// Publish a position report through a running server
    #[command(name = "publish")]
    Publish(PublishArgs),

    /// Follow geofence alerts from a running server
    #[command(name = "alerts")]
    Alerts {
        /// Only show alerts for this vehicle
        #[arg(long, value_name = "VEHICLE_ID")]
        vehicle: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let (level, format) = resolve_logging(
        cli.config.as_deref(),
        cli.log_level.as_deref(),
        cli.log_format.as_deref(),
    );
    init_logging(&level, &format)?;

    let host = cli.host.as_deref().unwrap_or(daemon::DEFAULT_HOST);
    let port = cli.port.unwrap_or(daemon::DEFAULT_PORT);

    match cli.command {
        Some(Commands::Serve) => {
            let overrides = ServerOverrides {
                bind_address: cli.host.clone(),
                port: cli.port,
            };
            daemon::start_server(cli.config, overrides).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Location { command }) => {
            commands::location::handle_command(command, host, port).await
        }
        Some(Commands::Publish(args)) => commands::publish::handle_command(args, host, port).await,
        Some(Commands::Alerts { vehicle }) => {
            commands::location::follow_alerts(vehicle.as_deref(), host, port).await
        }
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}
