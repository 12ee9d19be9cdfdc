// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Position query commands
//!
//! Commands: latest, history, status (plus `alerts` following)

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use aegis_fleet_core::domain::position::PositionReport;

use crate::daemon::DaemonClient;

#[derive(Subcommand)]
pub enum LocationCommand {
    /// Latest reported position
    Latest {
        vehicle_id: String,

        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Recent positions, newest first
    History {
        vehicle_id: String,

        /// Number of reports (server caps at 100)
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Current geofence status
    Status {
        vehicle_id: String,

        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_command(command: LocationCommand, host: &str, port: u16) -> Result<()> {
    let client = DaemonClient::new(host, port)?;

    match command {
        LocationCommand::Latest { vehicle_id, json } => {
            match client.latest_location(&vehicle_id).await? {
                Some(report) if json => println!("{}", serde_json::to_string_pretty(&report)?),
                Some(report) => print_report(&report),
                None => no_data(&vehicle_id),
            }
        }
        LocationCommand::History {
            vehicle_id,
            limit,
            json,
        } => {
            let history = client.location_history(&vehicle_id, limit).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else if history.is_empty() {
                no_data(&vehicle_id);
            } else {
                println!("{}", format!("{} reports for {}", history.len(), vehicle_id).bold());
                for report in &history {
                    print_report(report);
                }
            }
        }
        LocationCommand::Status { vehicle_id, json } => {
            match client.geofence_status(&vehicle_id).await? {
                Some(status) if json => println!("{}", serde_json::to_string_pretty(&status)?),
                Some(status) => {
                    let verdict = if status.is_within_geofence {
                        "inside geofence".green()
                    } else {
                        "OUTSIDE geofence".red().bold()
                    };
                    println!("{}: {}", status.vehicle_id.to_string().bold(), verdict);
                    println!(
                        "  Last location: ({}, {}) at {}",
                        status.last_location.latitude,
                        status.last_location.longitude,
                        status.last_location.timestamp.to_rfc3339()
                    );
                }
                None => no_data(&vehicle_id),
            }
        }
    }

    Ok(())
}

/// Print alerts as they arrive until the server closes the stream.
pub async fn follow_alerts(vehicle_id: Option<&str>, host: &str, port: u16) -> Result<()> {
    let client = DaemonClient::new(host, port)?;
    println!("{}", "Waiting for geofence alerts (Ctrl+C to stop)...".dimmed());

    client
        .stream_alerts(vehicle_id, |event| {
            let alert = &event["alert"];
            let kind = alert["kind"].as_str().unwrap_or("UNKNOWN");
            let kind = if kind == "GEOFENCE_VIOLATION" {
                kind.red().bold()
            } else {
                kind.green().bold()
            };
            println!(
                "{} {} {} ({}, {})",
                alert["timestamp"].as_str().unwrap_or("-").dimmed(),
                kind,
                event["topic"].as_str().unwrap_or("-"),
                alert["location"]["latitude"],
                alert["location"]["longitude"],
            );
            if let Some(message) = alert["message"].as_str() {
                println!("  {}", message);
            }
        })
        .await
}

fn print_report(report: &PositionReport) {
    let verdict = if report.inside_geofence {
        "inside".green()
    } else {
        "outside".red()
    };
    println!(
        "  {}  ({:.6}, {:.6})  {}",
        report.timestamp.to_rfc3339().dimmed(),
        report.latitude,
        report.longitude,
        verdict
    );
}

fn no_data(vehicle_id: &str) {
    println!("{}", format!("No location data found for {}", vehicle_id).yellow());
}
