// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Publish a position report through the server's HTTP bridge

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde_json::json;

use crate::daemon::DaemonClient;

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Inbound topic, e.g. GPS/location/1
    pub topic: String,

    /// Latitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lng: f64,

    /// RFC 3339 timestamp (default: server receive time)
    #[arg(long)]
    pub timestamp: Option<String>,
}

/// Wire payload for one report.
pub fn position_payload(args: &PublishArgs) -> Result<serde_json::Value> {
    let mut payload = json!({
        "latitude": args.lat,
        "longitude": args.lng,
    });

    if let Some(raw) = &args.timestamp {
        let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("Invalid timestamp '{}'", raw))?
            .with_timezone(&Utc);
        payload["timestamp"] = json!(timestamp.to_rfc3339());
    }

    Ok(payload)
}

pub async fn handle_command(args: PublishArgs, host: &str, port: u16) -> Result<()> {
    let payload = position_payload(&args)?;
    let client = DaemonClient::new(host, port)?;
    let ack = client.publish_position(&args.topic, &payload).await?;

    if ack.delivered == 0 {
        println!(
            "{}",
            format!("Published to {} but no subscriber was listening", ack.topic).yellow()
        );
    } else {
        println!("{}", format!("✓ Published to {}", ack.topic).green());
    }

    Ok(())
}
