// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Tracing subscriber setup

use anyhow::{Context, Result};
use std::path::Path;

use aegis_fleet_core::domain::fleet_config::FleetConfigManifest;

const DEFAULT_LEVEL: &str = "info";
const DEFAULT_FORMAT: &str = "text";

/// Pick the log level and format: CLI/env flags first, then the
/// `observability.logging` section of the discovered config, then defaults.
pub fn resolve_logging(
    config_path: Option<&Path>,
    level: Option<&str>,
    format: Option<&str>,
) -> (String, String) {
    let from_file = if level.is_some() && format.is_some() {
        None
    } else {
        FleetConfigManifest::load_or_default(config_path.map(Path::to_path_buf))
            .ok()
            .and_then(|config| config.logging().cloned())
    };

    let level = level
        .map(str::to_string)
        .or_else(|| from_file.as_ref().map(|l| l.level.clone()))
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string());
    let format = format
        .map(str::to_string)
        .or_else(|| from_file.as_ref().map(|l| l.format.clone()))
        .unwrap_or_else(|| DEFAULT_FORMAT.to_string());

    (level, format)
}

/// Initialize tracing subscriber for logging. `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        "json" => builder.json().init(),
        "text" => builder.compact().init(),
        other => anyhow::bail!("Unknown log format '{}'. Expected 'text' or 'json'", other),
    }

    Ok(())
}
