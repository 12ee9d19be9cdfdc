// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use aegis_fleet_core::domain::fleet_config::{FleetConfigManifest, CONFIG_PATH_ENV};
use aegis_fleet_core::domain::repository::StorageBackend;

const TEMPLATE: &str = include_str!("../../templates/fleet-config.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./fleet-config.yaml)
        #[arg(short, long, default_value = "./fleet-config.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, force } => generate(output, force).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = FleetConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./fleet-config.yaml");
        println!("  4. ~/.aegis/fleet-config.yaml");
        println!("  5. /etc/aegis/fleet-config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    println!("{}", "Geofences:".bold());
    if config.spec.geofences.is_empty() {
        println!("  {}", "(none - every vehicle is always inside)".dimmed());
    }
    for geofence in &config.spec.geofences {
        println!(
            "  {} → ({}, {}) radius {} m",
            geofence.vehicle_id.bold(),
            geofence.center.latitude,
            geofence.center.longitude,
            geofence.radius_meters
        );
    }
    println!();

    println!("{}", "Subscriptions:".bold());
    for subscription in &config.spec.broker.subscriptions {
        match &subscription.vehicle_id {
            Some(vehicle_id) => println!("  {} → {}", subscription.topic, vehicle_id),
            None => println!("  {} → {}", subscription.topic, "(vehicle from topic)".dimmed()),
        }
    }
    println!("  Alert topic: {}", config.spec.broker.alert_topic);
    println!();

    println!("{}", "Storage:".bold());
    match &config.spec.storage {
        StorageBackend::InMemory => println!("  Backend: in_memory"),
        StorageBackend::Postgres(postgres) => {
            println!("  Backend: postgres");
            println!("  Max connections: {}", postgres.max_connections);
        }
    }
    println!();

    println!("{}", "Network:".bold());
    println!(
        "  Listen: {}:{}",
        config.spec.network.bind_address, config.spec.network.port
    );
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = FleetConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }

    std::fs::write(&output, TEMPLATE)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_is_valid() {
        let config = FleetConfigManifest::from_yaml_str(TEMPLATE).unwrap();
        config.validate().unwrap();
        assert_eq!(config.spec.geofences.len(), 2);
    }

    #[tokio::test]
    async fn test_generate_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("fleet-config.yaml");

        generate(output.clone(), false).await.unwrap();
        assert!(generate(output.clone(), false).await.is_err());
        generate(output.clone(), true).await.unwrap();

        validate(Some(output)).await.unwrap();
    }
}
