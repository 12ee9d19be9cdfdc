// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Fleet server implementation
//!
//! Startup order: configuration → metrics exporter → store → bus → notifier →
//! pipeline → subscriber → HTTP. Shutdown runs the other way: HTTP stops
//! accepting, the subscriber is cancelled and its per-vehicle workers drain.

use anyhow::{Context, Result};
use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use aegis_fleet_core::application::repository_factory::create_position_repository;
use aegis_fleet_core::application::{
    AlertNotifier, IngestPipeline, IngestSubscriber, StandardPositionQueryService,
};
use aegis_fleet_core::domain::fleet_config::FleetConfigManifest;
use aegis_fleet_core::infrastructure::message_bus::MessageBus;
use aegis_fleet_core::presentation::api::{self, AppState};

/// Network settings given on the command line; they win over the config file.
#[derive(Debug, Clone, Default)]
pub struct ServerOverrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
}

/// Everything `serve` runs, wired from one configuration.
pub struct FleetServices {
    pub bus: MessageBus,
    pub subscriber: Arc<IngestSubscriber>,
    pub router: Router,
}

pub async fn build_services(config: &FleetConfigManifest) -> Result<FleetServices> {
    let registry = Arc::new(config.geofence_registry()?);
    let topic_router = config.topic_router()?;
    let bus = MessageBus::with_alert_topic(config.spec.broker.channel_capacity, config.alert_topic()?);

    let repository = create_position_repository(&config.spec.storage)
        .await
        .context("Failed to initialize position store")?;

    let notifier = Arc::new(AlertNotifier::new(
        Arc::new(bus.clone()),
        config.spec.ingest.notify_timeout,
    ));
    let pipeline = Arc::new(IngestPipeline::new(
        registry.clone(),
        repository.clone(),
        notifier,
        config.spec.ingest.persist_timeout,
    ));
    let subscriber = Arc::new(IngestSubscriber::new(
        pipeline,
        bus.clone(),
        topic_router,
        config.spec.ingest.vehicle_queue_capacity,
    ));

    let queries = Arc::new(StandardPositionQueryService::new(repository));
    let router = api::app(AppState::new(queries, bus.clone()));

    info!(
        geofences = registry.len(),
        subscriptions = config.spec.broker.subscriptions.len(),
        "Fleet services initialized"
    );

    Ok(FleetServices {
        bus,
        subscriber,
        router,
    })
}

pub async fn start_server(config_path: Option<PathBuf>, overrides: ServerOverrides) -> Result<()> {
    let mut config = FleetConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    if let Some(bind_address) = overrides.bind_address {
        config.spec.network.bind_address = bind_address;
    }
    if let Some(port) = overrides.port {
        config.spec.network.port = port;
    }

    config
        .validate()
        .context("Configuration validation failed")?;

    info!("Configuration loaded: {}", config.metadata.name);

    if let Some(metrics) = config.metrics().filter(|m| m.enabled) {
        let addr = SocketAddr::from(([0, 0, 0, 0], metrics.port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to start Prometheus exporter")?;
        info!("Prometheus metrics exposed on {}", addr);
    }

    let services = build_services(&config).await?;

    let shutdown_token = services.subscriber.shutdown_token();
    let subscriber_handle = services.subscriber.clone().start();

    let addr = format!(
        "{}:{}",
        config.spec.network.bind_address, config.spec.network.port
    );
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Fleet server listening on {}", addr);

    let served = axum::serve(listener, services.router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed");

    info!("Fleet server shutting down, draining vehicle workers");
    shutdown_token.cancel();
    if let Err(e) = subscriber_handle.await {
        error!(error = %e, "Ingest subscriber task failed");
    }

    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
