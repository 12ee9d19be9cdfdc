// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Fleet Configuration Types
//
// Defines the configuration schema for a fleet tracker process, including:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Per-vehicle geofence boundaries
// - Inbound topic subscriptions and the outbound alert topic
// - Ingest timeouts and queue sizing
// - Storage backend selection
// - Network and observability settings

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::geofence::{Coordinates, GeofenceBoundary, GeofenceRegistry};
use crate::domain::position::VehicleId;
use crate::domain::repository::{PostgresConfig, StorageBackend};
use crate::domain::topic::{AlertTopic, TopicFilter, TopicRoute, TopicRouter};

pub const API_VERSION: &str = "100monkeys.ai/v1";
pub const KIND: &str = "FleetConfig";
pub const CONFIG_PATH_ENV: &str = "AEGIS_FLEET_CONFIG_PATH";
pub const DATABASE_URL_ENV: &str = "AEGIS_FLEET_DATABASE_URL";
pub const PORT_ENV: &str = "AEGIS_FLEET_PORT";
pub const BIND_ADDRESS_ENV: &str = "AEGIS_FLEET_BIND_ADDRESS";

/// Top-level Kubernetes-style fleet configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfigManifest {
    /// API version (must be "100monkeys.ai/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "FleetConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: FleetConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Fleet configuration specification (content under spec:)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfigSpec {
    /// Per-vehicle boundaries. Vehicles without an entry are never flagged.
    #[serde(default)]
    pub geofences: Vec<GeofenceConfig>,

    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub storage: StorageBackend,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeofenceConfig {
    pub vehicle_id: String,
    pub center: Coordinates,
    pub radius_meters: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Inbound position topics
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionConfig>,

    /// Per-vehicle alert topic; must contain `{vehicle_id}`
    #[serde(default = "default_alert_topic")]
    pub alert_topic: String,

    /// Messages buffered on the in-process bus before slow receivers lag
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    /// Topic filter (`+` and `#` wildcards allowed)
    pub topic: String,

    /// Vehicle publishing on this topic. When omitted the vehicle id is taken
    /// from the level matched by the first `+` wildcard.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Bound on a single store call
    #[serde(with = "humantime_serde", default = "default_persist_timeout")]
    pub persist_timeout: Duration,

    /// Bound on a single alert publish
    #[serde(with = "humantime_serde", default = "default_notify_timeout")]
    pub notify_timeout: Duration,

    /// Pending messages per vehicle worker before the subscriber applies backpressure
    #[serde(default = "default_vehicle_queue_capacity")]
    pub vehicle_queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network bind address (e.g. "0.0.0.0" or "127.0.0.1")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP API port
    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Prometheus exporter port
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_alert_topic() -> String {
    "vehicle/{vehicle_id}/alert".to_string()
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_persist_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_notify_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_vehicle_queue_capacity() -> usize {
    256
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    3001
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            subscriptions: vec![],
            alert_topic: default_alert_topic(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            persist_timeout: default_persist_timeout(),
            notify_timeout: default_notify_timeout(),
            vehicle_queue_capacity: default_vehicle_queue_capacity(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
        }
    }
}

impl Default for FleetConfigSpec {
    /// The two-vehicle Bangalore fleet the tracker ships with.
    fn default() -> Self {
        let bangalore = Coordinates {
            latitude: 12.9716,
            longitude: 77.5946,
        };

        Self {
            geofences: vec![
                GeofenceConfig {
                    vehicle_id: "vehicle-1".to_string(),
                    center: bangalore,
                    radius_meters: 5000.0,
                },
                GeofenceConfig {
                    vehicle_id: "vehicle-2".to_string(),
                    center: bangalore,
                    radius_meters: 7000.0,
                },
            ],
            broker: BrokerConfig {
                subscriptions: vec![
                    SubscriptionConfig {
                        topic: "GPS/location/1".to_string(),
                        vehicle_id: Some("vehicle-1".to_string()),
                    },
                    SubscriptionConfig {
                        topic: "GPS/location/2".to_string(),
                        vehicle_id: Some("vehicle-2".to_string()),
                    },
                ],
                ..BrokerConfig::default()
            },
            ingest: IngestConfig::default(),
            storage: StorageBackend::InMemory,
            network: NetworkConfig::default(),
            observability: None,
        }
    }
}

impl Default for FleetConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "fleet-tracker".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: FleetConfigSpec::default(),
        }
    }
}

impl FleetConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. AEGIS_FLEET_CONFIG_PATH environment variable
    /// 2. ./fleet-config.yaml (working directory)
    /// 3. ~/.aegis/fleet-config.yaml (user home)
    /// 4. /etc/aegis/fleet-config.yaml (system, Unix) or C:\ProgramData\Aegis\fleet-config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./fleet-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".aegis").join("fleet-config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/aegis/fleet-config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Aegis\\fleet-config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using built-in defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    /// This allows container deployments to override config via env vars
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            if !url.is_empty() {
                tracing::info!("Environment override: {} (storage backend = postgres)", DATABASE_URL_ENV);
                self.spec.storage = match &self.spec.storage {
                    StorageBackend::Postgres(existing) => StorageBackend::Postgres(PostgresConfig {
                        connection_string: url,
                        max_connections: existing.max_connections,
                    }),
                    StorageBackend::InMemory => StorageBackend::Postgres(PostgresConfig::new(url)),
                };
            }
        }

        if let Ok(val) = std::env::var(PORT_ENV) {
            match val.parse::<u16>() {
                Ok(port) => {
                    tracing::info!("Environment override: {}={}", PORT_ENV, port);
                    self.spec.network.port = port;
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for {}: '{}'. Expected a port number. Ignoring.",
                        PORT_ENV,
                        val
                    );
                }
            }
        }

        if let Ok(val) = std::env::var(BIND_ADDRESS_ENV) {
            if !val.is_empty() {
                tracing::info!("Environment override: {}={}", BIND_ADDRESS_ENV, val);
                self.spec.network.bind_address = val;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let mut seen = HashSet::new();
        for geofence in &self.spec.geofences {
            VehicleId::parse(geofence.vehicle_id.as_str())
                .map_err(|e| anyhow::anyhow!("Invalid geofence entry: {}", e))?;
            GeofenceBoundary::new(geofence.center, geofence.radius_meters).map_err(|e| {
                anyhow::anyhow!("Invalid geofence for '{}': {}", geofence.vehicle_id, e)
            })?;
            if !seen.insert(geofence.vehicle_id.as_str()) {
                anyhow::bail!("Duplicate geofence for vehicle '{}'", geofence.vehicle_id);
            }
        }

        for subscription in &self.spec.broker.subscriptions {
            let filter = TopicFilter::parse(&subscription.topic)
                .map_err(|e| anyhow::anyhow!("Invalid subscription: {}", e))?;
            match &subscription.vehicle_id {
                Some(vehicle_id) => {
                    VehicleId::parse(vehicle_id.as_str()).map_err(|e| {
                        anyhow::anyhow!("Invalid vehicle_id for topic '{}': {}", subscription.topic, e)
                    })?;
                }
                None if !filter.has_single_wildcard() => {
                    anyhow::bail!(
                        "Subscription '{}' needs a vehicle_id or a '+' level to take it from",
                        subscription.topic
                    );
                }
                None => {}
            }
        }

        AlertTopic::parse(&self.spec.broker.alert_topic)?;

        if self.spec.broker.channel_capacity == 0 {
            anyhow::bail!("broker.channel_capacity must be greater than zero");
        }

        if self.spec.ingest.vehicle_queue_capacity == 0 {
            anyhow::bail!("ingest.vehicle_queue_capacity must be greater than zero");
        }

        if self.spec.ingest.persist_timeout.is_zero() {
            anyhow::bail!("ingest.persist_timeout must be greater than zero");
        }

        if self.spec.ingest.notify_timeout.is_zero() {
            anyhow::bail!("ingest.notify_timeout must be greater than zero");
        }

        if let StorageBackend::Postgres(postgres) = &self.spec.storage {
            if postgres.connection_string.is_empty() {
                anyhow::bail!("storage.connection_string cannot be empty for the postgres backend");
            }
        }

        Ok(())
    }

    /// Build the immutable boundary lookup used by the ingest pipeline.
    pub fn geofence_registry(&self) -> anyhow::Result<GeofenceRegistry> {
        let boundaries = self
            .spec
            .geofences
            .iter()
            .map(|g| -> anyhow::Result<(VehicleId, GeofenceBoundary)> {
                let vehicle_id = VehicleId::parse(g.vehicle_id.as_str())?;
                let boundary = GeofenceBoundary::new(g.center, g.radius_meters)?;
                Ok((vehicle_id, boundary))
            })
            .collect::<anyhow::Result<HashMap<_, _>>>()?;
        Ok(GeofenceRegistry::new(boundaries))
    }

    pub fn topic_router(&self) -> anyhow::Result<TopicRouter> {
        let routes = self
            .spec
            .broker
            .subscriptions
            .iter()
            .map(|s| -> anyhow::Result<TopicRoute> {
                let filter = TopicFilter::parse(&s.topic)?;
                let vehicle_id = s.vehicle_id.as_deref().map(VehicleId::parse).transpose()?;
                Ok(TopicRoute { filter, vehicle_id })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(TopicRouter::new(routes))
    }

    pub fn alert_topic(&self) -> anyhow::Result<AlertTopic> {
        Ok(AlertTopic::parse(&self.spec.broker.alert_topic)?)
    }

    pub fn logging(&self) -> Option<&LoggingConfig> {
        self.spec.observability.as_ref().and_then(|o| o.logging.as_ref())
    }

    pub fn metrics(&self) -> Option<&MetricsConfig> {
        self.spec.observability.as_ref().and_then(|o| o.metrics.as_ref())
    }
}
