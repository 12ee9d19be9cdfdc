// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Geofence Alerts
//!
//! Verdict transitions and the alert messages they produce. Alerts are
//! transient: they are published and never stored.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::geofence::Coordinates;
use crate::domain::position::VehicleId;

/// Direction of a change between two consecutive verdicts for one vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerdictTransition {
    /// inside → outside
    Exited,
    /// outside → inside
    Entered,
}

impl VerdictTransition {
    /// `None` when the verdict did not change.
    pub fn between(previous_inside: bool, current_inside: bool) -> Option<Self> {
        match (previous_inside, current_inside) {
            (true, false) => Some(Self::Exited),
            (false, true) => Some(Self::Entered),
            _ => None,
        }
    }

    pub fn alert_kind(self) -> AlertKind {
        match self {
            Self::Exited => AlertKind::GeofenceViolation,
            Self::Entered => AlertKind::GeofenceRestored,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    GeofenceViolation,
    GeofenceRestored,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::GeofenceViolation => "GEOFENCE_VIOLATION",
            AlertKind::GeofenceRestored => "GEOFENCE_RESTORED",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AlertKind::GeofenceViolation => "Vehicle has left the designated area",
            AlertKind::GeofenceRestored => "Vehicle has returned to the designated area",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub vehicle_id: VehicleId,
    pub kind: AlertKind,
    pub timestamp: DateTime<Utc>,
    pub location: Coordinates,
}

impl Alert {
    pub fn new(
        vehicle_id: VehicleId,
        transition: VerdictTransition,
        location: Coordinates,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            vehicle_id,
            kind: transition.alert_kind(),
            timestamp,
            location,
        }
    }

    /// Body published on the vehicle's alert channel.
    pub fn payload(&self) -> AlertPayload {
        AlertPayload {
            kind: self.kind,
            message: self.kind.message().to_string(),
            timestamp: self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            location: self.location,
        }
    }
}

/// Wire shape: `{kind, message, timestamp, location:{latitude, longitude}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub kind: AlertKind,
    pub message: String,
    pub timestamp: String,
    pub location: Coordinates,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to serialize alert: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Outbound alert channel. Implementations deliver to a per-vehicle topic.
#[async_trait]
pub trait AlertPublisher: Send + Sync {
    async fn publish(&self, alert: &Alert) -> Result<(), PublishError>;
}
