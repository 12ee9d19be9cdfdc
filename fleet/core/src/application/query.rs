// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Position Query Use Case
//!
//! Read-only access to stored position reports.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Answer latest / history / geofence-status queries
//! - **Collaborators:** Domain: `PositionRepository`
//!
//! "No data" is `Ok(None)` (or an empty history), never an error. Only a
//! failing store produces a [`QueryError`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::position::{PositionReport, VehicleId};
use crate::domain::repository::{clamp_history_limit, PositionRepository, RepositoryError, MAX_HISTORY_LIMIT};

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Current boundary verdict for a vehicle, derived from its latest report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceStatus {
    pub vehicle_id: VehicleId,
    pub is_within_geofence: bool,
    pub last_location: LastLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

impl From<PositionReport> for GeofenceStatus {
    fn from(report: PositionReport) -> Self {
        Self {
            is_within_geofence: report.inside_geofence,
            last_location: LastLocation {
                latitude: report.latitude,
                longitude: report.longitude,
                timestamp: report.timestamp,
            },
            vehicle_id: report.vehicle_id,
        }
    }
}

#[async_trait]
pub trait PositionQueryService: Send + Sync {
    /// Most recent report, or `None` when the vehicle has never reported.
    async fn get_latest(&self, vehicle_id: &VehicleId) -> Result<Option<PositionReport>, QueryError>;

    /// Newest-first history. `limit` defaults to, and is capped at, 100.
    async fn get_history(
        &self,
        vehicle_id: &VehicleId,
        limit: Option<usize>,
    ) -> Result<Vec<PositionReport>, QueryError>;

    async fn get_geofence_status(&self, vehicle_id: &VehicleId) -> Result<Option<GeofenceStatus>, QueryError>;
}

pub struct StandardPositionQueryService {
    repository: Arc<dyn PositionRepository>,
}

impl StandardPositionQueryService {
    pub fn new(repository: Arc<dyn PositionRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl PositionQueryService for StandardPositionQueryService {
    async fn get_latest(&self, vehicle_id: &VehicleId) -> Result<Option<PositionReport>, QueryError> {
        Ok(self.repository.latest(vehicle_id).await?)
    }

    async fn get_history(
        &self,
        vehicle_id: &VehicleId,
        limit: Option<usize>,
    ) -> Result<Vec<PositionReport>, QueryError> {
        let limit = clamp_history_limit(limit.unwrap_or(MAX_HISTORY_LIMIT));
        Ok(self.repository.history(vehicle_id, limit).await?)
    }

    async fn get_geofence_status(&self, vehicle_id: &VehicleId) -> Result<Option<GeofenceStatus>, QueryError> {
        Ok(self.repository.latest(vehicle_id).await?.map(GeofenceStatus::from))
    }
}
