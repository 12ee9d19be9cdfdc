// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! PostgreSQL implementation of PositionRepository
//!
//! Reports are written to the `position_reports` table created by
//! [`Database::migrate`](crate::infrastructure::db::Database::migrate).
//! `seq` is a BIGSERIAL used only to break timestamp ties.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::domain::position::{NewPositionReport, PositionReport, ReportId, VehicleId};
use crate::domain::repository::{clamp_history_limit, PositionRepository, RepositoryError};

pub struct PostgresPositionRepository {
    pool: PgPool,
}

impl PostgresPositionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn deserialize_row(row: &sqlx::postgres::PgRow) -> Result<PositionReport, RepositoryError> {
        let id: Uuid = row
            .try_get("id")
            .map_err(|e| RepositoryError::Database(format!("Missing id: {}", e)))?;
        let vehicle_id: String = row
            .try_get("vehicle_id")
            .map_err(|e| RepositoryError::Database(format!("Missing vehicle_id: {}", e)))?;
        let latitude: f64 = row
            .try_get("latitude")
            .map_err(|e| RepositoryError::Database(format!("Missing latitude: {}", e)))?;
        let longitude: f64 = row
            .try_get("longitude")
            .map_err(|e| RepositoryError::Database(format!("Missing longitude: {}", e)))?;
        let timestamp: DateTime<Utc> = row
            .try_get("recorded_at")
            .map_err(|e| RepositoryError::Database(format!("Missing recorded_at: {}", e)))?;
        let inside_geofence: bool = row
            .try_get("inside_geofence")
            .map_err(|e| RepositoryError::Database(format!("Missing inside_geofence: {}", e)))?;

        Ok(PositionReport {
            id: ReportId(id),
            vehicle_id: VehicleId::parse(vehicle_id)
                .map_err(|e| RepositoryError::Serialization(e.to_string()))?,
            latitude,
            longitude,
            timestamp,
            inside_geofence,
        })
    }
}

#[async_trait]
impl PositionRepository for PostgresPositionRepository {
    async fn append(&self, report: NewPositionReport) -> Result<PositionReport, RepositoryError> {
        let stored = PositionReport::from_new(report, ReportId::new(), Utc::now());

        sqlx::query(
            r#"
            INSERT INTO position_reports (id, vehicle_id, latitude, longitude, recorded_at, inside_geofence)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(stored.id.0)
        .bind(stored.vehicle_id.as_str())
        .bind(stored.latitude)
        .bind(stored.longitude)
        .bind(stored.timestamp)
        .bind(stored.inside_geofence)
        .execute(&self.pool)
        .await?;

        debug!(vehicle_id = %stored.vehicle_id, report_id = %stored.id, "Stored position report");
        Ok(stored)
    }

    async fn latest(&self, vehicle_id: &VehicleId) -> Result<Option<PositionReport>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, vehicle_id, latitude, longitude, recorded_at, inside_geofence
            FROM position_reports
            WHERE vehicle_id = $1
            ORDER BY recorded_at DESC, seq DESC
            LIMIT 1
            "#,
        )
        .bind(vehicle_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::deserialize_row).transpose()
    }

    async fn history(
        &self,
        vehicle_id: &VehicleId,
        limit: usize,
    ) -> Result<Vec<PositionReport>, RepositoryError> {
        let limit = clamp_history_limit(limit);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT id, vehicle_id, latitude, longitude, recorded_at, inside_geofence
            FROM position_reports
            WHERE vehicle_id = $1
            ORDER BY recorded_at DESC, seq DESC
            LIMIT $2
            "#,
        )
        .bind(vehicle_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::deserialize_row).collect()
    }
}
