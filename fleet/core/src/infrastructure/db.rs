// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Connection Pool
//!
//! Wraps `sqlx::postgres::PgPool` in a thin `Database` newtype that is
//! injected into [`PostgresPositionRepository`](super::repositories::PostgresPositionRepository).
//! Only used when `spec.storage.backend` is `postgres`.

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::domain::repository::PostgresConfig;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS position_reports (
        seq BIGSERIAL PRIMARY KEY,
        id UUID NOT NULL UNIQUE,
        vehicle_id TEXT NOT NULL,
        latitude DOUBLE PRECISION NOT NULL,
        longitude DOUBLE PRECISION NOT NULL,
        recorded_at TIMESTAMPTZ NOT NULL,
        inside_geofence BOOLEAN NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_position_reports_vehicle_time
        ON position_reports (vehicle_id, recorded_at DESC, seq DESC)
    "#,
];

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self { pool })
    }

    /// Creates the position table and its index if they do not exist.
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to apply position_reports schema")?;
        }
        info!("Position store schema ready");
        Ok(())
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }
}
