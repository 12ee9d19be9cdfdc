// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contract for position reports. The interface lives in the
//! domain layer; implementations live in `crate::infrastructure::repositories`.
//!
//! | Trait | Record | Implementations |
//! |-------|--------|-----------------|
//! | `PositionRepository` | `PositionReport` | `InMemoryPositionRepository`, `PostgresPositionRepository` |
//!
//! The store is append-only from the core's point of view: there is no update
//! or delete. Reads order by `timestamp` descending with ties broken by
//! insertion order (the most recently appended record wins).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::position::{NewPositionReport, PositionReport, VehicleId};

/// Upper bound on the number of records a single history read may return.
pub const MAX_HISTORY_LIMIT: usize = 100;

/// Clamps a caller-supplied history limit to [`MAX_HISTORY_LIMIT`].
pub fn clamp_history_limit(limit: usize) -> usize {
    limit.min(MAX_HISTORY_LIMIT)
}

/// Storage backend enum for pluggable persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageBackend {
    InMemory,
    Postgres(PostgresConfig),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub connection_string: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl PostgresConfig {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

/// Append-only store of position reports.
#[async_trait]
pub trait PositionRepository: Send + Sync {
    /// Persist a report, assigning its id and (when absent) its timestamp.
    async fn append(&self, report: NewPositionReport) -> Result<PositionReport, RepositoryError>;

    /// Most recent report for the vehicle.
    async fn latest(&self, vehicle_id: &VehicleId) -> Result<Option<PositionReport>, RepositoryError>;

    /// Up to `clamp_history_limit(limit)` reports, newest first.
    async fn history(
        &self,
        vehicle_id: &VehicleId,
        limit: usize,
    ) -> Result<Vec<PositionReport>, RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_history_limit() {
        assert_eq!(clamp_history_limit(0), 0);
        assert_eq!(clamp_history_limit(10), 10);
        assert_eq!(clamp_history_limit(100), 100);
        assert_eq!(clamp_history_limit(usize::MAX), MAX_HISTORY_LIMIT);
    }

    #[test]
    fn test_sqlx_errors_map_to_repository_errors() {
        assert!(matches!(
            RepositoryError::from(sqlx::Error::RowNotFound),
            RepositoryError::NotFound(_)
        ));
        assert!(matches!(
            RepositoryError::from(sqlx::Error::PoolTimedOut),
            RepositoryError::Database(_)
        ));
    }

    #[test]
    fn test_storage_backend_yaml() {
        let backend: StorageBackend = serde_yaml::from_str("backend: in_memory").unwrap();
        assert_eq!(backend, StorageBackend::InMemory);

        let backend: StorageBackend = serde_yaml::from_str(
            "backend: postgres\nconnection_string: postgres://fleet@localhost/fleet\n",
        )
        .unwrap();
        match backend {
            StorageBackend::Postgres(config) => {
                assert_eq!(config.connection_string, "postgres://fleet@localhost/fleet");
                assert_eq!(config.max_connections, 5);
            }
            other => panic!("expected postgres backend, got {:?}", other),
        }
    }
}
