// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates the concrete position store for the configured [`StorageBackend`].
//! The domain layer only sees the `PositionRepository` trait.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::domain::repository::{PositionRepository, StorageBackend};
use crate::infrastructure::db::Database;
use crate::infrastructure::repositories::{InMemoryPositionRepository, PostgresPositionRepository};

/// Creates a PositionRepository implementation based on the configured backend.
/// For PostgreSQL this connects and applies the schema.
pub async fn create_position_repository(backend: &StorageBackend) -> Result<Arc<dyn PositionRepository>> {
    match backend {
        StorageBackend::InMemory => {
            info!("Using in-memory position store");
            Ok(Arc::new(InMemoryPositionRepository::new()))
        }
        StorageBackend::Postgres(config) => {
            let database = Database::connect(config).await?;
            database.migrate().await?;
            info!(max_connections = config.max_connections, "Using PostgreSQL position store");
            Ok(Arc::new(PostgresPositionRepository::new(database.get_pool().clone())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::VehicleId;

    #[tokio::test]
    async fn test_in_memory_backend() {
        let repository = create_position_repository(&StorageBackend::InMemory).await.unwrap();
        let latest = repository.latest(&VehicleId::parse("vehicle-1").unwrap()).await.unwrap();
        assert!(latest.is_none());
    }
}
