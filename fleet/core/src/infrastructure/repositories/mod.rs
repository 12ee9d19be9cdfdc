// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of [`PositionRepository`].
//!
//! - **InMemoryPositionRepository** - process-local store for development and tests
//! - **PostgresPositionRepository** - durable store backed by the
//!   `position_reports` table (see `infrastructure::db`)
//!
//! Both order reads by timestamp descending, breaking ties by append order so
//! the most recently appended report wins.

pub mod postgres_position;

pub use postgres_position::PostgresPositionRepository;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::position::{NewPositionReport, PositionReport, ReportId, VehicleId};
use crate::domain::repository::{clamp_history_limit, PositionRepository, RepositoryError};

/// (append sequence, report)
type Sequenced = (u64, PositionReport);

#[derive(Default)]
struct Inner {
    next_seq: u64,
    by_vehicle: HashMap<VehicleId, Vec<Sequenced>>,
}

#[derive(Clone, Default)]
pub struct InMemoryPositionRepository {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryPositionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored reports across all vehicles.
    pub fn len(&self) -> usize {
        self.inner.read().by_vehicle.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn newest_first(a: &Sequenced, b: &Sequenced) -> std::cmp::Ordering {
    b.1.timestamp.cmp(&a.1.timestamp).then(b.0.cmp(&a.0))
}

#[async_trait]
impl PositionRepository for InMemoryPositionRepository {
    async fn append(&self, report: NewPositionReport) -> Result<PositionReport, RepositoryError> {
        let stored = PositionReport::from_new(report, ReportId::new(), Utc::now());

        let mut inner = self.inner.write();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner
            .by_vehicle
            .entry(stored.vehicle_id.clone())
            .or_default()
            .push((seq, stored.clone()));

        Ok(stored)
    }

    async fn latest(&self, vehicle_id: &VehicleId) -> Result<Option<PositionReport>, RepositoryError> {
        let inner = self.inner.read();
        Ok(inner
            .by_vehicle
            .get(vehicle_id)
            .and_then(|reports| reports.iter().min_by(|a, b| newest_first(a, b)))
            .map(|(_, report)| report.clone()))
    }

    async fn history(
        &self,
        vehicle_id: &VehicleId,
        limit: usize,
    ) -> Result<Vec<PositionReport>, RepositoryError> {
        let limit = clamp_history_limit(limit);
        let inner = self.inner.read();
        let Some(reports) = inner.by_vehicle.get(vehicle_id) else {
            return Ok(Vec::new());
        };

        let mut sorted: Vec<&Sequenced> = reports.iter().collect();
        sorted.sort_by(|a, b| newest_first(a, b));
        Ok(sorted
            .into_iter()
            .take(limit)
            .map(|(_, report)| report.clone())
            .collect())
    }
}
