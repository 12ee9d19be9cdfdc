// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Ingest Pipeline Application Service
//!
//! Turns one inbound position message into a stored [`PositionReport`] and,
//! when the vehicle's geofence verdict changes, an alert:
//!
//! 1. parse the payload (malformed input is dropped here and never stored)
//! 2. evaluate the point against the vehicle's boundary (absent → inside)
//! 3. under the vehicle's lock: read `latest`, append, compare
//! 4. on a transition, notify while still holding the lock
//!
//! Work for one vehicle is serialized through a per-vehicle `tokio::sync::Mutex`
//! slot; different vehicles proceed in parallel. The previous verdict is the
//! one on the record `PositionRepository::latest` returns just before the
//! append, so a late report with an old timestamp never becomes the baseline
//! for the reports after it. A slot lives only while some message for its
//! vehicle is in flight.

use dashmap::DashMap;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::application::notifier::AlertNotifier;
use crate::domain::alert::VerdictTransition;
use crate::domain::geofence::GeofenceRegistry;
use crate::domain::position::{MalformedPosition, NewPositionReport, PositionPayload, PositionReport, VehicleId};
use crate::domain::repository::{PositionRepository, RepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Persistence failed: {0}")]
    Persistence(#[from] RepositoryError),

    #[error("Persistence timed out after {0:?}")]
    Timeout(Duration),
}

/// What happened to one inbound message.
#[derive(Debug)]
pub enum IngestOutcome {
    /// Persisted. `transition` is set when the verdict flipped and an alert was attempted.
    Stored {
        report: PositionReport,
        transition: Option<VerdictTransition>,
    },
    /// Dropped before reaching the store.
    Rejected(MalformedPosition),
    /// The store call failed; nothing was persisted and no alert was sent.
    Failed(IngestError),
}

impl IngestOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, IngestOutcome::Stored { .. })
    }

    pub fn transition(&self) -> Option<VerdictTransition> {
        match self {
            IngestOutcome::Stored { transition, .. } => *transition,
            _ => None,
        }
    }
}

type VehicleSlot = Arc<Mutex<()>>;

pub struct IngestPipeline {
    registry: Arc<GeofenceRegistry>,
    repository: Arc<dyn PositionRepository>,
    notifier: Arc<AlertNotifier>,
    persist_timeout: Duration,
    slots: DashMap<VehicleId, VehicleSlot>,
}

impl IngestPipeline {
    pub fn new(
        registry: Arc<GeofenceRegistry>,
        repository: Arc<dyn PositionRepository>,
        notifier: Arc<AlertNotifier>,
        persist_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            repository,
            notifier,
            persist_timeout,
            slots: DashMap::new(),
        }
    }

    fn slot(&self, vehicle_id: &VehicleId) -> VehicleSlot {
        self.slots.entry(vehicle_id.clone()).or_default().clone()
    }

    /// Drops the vehicle's slot once no other message holds a handle to it.
    /// Handles are only cloned under the map's shard lock, so a count of one
    /// means nobody is waiting on it.
    fn release(&self, vehicle_id: &VehicleId) {
        self.slots.remove_if(vehicle_id, |_, slot| Arc::strong_count(slot) == 1);
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, IngestError>
    where
        F: std::future::Future<Output = Result<T, RepositoryError>>,
    {
        match tokio::time::timeout(self.persist_timeout, call).await {
            Ok(result) => result.map_err(IngestError::from),
            Err(_) => Err(IngestError::Timeout(self.persist_timeout)),
        }
    }

    /// Process one raw message published by `vehicle_id`. Never panics and
    /// never returns an error: failures are isolated to this message.
    pub async fn on_message(&self, raw: &[u8], vehicle_id: &VehicleId) -> IngestOutcome {
        counter!("fleet_positions_received_total").increment(1);

        let payload = match PositionPayload::parse(raw) {
            Ok(payload) => payload,
            Err(e) => {
                counter!("fleet_positions_rejected_total", "reason" => e.reason()).increment(1);
                warn!(vehicle_id = %vehicle_id, error = %e, "Dropping malformed position message");
                return IngestOutcome::Rejected(e);
            }
        };

        let inside_geofence = self.registry.evaluate(vehicle_id, payload.location);
        let report = NewPositionReport {
            vehicle_id: vehicle_id.clone(),
            location: payload.location,
            timestamp: payload.timestamp,
            inside_geofence,
        };

        let outcome = self.record(report).await;
        self.release(vehicle_id);
        outcome
    }

    async fn record(&self, report: NewPositionReport) -> IngestOutcome {
        let vehicle_id = report.vehicle_id.clone();
        let inside_geofence = report.inside_geofence;

        let slot = self.slot(&vehicle_id);
        let _guard = slot.lock().await;

        let previous_inside = match self.bounded(self.repository.latest(&vehicle_id)).await {
            Ok(latest) => latest.map(|r| r.inside_geofence),
            Err(e) => return self.persistence_failed(&vehicle_id, e),
        };

        let stored = match self.bounded(self.repository.append(report)).await {
            Ok(stored) => stored,
            Err(e) => return self.persistence_failed(&vehicle_id, e),
        };

        counter!("fleet_positions_stored_total").increment(1);
        debug!(
            vehicle_id = %vehicle_id,
            report_id = %stored.id,
            inside_geofence,
            "Stored position report"
        );

        let transition =
            previous_inside.and_then(|previous| VerdictTransition::between(previous, inside_geofence));

        if let Some(transition) = transition {
            info!(vehicle_id = %vehicle_id, ?transition, "Geofence verdict changed");
            self.notifier
                .notify(&vehicle_id, transition, stored.location(), stored.timestamp)
                .await;
        }

        IngestOutcome::Stored {
            report: stored,
            transition,
        }
    }

    fn persistence_failed(&self, vehicle_id: &VehicleId, e: IngestError) -> IngestOutcome {
        counter!("fleet_persist_failures_total").increment(1);
        error!(vehicle_id = %vehicle_id, error = %e, "Failed to persist position report");
        IngestOutcome::Failed(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alert::{Alert, AlertPublisher, PublishError};
    use crate::domain::geofence::{Coordinates, GeofenceBoundary};
    use crate::infrastructure::repositories::InMemoryPositionRepository;
    use async_trait::async_trait;
    use chrono::Utc;

    #[derive(Default)]
    struct RecordingPublisher {
        alerts: parking_lot::Mutex<Vec<Alert>>,
    }

    #[async_trait]
    impl AlertPublisher for RecordingPublisher {
        async fn publish(&self, alert: &Alert) -> Result<(), PublishError> {
            self.alerts.lock().push(alert.clone());
            Ok(())
        }
    }

    fn vehicle(id: &str) -> VehicleId {
        VehicleId::parse(id).unwrap()
    }

    fn pipeline() -> (IngestPipeline, Arc<InMemoryPositionRepository>, Arc<RecordingPublisher>) {
        let boundary =
            GeofenceBoundary::new(Coordinates::new(12.9716, 77.5946).unwrap(), 5000.0).unwrap();
        let registry: GeofenceRegistry = [(vehicle("vehicle-1"), boundary)].into_iter().collect();
        let repository = Arc::new(InMemoryPositionRepository::new());
        let publisher = Arc::new(RecordingPublisher::default());
        let notifier = Arc::new(AlertNotifier::new(publisher.clone(), Duration::from_secs(1)));
        let pipeline = IngestPipeline::new(
            Arc::new(registry),
            repository.clone(),
            notifier,
            Duration::from_secs(1),
        );
        (pipeline, repository, publisher)
    }

    #[tokio::test]
    async fn test_first_report_never_alerts() {
        let (pipeline, _, publisher) = pipeline();
        let outcome = pipeline
            .on_message(br#"{"latitude": 13.2, "longitude": 77.8}"#, &vehicle("vehicle-1"))
            .await;
        match outcome {
            IngestOutcome::Stored { report, transition } => {
                assert!(!report.inside_geofence);
                assert!(transition.is_none());
            }
            other => panic!("expected stored, got {:?}", other),
        }
        assert!(publisher.alerts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_message_is_not_stored() {
        let (pipeline, repository, publisher) = pipeline();
        let outcome = pipeline
            .on_message(br#"{"latitude": "bad", "longitude": 77.5}"#, &vehicle("vehicle-1"))
            .await;
        assert!(matches!(outcome, IngestOutcome::Rejected(MalformedPosition::NotNumeric("latitude"))));
        assert!(repository.is_empty());
        assert!(publisher.alerts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_previous_verdict_read_from_store() {
        let (pipeline, repository, publisher) = pipeline();
        repository
            .append(NewPositionReport {
                vehicle_id: vehicle("vehicle-1"),
                location: Coordinates::new(12.9716, 77.5946).unwrap(),
                timestamp: Some(Utc::now()),
                inside_geofence: true,
            })
            .await
            .unwrap();

        let outcome = pipeline
            .on_message(br#"{"latitude": 13.2, "longitude": 77.8}"#, &vehicle("vehicle-1"))
            .await;
        assert_eq!(outcome.transition(), Some(VerdictTransition::Exited));
        assert_eq!(publisher.alerts.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_slots_are_released_after_each_message() {
        let (pipeline, _, _) = pipeline();
        for id in ["vehicle-1", "truck-7", "van-3"] {
            pipeline
                .on_message(br#"{"latitude": 12.9716, "longitude": 77.5946}"#, &vehicle(id))
                .await;
            pipeline.on_message(b"not json", &vehicle(id)).await;
        }
        assert!(pipeline.slots.is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_vehicle_is_inside() {
        let (pipeline, _, publisher) = pipeline();
        let payloads: [&[u8]; 2] = [
            br#"{"latitude": -45.0, "longitude": 170.0}"#,
            br#"{"latitude": 45.0, "longitude": -10.0}"#,
        ];
        for payload in payloads {
            match pipeline.on_message(payload, &vehicle("vehicle-9")).await {
                IngestOutcome::Stored { report, transition } => {
                    assert!(report.inside_geofence);
                    assert!(transition.is_none());
                }
                other => panic!("expected stored, got {:?}", other),
            }
        }
        assert!(publisher.alerts.lock().is_empty());
    }
}
