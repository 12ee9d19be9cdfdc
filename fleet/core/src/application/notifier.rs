// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Alert Notifier Application Service
//!
//! Builds an [`Alert`] from a verdict transition and hands it to the
//! configured [`AlertPublisher`]. Delivery is best-effort: a failed or slow
//! publish is logged and counted, never propagated to the ingest path.

use chrono::{DateTime, Utc};
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::alert::{Alert, AlertPublisher, PublishError, VerdictTransition};
use crate::domain::geofence::Coordinates;
use crate::domain::position::VehicleId;

/// Result of one notification attempt. Informational only.
#[derive(Debug)]
pub enum NotifyOutcome {
    Published(Alert),
    Failed(PublishError),
    TimedOut(Duration),
}

impl NotifyOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, NotifyOutcome::Published(_))
    }
}

pub struct AlertNotifier {
    publisher: Arc<dyn AlertPublisher>,
    timeout: Duration,
}

impl AlertNotifier {
    pub fn new(publisher: Arc<dyn AlertPublisher>, timeout: Duration) -> Self {
        Self { publisher, timeout }
    }

    pub async fn notify(
        &self,
        vehicle_id: &VehicleId,
        transition: VerdictTransition,
        location: Coordinates,
        timestamp: DateTime<Utc>,
    ) -> NotifyOutcome {
        let alert = Alert::new(vehicle_id.clone(), transition, location, timestamp);

        // The publish future is dropped (cancelled) when the timeout elapses.
        match tokio::time::timeout(self.timeout, self.publisher.publish(&alert)).await {
            Ok(Ok(())) => {
                counter!("fleet_alerts_published_total", "kind" => alert.kind.as_str()).increment(1);
                info!(
                    vehicle_id = %vehicle_id,
                    kind = %alert.kind,
                    latitude = location.latitude,
                    longitude = location.longitude,
                    "Published geofence alert"
                );
                NotifyOutcome::Published(alert)
            }
            Ok(Err(e)) => {
                counter!("fleet_alert_failures_total").increment(1);
                warn!(vehicle_id = %vehicle_id, kind = %alert.kind, error = %e, "Failed to publish geofence alert");
                NotifyOutcome::Failed(e)
            }
            Err(_) => {
                counter!("fleet_alert_failures_total").increment(1);
                warn!(
                    vehicle_id = %vehicle_id,
                    kind = %alert.kind,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Timed out publishing geofence alert"
                );
                NotifyOutcome::TimedOut(self.timeout)
            }
        }
    }
}
