// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod ingest;
pub mod notifier;
pub mod query;
pub mod repository_factory;
pub mod subscriber;

// Re-export services for convenience
pub use ingest::{IngestError, IngestOutcome, IngestPipeline};
pub use notifier::{AlertNotifier, NotifyOutcome};
pub use query::{GeofenceStatus, LastLocation, PositionQueryService, QueryError, StandardPositionQueryService};
pub use subscriber::IngestSubscriber;
