// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # AEGIS Fleet Core
//!
//! Continuous ingest → evaluate → persist → notify pipeline for vehicle
//! position reports, plus the read-only query surface over stored reports.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Geofence evaluation, position persistence and transition alerting
//!
//! | Layer | Contents |
//! |-------|----------|
//! | [`domain`] | Value objects, geofence math, repository and publisher contracts, configuration |
//! | [`application`] | Ingest pipeline, alert notifier, query service, subscriber loop |
//! | [`infrastructure`] | Message bus, in-memory and PostgreSQL position stores |
//! | [`presentation`] | HTTP API (Axum) |

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
