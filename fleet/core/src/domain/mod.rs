// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Layer
//!
//! Types and contracts. Only `fleet_config` touches the outside world: it
//! reads the configuration file and environment overrides at startup.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Geofence math, position reports, alerts, topics, persistence contracts

pub mod alert;
pub mod fleet_config;
pub mod geofence;
pub mod position;
pub mod repository;
pub mod topic;
