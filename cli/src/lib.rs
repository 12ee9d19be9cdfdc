// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! AEGIS fleet CLI library - exposes testable components
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Server bootstrap, HTTP client and command handlers for `aegis-fleet`

pub mod commands;
pub mod daemon;
pub mod logging;
