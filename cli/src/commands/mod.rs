// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the fleet CLI

pub mod config;
pub mod location;
pub mod publish;

pub use self::config::ConfigCommand;
pub use self::location::LocationCommand;
pub use self::publish::PublishArgs;
