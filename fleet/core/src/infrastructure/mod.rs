// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod db;
pub mod message_bus;
pub mod repositories;

pub use message_bus::{BusMessage, MessageBus, MessageBusError, MessageReceiver};
