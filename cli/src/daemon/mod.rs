// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Server process and its HTTP client
//!
//! - `server` wires configuration, store, bus, pipeline and subscriber and
//!   serves the HTTP API until Ctrl+C/SIGTERM
//! - `client` is used by the query/publish commands against a running server

pub mod client;
pub mod server;

pub use client::DaemonClient;
pub use server::{build_services, start_server, FleetServices, ServerOverrides};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3001;

/// Base URL for `host:port`, accepting hosts given with or without a scheme.
pub fn base_url(host: &str, port: u16) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}:{}", host.trim_end_matches('/'), port)
    } else {
        format!("http://{}:{}", host, port)
    }
}
