//! # Bridge Telemetry
//!
//! Structured logging for the node bridge and the plugins embedding it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bridge_telemetry::{init_tracing, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     init_tracing(&config).expect("Failed to init telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `node-bridge` | Service name attached to logs |
//! | `NODE_BRIDGE_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `NODE_BRIDGE_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `NODE_BRIDGE_JSON_LOGS` | `false` (`true` in containers) | JSON formatted logs |

mod config;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use tracing_setup::init_tracing;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The log filter directive could not be parsed.
    #[error("Invalid log filter: {0}")]
    Filter(String),

    /// A global subscriber is already installed.
    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInit(String),
}
