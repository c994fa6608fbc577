//! # Node Bridge
//!
//! Long-lived client that keeps one streaming connection to a ledger node,
//! mirrors a slice of its state and reassembles its server-push streams into
//! domain events for sidecar plugins.
//!
//! **Architecture:** Hexagonal (domain / ports / adapters / application)
//!
//! ## Subsystems
//!
//! | Subsystem | Type |
//! |-----------|------|
//! | Stream pump | `listen_to_stream` |
//! | Synchronized status cache | `StatusCache` |
//! | Ledger update reassembler | `LedgerUpdateAssembler` |
//! | Acceptance notification registry | `TangleListener` |
//! | Proof-of-work miner | `do_pow` / `PowMiner` |
//!
//! ## Module Structure
//!
//! ```text
//! node-bridge/
//! ├── domain/          # Entities, status cache, reassembler, output unwrap, PoW
//! ├── ports/           # NodeClient + LedgerCodec (outbound)
//! ├── adapters/        # Bincode codec, in-memory mock node
//! ├── application/     # Stream pump, NodeBridge facade, TangleListener
//! ├── config.rs        # BridgeConfig
//! └── error.rs         # BridgeError
//! ```
//!
//! ## Lifetime
//!
//! Every long-running operation takes a `CancellationToken`. Cancelling it
//! stops all stream listeners at their next receive; stream listeners report
//! this as success, while PoW and capability waits report
//! `BridgeError::OperationAborted`.

#![warn(missing_docs)]
#![warn(clippy::all)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;

// Re-exports
pub use adapters::{BincodeCodec, MockNodeClient, MockStream};
pub use application::{
    listen_to_stream, ListenerQueryError, NodeBridge, TangleEvents, TangleListener,
};
pub use config::{BridgeConfig, PowConfig};
pub use domain::{
    do_pow, work_score, AcceptedTransaction, BatchContext, BridgeEvents, Commitment,
    LedgerUpdate, LedgerUpdateAssembler, NodeStatus, Output, OutputMetadata, PowMiner,
    SpentMetadata, StatusCache, StatusUpdate, TipRefresher, SUPPORTED_PROTOCOL_VERSION,
};
pub use error::{BridgeError, Result};
pub use ports::{LedgerCodec, NodeClient, RpcResult, RpcStream};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
