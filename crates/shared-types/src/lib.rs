//! # Shared Types Crate
//!
//! Ledger identifiers, value types and the raw messages exchanged with the
//! ledger node.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses the node boundary is
//!   defined here, so the bridge and its adapters agree on one shape.
//! - **Raw vs. Decoded**: `rpc` holds messages exactly as the node sends them
//!   (encoded payloads as bytes); `entities` holds decoded values.
//! - **Verifiable Identity**: output IDs are derived from an `OutputIdProof`,
//!   never trusted from the wire.

pub mod entities;
pub mod proof;
pub mod rpc;

pub use entities::*;
pub use proof::{OutputIdProof, Position, ProofNode};
pub use rpc::*;
