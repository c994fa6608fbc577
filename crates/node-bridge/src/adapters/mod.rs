//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implementations of the outbound ports: a bincode `LedgerCodec` and an
//! in-memory `NodeClient` for tests and local development.

pub mod codec;
pub mod mock;

pub use codec::BincodeCodec;
pub use mock::{MockNodeClient, MockStream};
