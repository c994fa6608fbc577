//! # Ports
//!
//! Outbound ports: the node's RPC interface and the ledger codec.

pub mod outbound;

pub use outbound::{LedgerCodec, NodeClient, RpcResult, RpcStream};
