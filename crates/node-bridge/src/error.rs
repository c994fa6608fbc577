//! Error types for the node bridge

use shared_types::{BlockId, OutputId, RpcCode, RpcStatus};
use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur while talking to the node
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A begin marker arrived while a batch was already open
    #[error("trying to begin a ledger update transaction with an already active transaction")]
    LedgerUpdateAlreadyInProgress,

    /// A record or end marker arrived without an open batch
    #[error("trying to process a ledger update operation without active transaction")]
    LedgerUpdateInvalidOperation,

    /// The end marker disagrees with the accumulated batch
    #[error("ledger update transaction ended before receiving all operations")]
    LedgerUpdateEndedAbruptly,

    /// A one-shot callback for the block is still pending
    #[error("callback for block ID is already registered: block {0}")]
    AlreadyRegistered(BlockId),

    /// Protocol parameters were encoded for another protocol version
    #[error("unsupported protocol version {got} vs {supported}")]
    UnsupportedProtocolVersion {
        /// Version announced by the node
        got: u8,
        /// Version this bridge understands
        supported: u8,
    },

    /// The identity proof of an output does not yield the claimed ID
    #[error("output ID mismatch. Expected {expected}, got {derived}")]
    OutputIdMismatch {
        /// ID claimed by the node
        expected: OutputId,
        /// ID derived from the proof
        derived: OutputId,
    },

    /// Payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Payload could not be encoded
    #[error("Encode error: {0}")]
    Encode(String),

    /// The node answered with an error status
    #[error(transparent)]
    Rpc(#[from] RpcStatus),

    /// An optional node capability is not exposed yet
    #[error("{0} is not available on the node")]
    NotAvailable(String),

    /// The governing context was cancelled
    #[error("operation was aborted")]
    OperationAborted,

    /// PoW requested without parents and without a way to fetch them
    #[error("no parents given")]
    ParentsNotGiven,

    /// Connected to a node of another network
    #[error("network name mismatch, networkName: \"{network_name}\", targetNetworkName: \"{target}\"")]
    NetworkNameMismatch {
        /// Network the node runs
        network_name: String,
        /// Network the bridge was configured for
        target: String,
    },

    /// Route bind address is not `host:port`
    #[error("invalid address {0}")]
    InvalidBindAddress(String),

    /// No node status has been received yet
    #[error("node status not available")]
    StatusUnavailable,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Whether the node reported the requested entity as unknown.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Rpc(status) if status.is_not_found())
    }

    /// Whether this error stems from cancellation rather than failure.
    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::OperationAborted => true,
            Self::Rpc(status) => status.is_cancelled(),
            _ => false,
        }
    }

    /// Whether the node and the bridge disagree on a stream's contract.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::LedgerUpdateAlreadyInProgress
                | Self::LedgerUpdateInvalidOperation
                | Self::LedgerUpdateEndedAbruptly
                | Self::AlreadyRegistered(_)
        )
    }

    /// Whether the condition is expected to clear up when retried.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::NotAvailable(_) | Self::StatusUnavailable => true,
            Self::Rpc(status) => matches!(
                status.code,
                RpcCode::Unavailable | RpcCode::DeadlineExceeded
            ),
            _ => false,
        }
    }
}
