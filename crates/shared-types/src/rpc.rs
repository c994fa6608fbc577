//! # Node RPC Messages
//!
//! Messages exchanged with the ledger node, as they appear on the wire.
//! Encoded payloads (outputs, commitments, protocol parameters) stay as raw
//! bytes here; decoding them is the job of the bridge's codec.
//!
//! ## Streams
//!
//! | Stream | Item |
//! |--------|------|
//! | node status | `RawNodeStatus` |
//! | ledger updates | `LedgerUpdateRecord` |
//! | accepted transactions | `RawAcceptedTransaction` |
//! | accepted blocks | `BlockMetadata` |
//! | blocks | `RawBlockMessage` |
//! | commitment cone | `BlockMetadata` |

use crate::entities::{
    AccountId, BlockId, CommitmentId, EpochIndex, OutputId, SlotIndex, TransactionId,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// STATUS CODES
// =============================================================================

/// Status code attached to a failed RPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RpcCode {
    /// The call was cancelled by the caller.
    Cancelled,
    /// Unknown error.
    Unknown,
    /// The request was malformed.
    InvalidArgument,
    /// The deadline expired before completion.
    DeadlineExceeded,
    /// The requested entity does not exist.
    NotFound,
    /// The entity already exists.
    AlreadyExists,
    /// The node is temporarily unavailable.
    Unavailable,
    /// The node does not implement the call.
    Unimplemented,
    /// Internal node error.
    Internal,
}

/// Error status returned by the node for a unary call or a stream.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("rpc error: code = {code:?}, message = {message}")]
pub struct RpcStatus {
    /// Status code.
    pub code: RpcCode,
    /// Human readable detail.
    pub message: String,
}

impl RpcStatus {
    /// Create a status.
    pub fn new(code: RpcCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// `NotFound` status.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RpcCode::NotFound, message)
    }

    /// `Cancelled` status.
    pub fn cancelled() -> Self {
        Self::new(RpcCode::Cancelled, "context canceled")
    }

    /// `Unavailable` status.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Unavailable, message)
    }

    /// Whether the status reports a missing entity.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.code == RpcCode::NotFound
    }

    /// Whether the status reports cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.code == RpcCode::Cancelled
    }
}

// =============================================================================
// NODE STATUS
// =============================================================================

/// Protocol parameters blob tagged with its protocol version.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawProtocolParameters {
    /// Version the blob was encoded for.
    pub protocol_version: u8,
    /// Encoded parameters.
    pub params: Vec<u8>,
}

/// Commitment ID plus the encoded commitment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawCommitment {
    /// Identifier claimed by the node.
    pub commitment_id: CommitmentId,
    /// Encoded `SlotCommitment`.
    pub data: Vec<u8>,
}

/// Node status snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawNodeStatus {
    /// Whether the node considers itself healthy.
    pub is_healthy: bool,
    /// Latest commitment produced by the node.
    pub latest_commitment: Option<RawCommitment>,
    /// Latest finalized commitment.
    pub latest_finalized_commitment: Option<RawCommitment>,
    /// Oldest epoch the node still keeps.
    pub pruning_epoch: EpochIndex,
    /// Protocol parameters currently in effect.
    pub current_protocol_parameters: RawProtocolParameters,
}

// =============================================================================
// LEDGER
// =============================================================================

/// Inclusive slot range for ledger update streams. Zero means open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SlotRangeRequest {
    /// First slot to stream.
    pub start_slot: SlotIndex,
    /// Last slot to stream.
    pub end_slot: SlotIndex,
}

/// An output as stored in the node's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawOutput {
    /// Block that contained the creating transaction.
    pub block_id: BlockId,
    /// Output ID claimed by the node.
    pub output_id: OutputId,
    /// Slot the output was booked in.
    pub slot_booked: SlotIndex,
    /// Commitment that included the output, once committed.
    pub commitment_id_included: Option<CommitmentId>,
    /// Encoded `TransactionOutput`.
    pub output: Vec<u8>,
    /// Encoded `OutputIdProof`.
    pub output_id_proof: Vec<u8>,
}

/// A spent output together with the spend details.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawSpent {
    /// The spent output.
    pub output: RawOutput,
    /// Transaction that spent it.
    pub transaction_id_spent: TransactionId,
    /// Slot it was spent in.
    pub slot_spent: SlotIndex,
    /// Commitment that included the spend, once committed.
    pub commitment_id_spent: Option<CommitmentId>,
}

/// Kind of batch marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerType {
    /// Opens a batch.
    Begin,
    /// Closes a batch.
    End,
}

/// Delimits one atomic ledger mutation on the ledger update stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMarker {
    /// Begin or end.
    pub marker_type: MarkerType,
    /// Commitment the batch belongs to.
    pub commitment_id: CommitmentId,
    /// Number of consumed records in the batch.
    pub consumed_count: u32,
    /// Number of created records in the batch.
    pub created_count: u32,
}

/// One record of the ledger update stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerUpdateRecord {
    /// Batch delimiter.
    BatchMarker(BatchMarker),
    /// An output removed from the ledger.
    Consumed(RawSpent),
    /// An output added to the ledger.
    Created(RawOutput),
}

/// A transaction accepted by the node, pre-batched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawAcceptedTransaction {
    /// Transaction ID.
    pub transaction_id: TransactionId,
    /// Slot the transaction was accepted in.
    pub slot: SlotIndex,
    /// Outputs spent by the transaction.
    pub consumed: Vec<RawSpent>,
    /// Outputs created by the transaction.
    pub created: Vec<RawOutput>,
}

/// Current state of an output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputState {
    /// The output is unspent.
    Unspent(RawOutput),
    /// The output was spent.
    Spent(RawSpent),
}

/// Response to an output lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOutputResponse {
    /// Latest commitment at the time of the lookup.
    pub latest_commitment_id: CommitmentId,
    /// The output and, if spent, its spend details.
    pub state: OutputState,
}

// =============================================================================
// CHAIN
// =============================================================================

/// Selects a commitment by slot or by identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitmentRequest {
    /// Commitment of a slot.
    BySlot(SlotIndex),
    /// Commitment with a given ID.
    ById(CommitmentId),
}

/// An encoded block submitted to the node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawBlock {
    /// Encoded `Block`.
    pub data: Vec<u8>,
}

/// A block as seen on the blocks stream.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawBlockMessage {
    /// Identifier the node assigned to the block.
    pub block_id: BlockId,
    /// The encoded block.
    pub block: RawBlock,
}

// =============================================================================
// ACCOUNTS
// =============================================================================

/// Selects an account as of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AccountInfoRequest {
    /// Account to look up.
    pub account_id: AccountId,
    /// Slot the answer refers to.
    pub slot: SlotIndex,
}

// =============================================================================
// API ROUTES
// =============================================================================

/// Request to expose a plugin route through the node's API.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApiRouteRequest {
    /// Logical route name, e.g. `indexer/v2`.
    pub route: String,
    /// Host the plugin listens on.
    pub host: String,
    /// Port the plugin listens on.
    pub port: u32,
    /// Path prefix on the plugin's server.
    pub path: String,
}
