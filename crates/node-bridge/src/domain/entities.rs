//! # Domain Entities
//!
//! Decoded, verified views of what the node streams to the bridge.

use serde::{Deserialize, Serialize};
use shared_types::{
    BlockId, CommitmentId, EpochIndex, OutputId, OutputIdProof, ProtocolParameters,
    SlotCommitment, SlotIndex, TransactionId, TransactionOutput,
};
use std::sync::Arc;

/// Protocol version the bridge decodes.
pub const SUPPORTED_PROTOCOL_VERSION: u8 = 3;

/// A commitment ID together with its decoded content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    /// Identifier; its slot is the commitment's sequence position.
    pub commitment_id: CommitmentId,
    /// Decoded commitment.
    pub commitment: SlotCommitment,
}

impl Commitment {
    /// Sequence position of the commitment.
    pub fn slot(&self) -> SlotIndex {
        self.commitment_id.slot()
    }
}

/// Snapshot of the node's status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeStatus {
    /// Whether the node reports itself healthy.
    pub is_healthy: bool,
    /// Latest commitment the node announced.
    pub latest_commitment_id: Option<CommitmentId>,
    /// Latest finalized commitment the node announced.
    pub latest_finalized_commitment_id: Option<CommitmentId>,
    /// Oldest epoch the node still keeps.
    pub pruning_epoch: EpochIndex,
    /// Protocol parameters in effect.
    pub protocol_parameters: Arc<ProtocolParameters>,
}

/// Spend details of a consumed output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpentMetadata {
    /// Transaction that spent the output.
    pub transaction_id_spent: TransactionId,
    /// Slot the spend happened in.
    pub slot_spent: SlotIndex,
    /// Commitment that included the spend, once committed.
    pub commitment_id_spent: Option<CommitmentId>,
}

/// Metadata the node attaches to an output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputMetadata {
    /// Block that carried the creating transaction.
    pub block_id: BlockId,
    /// Slot the output was booked in.
    pub slot_booked: SlotIndex,
    /// Commitment that included the output, once committed.
    pub included_commitment_id: Option<CommitmentId>,
    /// Spend details if the output is spent.
    pub spent: Option<SpentMetadata>,
    /// Latest commitment known when the output was read.
    pub latest_commitment_id: CommitmentId,
}

impl OutputMetadata {
    /// Whether the output is spent.
    pub fn is_spent(&self) -> bool {
        self.spent.is_some()
    }
}

/// An output whose identity proof has been verified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Output {
    /// Verified output ID.
    pub output_id: OutputId,
    /// Decoded output.
    pub output: TransactionOutput,
    /// Proof binding `output` to `output_id`.
    pub output_id_proof: OutputIdProof,
    /// Node metadata.
    pub metadata: OutputMetadata,
    /// Encoded output as received.
    pub raw_output_data: Vec<u8>,
}

/// One atomic ledger mutation delimited by batch markers.
#[derive(Clone, Debug)]
pub struct LedgerUpdate {
    /// Parameters the batch was decoded with.
    pub api: Arc<ProtocolParameters>,
    /// Commitment the batch belongs to.
    pub commitment_id: CommitmentId,
    /// Latest commitment known to the bridge when the batch began. Output
    /// metadata carries this value; it may trail `commitment_id`.
    pub latest_commitment_id: CommitmentId,
    /// Outputs removed from the ledger.
    pub consumed: Vec<Output>,
    /// Outputs added to the ledger.
    pub created: Vec<Output>,
}

/// A transaction accepted by the node with its verified inputs and outputs.
#[derive(Clone, Debug)]
pub struct AcceptedTransaction {
    /// Parameters the transaction was decoded with.
    pub api: Arc<ProtocolParameters>,
    /// Slot the transaction was accepted in.
    pub slot: SlotIndex,
    /// Transaction ID.
    pub transaction_id: TransactionId,
    /// Outputs spent by the transaction.
    pub consumed: Vec<Output>,
    /// Outputs created by the transaction.
    pub created: Vec<Output>,
}
