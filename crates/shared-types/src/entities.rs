//! # Ledger Entities
//!
//! Decoded ledger values mirrored from the node.
//!
//! ## Clusters
//!
//! - **Identifiers**: `CommitmentId`, `BlockId`, `TransactionId`, `OutputId`,
//!   `AccountId`
//! - **Chain**: `SlotCommitment`, `Block`, `BlockMetadata`, `Tips`
//! - **Ledger**: `TransactionOutput`, `TransactionMetadata`
//! - **Protocol**: `ProtocolParameters`

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte SHA-256 digest.
pub type Hash = [u8; 32];

/// Sequence position of a commitment, block or transaction.
pub type SlotIndex = u32;

/// Group of consecutive slots.
pub type EpochIndex = u32;

/// Length in bytes of an encoded slot identifier (hash + little-endian slot).
pub const SLOT_IDENTIFIER_LENGTH: usize = 36;

/// Length in bytes of an encoded output ID (transaction ID + index).
pub const OUTPUT_ID_LENGTH: usize = SLOT_IDENTIFIER_LENGTH + 2;

// =============================================================================
// CLUSTER A: IDENTIFIERS
// =============================================================================

/// Declares an identifier made of a content hash and the slot it belongs to.
macro_rules! slot_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        pub struct $name {
            /// Content hash.
            pub hash: Hash,
            /// Slot the identified object belongs to.
            pub slot: SlotIndex,
        }

        impl $name {
            /// Create an identifier from its parts.
            #[must_use]
            pub const fn new(hash: Hash, slot: SlotIndex) -> Self {
                Self { hash, slot }
            }

            /// The all-zero identifier.
            #[must_use]
            pub const fn empty() -> Self {
                Self { hash: [0u8; 32], slot: 0 }
            }

            /// Slot encoded in this identifier.
            #[must_use]
            pub const fn slot(&self) -> SlotIndex {
                self.slot
            }

            /// Whether this is the all-zero identifier.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                *self == Self::empty()
            }

            /// Canonical byte form: hash followed by the little-endian slot.
            #[must_use]
            pub fn to_bytes(&self) -> [u8; SLOT_IDENTIFIER_LENGTH] {
                let mut bytes = [0u8; SLOT_IDENTIFIER_LENGTH];
                bytes[..32].copy_from_slice(&self.hash);
                bytes[32..].copy_from_slice(&self.slot.to_le_bytes());
                bytes
            }

            /// `0x`-prefixed hex of the canonical byte form.
            #[must_use]
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.to_bytes()))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }
    };
}

slot_identifier!(
    /// Identifier of a slot commitment. The slot is its sequence position.
    CommitmentId
);

slot_identifier!(
    /// Identifier of a block.
    BlockId
);

slot_identifier!(
    /// Identifier of a transaction.
    TransactionId
);

/// Identifier of a transaction output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct OutputId {
    /// Transaction that created the output.
    pub transaction_id: TransactionId,
    /// Position of the output within the transaction.
    pub index: u16,
}

impl OutputId {
    /// Create an output ID.
    #[must_use]
    pub const fn new(transaction_id: TransactionId, index: u16) -> Self {
        Self {
            transaction_id,
            index,
        }
    }

    /// Slot of the creating transaction.
    #[must_use]
    pub const fn slot(&self) -> SlotIndex {
        self.transaction_id.slot
    }

    /// Canonical byte form: transaction ID followed by the little-endian index.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; OUTPUT_ID_LENGTH] {
        let mut bytes = [0u8; OUTPUT_ID_LENGTH];
        bytes[..SLOT_IDENTIFIER_LENGTH].copy_from_slice(&self.transaction_id.to_bytes());
        bytes[SLOT_IDENTIFIER_LENGTH..].copy_from_slice(&self.index.to_le_bytes());
        bytes
    }

    /// `0x`-prefixed hex of the canonical byte form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }
}

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Identifier of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AccountId(pub Hash);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

// =============================================================================
// CLUSTER B: PROTOCOL
// =============================================================================

/// Protocol parameters the node operates with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParameters {
    /// Protocol version these parameters belong to.
    pub version: u8,
    /// Human readable network name.
    pub network_name: String,
    /// Bech32 human readable part of addresses.
    pub bech32_hrp: String,
    /// `log2` of the number of slots per epoch.
    pub slots_per_epoch_exponent: u8,
    /// Minimum proof-of-work score a block must reach. Zero disables PoW.
    pub min_pow_score: u32,
    /// Total token supply.
    pub token_supply: u64,
}

impl ProtocolParameters {
    /// Epoch a slot belongs to.
    #[must_use]
    pub fn epoch(&self, slot: SlotIndex) -> EpochIndex {
        slot >> self.slots_per_epoch_exponent
    }
}

impl Default for ProtocolParameters {
    fn default() -> Self {
        Self {
            version: 3,
            network_name: "testnet".to_string(),
            bech32_hrp: "rms".to_string(),
            slots_per_epoch_exponent: 13,
            min_pow_score: 0,
            token_supply: 1_813_620_509_061_365,
        }
    }
}

// =============================================================================
// CLUSTER C: CHAIN
// =============================================================================

/// Decoded content of a slot commitment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SlotCommitment {
    /// Protocol version the commitment was produced under.
    pub protocol_version: u8,
    /// Committed slot.
    pub slot: SlotIndex,
    /// Commitment of the previous slot.
    pub previous_commitment_id: CommitmentId,
    /// Root over all state trees of the slot.
    pub roots_id: Hash,
    /// Accumulated weight of the chain up to this commitment.
    pub cumulative_weight: u64,
    /// Reference mana cost for the slot.
    pub reference_mana_cost: u64,
}

/// A block as issued to the node.
///
/// `nonce` is deliberately the last field: the canonical encoding ends with
/// its eight little-endian bytes, which the PoW search relies on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Block {
    /// Protocol version.
    pub protocol_version: u8,
    /// Network identifier derived from the network name.
    pub network_id: u64,
    /// Issuing time in nanoseconds since the Unix epoch.
    pub issuing_time: u64,
    /// Commitment the block commits to.
    pub slot_commitment_id: CommitmentId,
    /// Latest finalized slot known to the issuer.
    pub latest_finalized_slot: SlotIndex,
    /// Strong parent references.
    pub strong_parents: Vec<BlockId>,
    /// Weak parent references.
    pub weak_parents: Vec<BlockId>,
    /// Shallow-like parent references.
    pub shallow_like_parents: Vec<BlockId>,
    /// Opaque payload.
    pub payload: Vec<u8>,
    /// Proof-of-work nonce.
    pub nonce: u64,
}

/// Node-side lifecycle state of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlockState {
    /// The node has not seen the block.
    #[default]
    Unknown,
    /// Booked but not yet accepted.
    Pending,
    /// Accepted into the causal history.
    Accepted,
    /// Confirmed by the committee.
    Confirmed,
    /// Finalized.
    Finalized,
    /// Rejected by the node.
    Rejected,
    /// Failed.
    Failed,
}

impl BlockState {
    /// Whether the block reached acceptance (or anything stronger).
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted | Self::Confirmed | Self::Finalized)
    }
}

/// Metadata the node keeps about a block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockMetadata {
    /// Block this metadata belongs to.
    pub block_id: BlockId,
    /// Current lifecycle state.
    pub block_state: BlockState,
    /// Reason the block failed, if it did.
    pub block_failure_reason: Option<String>,
}

/// Tips selected by the node for a new block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tips {
    /// Strong parent candidates.
    pub strong: Vec<BlockId>,
    /// Weak parent candidates.
    pub weak: Vec<BlockId>,
    /// Shallow-like parent candidates.
    pub shallow_like: Vec<BlockId>,
}

// =============================================================================
// CLUSTER D: LEDGER
// =============================================================================

/// Decoded body of a transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionOutput {
    /// Base token amount held by the output.
    pub amount: u64,
    /// Stored mana.
    pub mana: u64,
    /// Owner address (Ed25519 address hash).
    pub owner: Hash,
    /// Encoded feature blocks.
    pub features: Vec<u8>,
}

/// Node-side lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransactionState {
    /// Not known to the node.
    #[default]
    NoTransaction,
    /// Booked but not yet accepted.
    Pending,
    /// Accepted.
    Accepted,
    /// Included in a commitment.
    Committed,
    /// Finalized.
    Finalized,
    /// Failed.
    Failed,
}

/// Metadata the node keeps about a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionMetadata {
    /// Transaction this metadata belongs to.
    pub transaction_id: TransactionId,
    /// Current lifecycle state.
    pub transaction_state: TransactionState,
    /// Slot of the earliest block carrying the transaction.
    pub earliest_attachment_slot: SlotIndex,
    /// Reason the transaction failed, if it did.
    pub transaction_failure_reason: Option<String>,
}
