//! # Output Identity Proof
//!
//! Binds the encoded bytes of an output to the output ID the node claims for
//! it. The output is hashed into a leaf, the leaf is folded along a Merkle
//! audit path into the transaction's outputs root, and the transaction ID is
//! the hash of the transaction commitment and that root.
//!
//! ```text
//! leaf      = SHA256(output_bytes)
//! root      = fold(leaf, output_commitment_proof)
//! tx_hash   = SHA256(transaction_commitment || root)
//! output_id = (tx_hash, slot, output_index)
//! ```

use crate::entities::{Hash, OutputId, SlotIndex, TransactionId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Side of the sibling hash in a Merkle audit path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    /// Sibling is the left operand.
    Left,
    /// Sibling is the right operand.
    Right,
}

/// One step of a Merkle audit path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofNode {
    /// Sibling hash.
    pub hash: Hash,
    /// Where the sibling sits.
    pub position: Position,
}

/// Proof that an output belongs to a transaction at a given index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputIdProof {
    /// Slot of the creating transaction.
    pub slot: SlotIndex,
    /// Commitment over the transaction essence, excluding outputs.
    pub transaction_commitment: Hash,
    /// Index of the output within the transaction.
    pub output_index: u16,
    /// Audit path from the output leaf to the outputs root.
    pub output_commitment_proof: Vec<ProofNode>,
}

impl OutputIdProof {
    /// Build the proof for `outputs[index]` of a transaction.
    ///
    /// Returns `None` if `index` is out of range or does not fit an output index.
    pub fn build(
        slot: SlotIndex,
        transaction_commitment: Hash,
        outputs: &[Vec<u8>],
        index: usize,
    ) -> Option<Self> {
        let output_index = u16::try_from(index).ok()?;
        let leaves: Vec<Hash> = outputs.iter().map(|output| sha256(output)).collect();
        let output_commitment_proof = build_merkle_proof(&leaves, index)?;

        Some(Self {
            slot,
            transaction_commitment,
            output_index,
            output_commitment_proof,
        })
    }

    /// Derive the output ID the proof binds `output_bytes` to.
    #[must_use]
    pub fn output_id(&self, output_bytes: &[u8]) -> OutputId {
        let mut current = sha256(output_bytes);
        for node in &self.output_commitment_proof {
            current = match node.position {
                Position::Left => hash_concat(&node.hash, &current),
                Position::Right => hash_concat(&current, &node.hash),
            };
        }

        let transaction_hash = hash_concat(&self.transaction_commitment, &current);
        OutputId::new(
            TransactionId::new(transaction_hash, self.slot),
            self.output_index,
        )
    }
}

/// SHA-256 of `data`.
#[must_use]
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// Hash two nodes together.
fn hash_concat(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// Merkle root over `leaves`, duplicating the last node of odd levels.
#[must_use]
pub fn compute_merkle_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return [0u8; 32];
    }

    let mut level: Vec<Hash> = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| hash_concat(&pair[0], pair.get(1).unwrap_or(&pair[0])))
            .collect();
    }

    level[0]
}

/// Audit path for `leaves[index]`.
fn build_merkle_proof(leaves: &[Hash], index: usize) -> Option<Vec<ProofNode>> {
    if index >= leaves.len() {
        return None;
    }

    let mut proof = Vec::new();
    let mut level: Vec<Hash> = leaves.to_vec();
    let mut index = index;

    while level.len() > 1 {
        let (sibling, position) = if index % 2 == 0 {
            (level.get(index + 1).unwrap_or(&level[index]), Position::Right)
        } else {
            (&level[index - 1], Position::Left)
        };
        proof.push(ProofNode {
            hash: *sibling,
            position,
        });

        level = level
            .chunks(2)
            .map(|pair| hash_concat(&pair[0], pair.get(1).unwrap_or(&pair[0])))
            .collect();
        index /= 2;
    }

    Some(proof)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outputs(count: u8) -> Vec<Vec<u8>> {
        (0..count).map(|i| vec![i; 16]).collect()
    }

    #[test]
    fn test_single_output_proof_is_empty() {
        let proof = OutputIdProof::build(3, [9; 32], &outputs(1), 0).expect("proof");
        assert!(proof.output_commitment_proof.is_empty());

        let id = proof.output_id(&outputs(1)[0]);
        assert_eq!(id.index, 0);
        assert_eq!(id.slot(), 3);
    }

    #[test]
    fn test_all_outputs_share_transaction_id() {
        let outs = outputs(5);
        let ids: Vec<OutputId> = (0..outs.len())
            .map(|i| {
                OutputIdProof::build(10, [1; 32], &outs, i)
                    .expect("proof")
                    .output_id(&outs[i])
            })
            .collect();

        for (i, id) in ids.iter().enumerate() {
            assert_eq!(id.transaction_id, ids[0].transaction_id);
            assert_eq!(usize::from(id.index), i);
        }

        let root = compute_merkle_root(&outs.iter().map(|o| sha256(o)).collect::<Vec<_>>());
        assert_eq!(ids[0].transaction_id.hash, hash_concat(&[1; 32], &root));
    }

    #[test]
    fn test_tampered_output_changes_id() {
        let outs = outputs(4);
        let proof = OutputIdProof::build(1, [2; 32], &outs, 2).expect("proof");
        let honest = proof.output_id(&outs[2]);
        let tampered = proof.output_id(b"not the output");
        assert_ne!(honest, tampered);
    }

    #[test]
    fn test_out_of_range_index() {
        assert!(OutputIdProof::build(1, [0; 32], &outputs(2), 2).is_none());
    }
}
