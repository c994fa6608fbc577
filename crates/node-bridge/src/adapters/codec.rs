//! Bincode Ledger Codec
//!
//! Implements `LedgerCodec` with bincode's fixed-int little-endian layout.
//! Struct fields are encoded in declaration order, so a `Block` encoding ends
//! with its eight nonce bytes. Decoding rejects trailing bytes.

use crate::error::{BridgeError, Result};
use crate::ports::LedgerCodec;
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{
    proof::sha256, Block, CommitmentId, OutputId, OutputIdProof, ProtocolParameters,
    SlotCommitment, TransactionOutput,
};

/// Bincode-backed ledger codec.
#[derive(Clone, Copy, Debug, Default)]
pub struct BincodeCodec;

impl BincodeCodec {
    /// Create a codec.
    pub fn new() -> Self {
        Self
    }

    /// Encode a protocol parameters blob.
    pub fn encode_protocol_parameters(&self, params: &ProtocolParameters) -> Result<Vec<u8>> {
        encode("protocol parameters", params)
    }

    /// Encode a slot commitment.
    pub fn encode_commitment(&self, commitment: &SlotCommitment) -> Result<Vec<u8>> {
        encode("commitment", commitment)
    }

    /// Encode an output identity proof.
    pub fn encode_output_id_proof(&self, proof: &OutputIdProof) -> Result<Vec<u8>> {
        encode("output ID proof", proof)
    }

    /// ID of a commitment: hash of its encoding, tagged with its slot.
    pub fn commitment_id(&self, commitment: &SlotCommitment) -> Result<CommitmentId> {
        let bytes = self.encode_commitment(commitment)?;
        Ok(CommitmentId::new(sha256(&bytes), commitment.slot))
    }
}

fn encode<T: Serialize>(kind: &str, value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| BridgeError::Encode(format!("{kind}: {e}")))
}

fn decode<T: DeserializeOwned>(kind: &str, data: &[u8]) -> Result<T> {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
        .deserialize(data)
        .map_err(|e| BridgeError::Decode(format!("{kind}: {e}")))
}

impl LedgerCodec for BincodeCodec {
    fn decode_protocol_parameters(&self, data: &[u8]) -> Result<ProtocolParameters> {
        decode("protocol parameters", data)
    }

    fn decode_commitment(&self, data: &[u8], api: &ProtocolParameters) -> Result<SlotCommitment> {
        let commitment: SlotCommitment = decode("commitment", data)?;
        if commitment.protocol_version != api.version {
            return Err(BridgeError::Decode(format!(
                "commitment: protocol version {} does not match {}",
                commitment.protocol_version, api.version
            )));
        }
        Ok(commitment)
    }

    fn decode_output(&self, data: &[u8], _api: &ProtocolParameters) -> Result<TransactionOutput> {
        decode("output", data)
    }

    fn encode_output(
        &self,
        output: &TransactionOutput,
        _api: &ProtocolParameters,
    ) -> Result<Vec<u8>> {
        encode("output", output)
    }

    fn decode_output_id_proof(
        &self,
        data: &[u8],
        _api: &ProtocolParameters,
    ) -> Result<OutputIdProof> {
        decode("output ID proof", data)
    }

    fn derive_output_id(
        &self,
        proof: &OutputIdProof,
        output: &TransactionOutput,
        api: &ProtocolParameters,
    ) -> Result<OutputId> {
        let bytes = self.encode_output(output, api)?;
        Ok(proof.output_id(&bytes))
    }

    fn encode_block(&self, block: &Block, _api: &ProtocolParameters) -> Result<Vec<u8>> {
        encode("block", block)
    }

    fn decode_block(&self, data: &[u8], _api: &ProtocolParameters) -> Result<Block> {
        decode("block", data)
    }
}
