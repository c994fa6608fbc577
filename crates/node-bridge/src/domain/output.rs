//! Output unwrapping with identity verification.

use super::entities::{Output, OutputMetadata, SpentMetadata};
use crate::error::{BridgeError, Result};
use crate::ports::LedgerCodec;
use shared_types::{CommitmentId, ProtocolParameters, RawOutput, RawSpent};

/// Decode `raw` and verify that its identity proof yields the ID the node
/// claims for it. The raw bytes must be exactly the encoding of the decoded
/// output, so `raw_output_data` is covered by the proof.
///
/// `spent` carries the spend details when the output was consumed.
pub fn unwrap_output(
    codec: &dyn LedgerCodec,
    api: &ProtocolParameters,
    raw: &RawOutput,
    spent: Option<&RawSpent>,
    latest_commitment_id: CommitmentId,
) -> Result<Output> {
    let output = codec.decode_output(&raw.output, api)?;
    if codec.encode_output(&output, api)? != raw.output {
        return Err(BridgeError::Decode(
            "output: bytes are not the canonical encoding".to_string(),
        ));
    }
    let output_id_proof = codec.decode_output_id_proof(&raw.output_id_proof, api)?;

    let derived = codec.derive_output_id(&output_id_proof, &output, api)?;
    if derived != raw.output_id {
        return Err(BridgeError::OutputIdMismatch {
            expected: raw.output_id,
            derived,
        });
    }

    let metadata = OutputMetadata {
        block_id: raw.block_id,
        slot_booked: raw.slot_booked,
        included_commitment_id: raw.commitment_id_included,
        spent: spent.map(|spent| SpentMetadata {
            transaction_id_spent: spent.transaction_id_spent,
            slot_spent: spent.slot_spent,
            commitment_id_spent: spent.commitment_id_spent,
        }),
        latest_commitment_id,
    };

    Ok(Output {
        output_id: raw.output_id,
        output,
        output_id_proof,
        metadata,
        raw_output_data: raw.output.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::codec::BincodeCodec;
    use crate::adapters::mock::raw_transaction_outputs;
    use shared_types::{BlockId, TransactionId};

    #[test]
    fn test_unwrap_verified_output() {
        let codec = BincodeCodec::new();
        let api = ProtocolParameters::default();
        let raws = raw_transaction_outputs(&codec, 8, &[100, 200], BlockId::new([3; 32], 8));

        let output = unwrap_output(&codec, &api, &raws[1], None, CommitmentId::new([9; 32], 7))
            .expect("valid output");

        assert_eq!(output.output_id, raws[1].output_id);
        assert_eq!(output.output.amount, 200);
        assert_eq!(output.metadata.latest_commitment_id.slot(), 7);
        assert_eq!(output.metadata.block_id, BlockId::new([3; 32], 8));
        assert!(!output.metadata.is_spent());
        assert_eq!(output.raw_output_data, raws[1].output);
    }

    #[test]
    fn test_claimed_id_mismatch_fails() {
        let codec = BincodeCodec::new();
        let api = ProtocolParameters::default();
        let mut raws = raw_transaction_outputs(&codec, 8, &[100, 200], BlockId::empty());
        let claimed = raws[1].output_id;
        raws[0].output_id = claimed;

        let err = unwrap_output(&codec, &api, &raws[0], None, CommitmentId::empty())
            .expect_err("mismatch");
        match err {
            BridgeError::OutputIdMismatch { expected, derived } => {
                assert_eq!(expected, claimed);
                assert_ne!(derived, claimed);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_tampered_body_fails() {
        let codec = BincodeCodec::new();
        let api = ProtocolParameters::default();
        let mut raws = raw_transaction_outputs(&codec, 2, &[5], BlockId::empty());
        raws[0].output = raws_with_amount(&codec, 6);

        let err = unwrap_output(&codec, &api, &raws[0], None, CommitmentId::empty())
            .expect_err("tampered");
        assert!(matches!(err, BridgeError::OutputIdMismatch { .. }));
    }

    #[test]
    fn test_extra_bytes_after_output_fail() {
        let codec = BincodeCodec::new();
        let api = ProtocolParameters::default();
        let mut raws = raw_transaction_outputs(&codec, 2, &[5], BlockId::empty());
        raws[0].output.extend_from_slice(b"GARBAGE");

        let err = unwrap_output(&codec, &api, &raws[0], None, CommitmentId::empty())
            .expect_err("trailing bytes");
        assert!(matches!(err, BridgeError::Decode(_)));
    }

    #[test]
    fn test_spent_metadata_attached() {
        let codec = BincodeCodec::new();
        let api = ProtocolParameters::default();
        let raws = raw_transaction_outputs(&codec, 2, &[5], BlockId::empty());
        let spent = RawSpent {
            output: raws[0].clone(),
            transaction_id_spent: TransactionId::new([4; 32], 6),
            slot_spent: 6,
            commitment_id_spent: None,
        };

        let output = unwrap_output(&codec, &api, &spent.output, Some(&spent), CommitmentId::empty())
            .expect("valid output");
        let spent_metadata = output.metadata.spent.expect("spent");
        assert_eq!(spent_metadata.slot_spent, 6);
        assert_eq!(spent_metadata.transaction_id_spent.slot(), 6);
    }

    fn raws_with_amount(codec: &BincodeCodec, amount: u64) -> Vec<u8> {
        let output = shared_types::TransactionOutput {
            amount,
            ..Default::default()
        };
        codec
            .encode_output(&output, &ProtocolParameters::default())
            .expect("encode")
    }
}
