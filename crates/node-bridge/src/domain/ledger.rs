//! # Ledger Update Reassembler
//!
//! The node streams each atomic ledger mutation as a flat run of records
//! bounded by batch markers:
//!
//! ```text
//! BEGIN(C, consumed=n, created=m)  Consumed × n  Created × m  END(C, n, m)
//! ```
//!
//! `LedgerUpdateAssembler` folds such a run into one `LedgerUpdate`:
//!
//! ```text
//!            BEGIN                      END (counts + ID match)
//!   Idle ───────────────→ Open ─────────────────────────────→ Idle  (deliver)
//!    │                     │ ↺ Consumed / Created
//!    │ Consumed/Created/END│ BEGIN
//!    ↓                     ↓
//!  InvalidOperation    AlreadyInProgress     END mismatch → EndedAbruptly
//! ```
//!
//! Every error is terminal for the stream: a desynchronized batch cannot be
//! skipped without silently dropping ledger mutations.

use super::entities::{AcceptedTransaction, LedgerUpdate};
use super::output::unwrap_output;
use crate::error::{BridgeError, Result};
use crate::ports::LedgerCodec;
use shared_types::{
    BatchMarker, CommitmentId, LedgerUpdateRecord, MarkerType, ProtocolParameters,
    RawAcceptedTransaction, SlotIndex,
};
use std::sync::Arc;
use tracing::debug;

/// Upper bound on capacity reserved from a begin marker's declared counts.
const MAX_PREALLOCATED_OUTPUTS: usize = 1024;

/// State the reassembler reads from the rest of the bridge.
pub trait BatchContext {
    /// Protocol parameters to decode objects of `slot` with.
    fn api_for_slot(&self, slot: SlotIndex) -> Result<Arc<ProtocolParameters>>;

    /// Latest commitment known to the bridge right now.
    fn latest_commitment_id(&self) -> CommitmentId;
}

/// Reassembles ledger update records into complete batches.
pub struct LedgerUpdateAssembler {
    codec: Arc<dyn LedgerCodec>,
    open: Option<LedgerUpdate>,
}

impl LedgerUpdateAssembler {
    /// Create an idle assembler.
    pub fn new(codec: Arc<dyn LedgerCodec>) -> Self {
        Self { codec, open: None }
    }

    /// Whether a batch is currently open.
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Feed the next record.
    ///
    /// Returns the completed batch when `record` is its matching end marker.
    pub fn process(
        &mut self,
        record: LedgerUpdateRecord,
        ctx: &dyn BatchContext,
    ) -> Result<Option<LedgerUpdate>> {
        match record {
            LedgerUpdateRecord::BatchMarker(marker) => match marker.marker_type {
                MarkerType::Begin => self.begin(&marker, ctx).map(|()| None),
                MarkerType::End => self.end(&marker).map(Some),
            },
            LedgerUpdateRecord::Consumed(spent) => {
                let update = self
                    .open
                    .as_mut()
                    .ok_or(BridgeError::LedgerUpdateInvalidOperation)?;
                let output = unwrap_output(
                    self.codec.as_ref(),
                    &update.api,
                    &spent.output,
                    Some(&spent),
                    update.latest_commitment_id,
                )?;
                update.consumed.push(output);
                Ok(None)
            }
            LedgerUpdateRecord::Created(raw) => {
                let update = self
                    .open
                    .as_mut()
                    .ok_or(BridgeError::LedgerUpdateInvalidOperation)?;
                let output = unwrap_output(
                    self.codec.as_ref(),
                    &update.api,
                    &raw,
                    None,
                    update.latest_commitment_id,
                )?;
                update.created.push(output);
                Ok(None)
            }
        }
    }

    fn begin(&mut self, marker: &BatchMarker, ctx: &dyn BatchContext) -> Result<()> {
        debug!(
            commitment_id = %marker.commitment_id,
            consumed = marker.consumed_count,
            created = marker.created_count,
            "BEGIN batch"
        );

        if self.open.is_some() {
            return Err(BridgeError::LedgerUpdateAlreadyInProgress);
        }

        self.open = Some(LedgerUpdate {
            api: ctx.api_for_slot(marker.commitment_id.slot())?,
            commitment_id: marker.commitment_id,
            latest_commitment_id: ctx.latest_commitment_id(),
            consumed: Vec::with_capacity(preallocate(marker.consumed_count)),
            created: Vec::with_capacity(preallocate(marker.created_count)),
        });
        Ok(())
    }

    fn end(&mut self, marker: &BatchMarker) -> Result<LedgerUpdate> {
        debug!(
            commitment_id = %marker.commitment_id,
            consumed = marker.consumed_count,
            created = marker.created_count,
            "END batch"
        );

        let update = self
            .open
            .take()
            .ok_or(BridgeError::LedgerUpdateInvalidOperation)?;

        if update.consumed.len() != marker.consumed_count as usize
            || update.created.len() != marker.created_count as usize
            || update.commitment_id != marker.commitment_id
        {
            debug!(
                expected_commitment_id = %marker.commitment_id,
                commitment_id = %update.commitment_id,
                consumed = update.consumed.len(),
                created = update.created.len(),
                "Batch does not match its end marker"
            );
            return Err(BridgeError::LedgerUpdateEndedAbruptly);
        }

        Ok(update)
    }
}

fn preallocate(count: u32) -> usize {
    (count as usize).min(MAX_PREALLOCATED_OUTPUTS)
}

/// Unwrap and verify every output of an accepted transaction.
pub fn unwrap_accepted_transaction(
    codec: &dyn LedgerCodec,
    ctx: &dyn BatchContext,
    raw: RawAcceptedTransaction,
) -> Result<AcceptedTransaction> {
    let api = ctx.api_for_slot(raw.slot)?;
    let latest_commitment_id = ctx.latest_commitment_id();

    let consumed = raw
        .consumed
        .iter()
        .map(|spent| {
            unwrap_output(codec, &api, &spent.output, Some(spent), latest_commitment_id)
        })
        .collect::<Result<Vec<_>>>()?;

    let created = raw
        .created
        .iter()
        .map(|output| unwrap_output(codec, &api, output, None, latest_commitment_id))
        .collect::<Result<Vec<_>>>()?;

    Ok(AcceptedTransaction {
        api,
        slot: raw.slot,
        transaction_id: raw.transaction_id,
        consumed,
        created,
    })
}
