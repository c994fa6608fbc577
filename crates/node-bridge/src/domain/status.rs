//! # Synchronized Status Cache
//!
//! Mirror of the node's status: the latest snapshot, the latest commitment
//! and the latest finalized commitment, guarded jointly by one lock so that
//! readers never observe a half-applied update.
//!
//! ## Update rules
//!
//! - Protocol parameters are decoded first. A version the bridge does not
//!   support rejects the whole update; nothing changes.
//! - Each commitment advances only if none is cached yet or the incoming one
//!   sits at a strictly higher slot. A commitment that fails to decode keeps
//!   the cached value and fires no event.
//! - The snapshot itself is replaced last.
//! - Change events fire after the lock is released, so hooks may read the
//!   cache.

use super::entities::{Commitment, NodeStatus, SUPPORTED_PROTOCOL_VERSION};
use super::events::BridgeEvents;
use super::ledger::BatchContext;
use crate::error::{BridgeError, Result};
use crate::ports::LedgerCodec;
use parking_lot::RwLock;
use shared_types::{
    CommitmentId, ProtocolParameters, RawCommitment, RawNodeStatus, RawProtocolParameters,
    SlotIndex,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Which commitments advanced during an update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusUpdate {
    /// The latest commitment advanced.
    pub latest_commitment_changed: bool,
    /// The latest finalized commitment advanced.
    pub latest_finalized_commitment_changed: bool,
}

#[derive(Default)]
struct StatusState {
    status: Option<NodeStatus>,
    latest_commitment: Option<Commitment>,
    latest_finalized_commitment: Option<Commitment>,
}

/// Node status mirror with change detection.
pub struct StatusCache {
    codec: Arc<dyn LedgerCodec>,
    state: RwLock<StatusState>,
    events: BridgeEvents,
}

impl StatusCache {
    /// Create an empty cache.
    pub fn new(codec: Arc<dyn LedgerCodec>) -> Self {
        Self {
            codec,
            state: RwLock::new(StatusState::default()),
            events: BridgeEvents::new(),
        }
    }

    /// Events fired on forward progress.
    pub fn events(&self) -> &BridgeEvents {
        &self.events
    }

    /// Current snapshot, if any status has been applied.
    pub fn status(&self) -> Option<NodeStatus> {
        self.state.read().status.clone()
    }

    /// Latest commitment.
    pub fn latest_commitment(&self) -> Option<Commitment> {
        self.state.read().latest_commitment.clone()
    }

    /// Latest finalized commitment.
    pub fn latest_finalized_commitment(&self) -> Option<Commitment> {
        self.state.read().latest_finalized_commitment.clone()
    }

    /// Protocol parameters of the current snapshot.
    pub fn protocol_parameters(&self) -> Option<Arc<ProtocolParameters>> {
        self.state
            .read()
            .status
            .as_ref()
            .map(|status| status.protocol_parameters.clone())
    }

    /// Apply a status update received from the node.
    pub fn apply_incoming_status(&self, raw: RawNodeStatus) -> Result<StatusUpdate> {
        let params = Arc::new(protocol_parameters_from_raw(
            self.codec.as_ref(),
            &raw.current_protocol_parameters,
        )?);

        let mut update = StatusUpdate::default();
        let mut latest_changed = None;
        let mut finalized_changed = None;

        {
            let mut state = self.state.write();

            if let Some(incoming) = &raw.latest_commitment {
                if advances(state.latest_commitment.as_ref(), incoming) {
                    if let Some(commitment) = self.decode("latest", incoming, &params) {
                        state.latest_commitment = Some(commitment.clone());
                        latest_changed = Some(commitment);
                    }
                }
            }

            if let Some(incoming) = &raw.latest_finalized_commitment {
                if advances(state.latest_finalized_commitment.as_ref(), incoming) {
                    if let Some(commitment) = self.decode("latest finalized", incoming, &params) {
                        state.latest_finalized_commitment = Some(commitment.clone());
                        finalized_changed = Some(commitment);
                    }
                }
            }

            state.status = Some(NodeStatus {
                is_healthy: raw.is_healthy,
                latest_commitment_id: raw.latest_commitment.as_ref().map(|c| c.commitment_id),
                latest_finalized_commitment_id: raw
                    .latest_finalized_commitment
                    .as_ref()
                    .map(|c| c.commitment_id),
                pruning_epoch: raw.pruning_epoch,
                protocol_parameters: params,
            });
        }

        if let Some(commitment) = latest_changed {
            debug!(commitment_id = %commitment.commitment_id, "Latest commitment changed");
            self.events.latest_commitment_changed.trigger(&commitment);
            update.latest_commitment_changed = true;
        }

        if let Some(commitment) = finalized_changed {
            debug!(commitment_id = %commitment.commitment_id, "Latest finalized commitment changed");
            self.events
                .latest_finalized_commitment_changed
                .trigger(&commitment);
            update.latest_finalized_commitment_changed = true;
        }

        Ok(update)
    }

    fn decode(
        &self,
        kind: &str,
        raw: &RawCommitment,
        params: &ProtocolParameters,
    ) -> Option<Commitment> {
        match decode_commitment(self.codec.as_ref(), raw, params) {
            Ok(commitment) => Some(commitment),
            Err(e) => {
                warn!(
                    kind,
                    commitment_id = %raw.commitment_id,
                    error = %e,
                    "Failed to decode commitment, keeping cached value"
                );
                None
            }
        }
    }
}

impl BatchContext for StatusCache {
    fn api_for_slot(&self, _slot: SlotIndex) -> Result<Arc<ProtocolParameters>> {
        self.protocol_parameters()
            .ok_or(BridgeError::StatusUnavailable)
    }

    fn latest_commitment_id(&self) -> CommitmentId {
        self.state
            .read()
            .latest_commitment
            .as_ref()
            .map_or_else(CommitmentId::empty, |c| c.commitment_id)
    }
}

/// Decode a protocol parameters blob after checking its version tag.
pub fn protocol_parameters_from_raw(
    codec: &dyn LedgerCodec,
    raw: &RawProtocolParameters,
) -> Result<ProtocolParameters> {
    if raw.protocol_version != SUPPORTED_PROTOCOL_VERSION {
        return Err(BridgeError::UnsupportedProtocolVersion {
            got: raw.protocol_version,
            supported: SUPPORTED_PROTOCOL_VERSION,
        });
    }

    codec.decode_protocol_parameters(&raw.params)
}

/// Decode a commitment received from the node.
pub(crate) fn decode_commitment(
    codec: &dyn LedgerCodec,
    raw: &RawCommitment,
    params: &ProtocolParameters,
) -> Result<Commitment> {
    Ok(Commitment {
        commitment_id: raw.commitment_id,
        commitment: codec.decode_commitment(&raw.data, params)?,
    })
}

fn advances(cached: Option<&Commitment>, incoming: &RawCommitment) -> bool {
    cached.map_or(true, |cached| incoming.commitment_id.slot() > cached.slot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::codec::BincodeCodec;
    use crate::adapters::mock::{raw_commitment, raw_node_status, raw_protocol_parameters};
    use parking_lot::Mutex;

    fn cache() -> (Arc<BincodeCodec>, StatusCache) {
        let codec = Arc::new(BincodeCodec::new());
        let cache = StatusCache::new(codec.clone());
        (codec, cache)
    }

    #[test]
    fn test_empty_cache() {
        let (_, cache) = cache();
        assert!(cache.status().is_none());
        assert!(cache.latest_commitment().is_none());
        assert!(cache.protocol_parameters().is_none());
        assert!(matches!(
            cache.api_for_slot(1),
            Err(BridgeError::StatusUnavailable)
        ));
        assert!(cache.latest_commitment_id().is_empty());
    }

    #[test]
    fn test_first_status_sets_everything() {
        let (codec, cache) = cache();
        let update = cache
            .apply_incoming_status(raw_node_status(&codec, 100, 90))
            .expect("apply");

        assert!(update.latest_commitment_changed);
        assert!(update.latest_finalized_commitment_changed);
        assert_eq!(cache.latest_commitment().map(|c| c.slot()), Some(100));
        assert_eq!(cache.latest_finalized_commitment().map(|c| c.slot()), Some(90));
        assert!(cache.status().expect("status").is_healthy);
    }

    #[test]
    fn test_stale_commitment_ignored() {
        let (codec, cache) = cache();
        cache
            .apply_incoming_status(raw_node_status(&codec, 100, 90))
            .expect("apply");

        let fired = Arc::new(Mutex::new(Vec::new()));
        let _hook = {
            let fired = fired.clone();
            cache
                .events()
                .latest_commitment_changed
                .hook(move |c| fired.lock().push(c.slot()))
        };

        let update = cache
            .apply_incoming_status(raw_node_status(&codec, 99, 90))
            .expect("apply");

        assert!(!update.latest_commitment_changed);
        assert!(!update.latest_finalized_commitment_changed);
        assert_eq!(cache.latest_commitment().map(|c| c.slot()), Some(100));
        assert!(fired.lock().is_empty());
    }

    #[test]
    fn test_equal_slot_is_not_progress() {
        let (codec, cache) = cache();
        cache
            .apply_incoming_status(raw_node_status(&codec, 100, 90))
            .expect("apply");
        let update = cache
            .apply_incoming_status(raw_node_status(&codec, 100, 90))
            .expect("apply");
        assert_eq!(update, StatusUpdate::default());
    }

    #[test]
    fn test_fields_advance_independently() {
        let (codec, cache) = cache();
        cache
            .apply_incoming_status(raw_node_status(&codec, 100, 90))
            .expect("apply");

        let update = cache
            .apply_incoming_status(raw_node_status(&codec, 100, 95))
            .expect("apply");
        assert!(!update.latest_commitment_changed);
        assert!(update.latest_finalized_commitment_changed);
        assert_eq!(cache.latest_finalized_commitment().map(|c| c.slot()), Some(95));
    }

    #[test]
    fn test_unsupported_version_rejects_update() {
        let (codec, cache) = cache();
        cache
            .apply_incoming_status(raw_node_status(&codec, 100, 90))
            .expect("apply");

        let mut raw = raw_node_status(&codec, 120, 110);
        raw.is_healthy = false;
        raw.current_protocol_parameters.protocol_version = SUPPORTED_PROTOCOL_VERSION + 1;

        let err = cache.apply_incoming_status(raw).expect_err("version skew");
        assert!(matches!(err, BridgeError::UnsupportedProtocolVersion { .. }));
        assert_eq!(cache.latest_commitment().map(|c| c.slot()), Some(100));
        assert!(cache.status().expect("status").is_healthy);
    }

    #[test]
    fn test_decode_failure_keeps_field_and_updates_other() {
        let (codec, cache) = cache();
        cache
            .apply_incoming_status(raw_node_status(&codec, 100, 90))
            .expect("apply");

        let mut raw = raw_node_status(&codec, 101, 91);
        if let Some(latest) = raw.latest_commitment.as_mut() {
            latest.data = vec![0xFF];
        }

        let update = cache.apply_incoming_status(raw).expect("apply");
        assert!(!update.latest_commitment_changed);
        assert!(update.latest_finalized_commitment_changed);
        assert_eq!(cache.latest_commitment().map(|c| c.slot()), Some(100));
        assert_eq!(cache.latest_finalized_commitment().map(|c| c.slot()), Some(91));

        let status = cache.status().expect("status");
        assert_eq!(status.latest_commitment_id.map(|id| id.slot()), Some(101));
    }

    #[test]
    fn test_hook_can_read_cache() {
        let (codec, cache) = cache();
        let cache = Arc::new(cache);
        let observed = Arc::new(Mutex::new(None));

        let _hook = {
            let reader = Arc::downgrade(&cache);
            let observed = observed.clone();
            cache.events().latest_commitment_changed.hook(move |_| {
                if let Some(cache) = reader.upgrade() {
                    *observed.lock() = cache.latest_commitment().map(|c| c.slot());
                }
            })
        };

        cache
            .apply_incoming_status(raw_node_status(&codec, 7, 5))
            .expect("apply");
        assert_eq!(*observed.lock(), Some(7));
    }

    #[test]
    fn test_accessors_idempotent() {
        let (codec, cache) = cache();
        cache
            .apply_incoming_status(raw_node_status(&codec, 12, 10))
            .expect("apply");

        assert_eq!(cache.status(), cache.status());
        assert_eq!(cache.latest_commitment(), cache.latest_commitment());
        assert_eq!(
            cache.latest_finalized_commitment(),
            cache.latest_finalized_commitment()
        );
    }

    #[test]
    fn test_missing_commitments_keep_cached() {
        let (codec, cache) = cache();
        cache
            .apply_incoming_status(raw_node_status(&codec, 12, 10))
            .expect("apply");

        let raw = RawNodeStatus {
            is_healthy: true,
            latest_commitment: None,
            latest_finalized_commitment: Some(raw_commitment(&codec, 11)),
            pruning_epoch: 0,
            current_protocol_parameters: raw_protocol_parameters(&codec),
        };
        cache.apply_incoming_status(raw).expect("apply");

        assert_eq!(cache.latest_commitment().map(|c| c.slot()), Some(12));
        assert_eq!(cache.latest_finalized_commitment().map(|c| c.slot()), Some(11));
    }
}
