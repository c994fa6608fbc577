//! Events triggered by the status cache.

use super::entities::Commitment;
use shared_bus::Event;

/// Events the bridge triggers when the node makes forward progress.
#[derive(Debug, Default)]
pub struct BridgeEvents {
    /// The latest commitment moved to a higher slot.
    pub latest_commitment_changed: Event<Commitment>,
    /// The latest finalized commitment moved to a higher slot.
    pub latest_finalized_commitment_changed: Event<Commitment>,
}

impl BridgeEvents {
    /// Create the event set.
    pub fn new() -> Self {
        Self::default()
    }
}
