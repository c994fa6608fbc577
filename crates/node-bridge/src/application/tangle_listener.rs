//! # Acceptance Notification Registry
//!
//! Lets callers wait for one specific block to be accepted, either with a
//! one-shot callback or with any number of `Listener` handles.
//!
//! ## Registration race
//!
//! The accepted blocks stream only reports transitions, never blocks that
//! were accepted before the caller registered. Registration therefore happens
//! first, then the block's metadata is queried; if the block is already
//! accepted the trigger is synthesized locally. A block the node does not
//! know yet keeps its registration so the stream can still deliver it.

use super::stream::listen_to_stream;
use crate::domain::{Commitment, StatusCache};
use crate::error::{BridgeError, Result};
use crate::ports::NodeClient;
use parking_lot::Mutex;
use shared_bus::{Event, Hook, Listener, ValueNotifier};
use shared_types::{BlockId, BlockMetadata, SlotIndex};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

type BlockAcceptedCallback = Box<dyn FnOnce(BlockMetadata) + Send + 'static>;

/// Events triggered by the tangle listener.
#[derive(Debug, Default)]
pub struct TangleEvents {
    /// A block was reported accepted by the stream.
    pub block_accepted: Event<BlockMetadata>,
}

/// The acceptance query for a freshly registered listener failed.
///
/// The listener is still registered and is handed back so the caller can
/// keep waiting on the stream or drop it.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ListenerQueryError {
    /// The registered listener.
    pub listener: Listener<BlockId>,
    /// Why the metadata query failed.
    #[source]
    pub error: BridgeError,
}

impl From<ListenerQueryError> for BridgeError {
    fn from(e: ListenerQueryError) -> Self {
        e.error
    }
}

/// Registry of callbacks and listeners waiting for block acceptance.
pub struct TangleListener {
    client: Arc<dyn NodeClient>,
    status: Arc<StatusCache>,
    callbacks: Mutex<HashMap<BlockId, BlockAcceptedCallback>>,
    block_accepted: ValueNotifier<BlockId>,
    slot_finalized: Arc<ValueNotifier<SlotIndex>>,
    events: TangleEvents,
    _finalized_hook: Hook<Commitment>,
}

impl TangleListener {
    /// Create a listener. Slot finalized listeners are driven by `status`.
    pub fn new(client: Arc<dyn NodeClient>, status: Arc<StatusCache>) -> Self {
        let slot_finalized = Arc::new(ValueNotifier::new());

        let finalized_hook = {
            let slot_finalized = slot_finalized.clone();
            status
                .events()
                .latest_finalized_commitment_changed
                .hook(move |commitment: &Commitment| {
                    let finalized = commitment.slot();
                    slot_finalized.notify_where(|slot| *slot <= finalized);
                })
        };

        Self {
            client,
            status,
            callbacks: Mutex::new(HashMap::new()),
            block_accepted: ValueNotifier::new(),
            slot_finalized,
            events: TangleEvents::default(),
            _finalized_hook: finalized_hook,
        }
    }

    /// Events triggered by this listener.
    pub fn events(&self) -> &TangleEvents {
        &self.events
    }

    /// Register a callback invoked once when `block_id` is accepted.
    ///
    /// Fails with `AlreadyRegistered` if a callback for the block is pending.
    /// If the metadata query fails with anything but `NotFound`, the error is
    /// returned and the callback stays registered.
    pub async fn register_block_accepted_callback<F>(
        &self,
        block_id: BlockId,
        callback: F,
    ) -> Result<()>
    where
        F: FnOnce(BlockMetadata) + Send + 'static,
    {
        {
            let mut callbacks = self.callbacks.lock();
            if callbacks.contains_key(&block_id) {
                return Err(BridgeError::AlreadyRegistered(block_id));
            }
            callbacks.insert(block_id, Box::new(callback));
        }

        let Some(metadata) = self.query_metadata(block_id).await? else {
            return Ok(());
        };

        if metadata.block_state.is_accepted() {
            debug!(%block_id, "Block already accepted, triggering callback");
            self.trigger_callback(metadata);
        }
        Ok(())
    }

    /// Register a listener signalled when `block_id` is accepted.
    ///
    /// The listener is already triggered if the block was accepted before.
    /// On a query error other than `NotFound` the listener stays registered
    /// and is returned inside the error.
    pub async fn register_block_accepted_event(
        &self,
        block_id: BlockId,
    ) -> std::result::Result<Listener<BlockId>, ListenerQueryError> {
        let listener = self.block_accepted.listener(block_id);

        match self.query_metadata(block_id).await {
            Ok(Some(metadata)) if metadata.block_state.is_accepted() => {
                self.block_accepted.notify(&block_id);
            }
            Ok(_) => {}
            Err(error) => return Err(ListenerQueryError { listener, error }),
        }
        Ok(listener)
    }

    /// Register a listener signalled once a finalized commitment reaches
    /// `slot`. Triggered immediately if it already has.
    pub fn register_slot_finalized_event(&self, slot: SlotIndex) -> Listener<SlotIndex> {
        let listener = self.slot_finalized.listener(slot);

        let finalized = self
            .status
            .latest_finalized_commitment()
            .map(|commitment| commitment.slot());
        if finalized.is_some_and(|finalized| finalized >= slot) {
            self.slot_finalized.notify(&slot);
        }
        listener
    }

    /// Remove the pending callback for `block_id`. Returns whether one existed.
    pub fn deregister_block_accepted_callback(&self, block_id: &BlockId) -> bool {
        self.callbacks.lock().remove(block_id).is_some()
    }

    /// Remove every pending callback.
    pub fn clear_block_accepted_callbacks(&self) {
        self.callbacks.lock().clear();
    }

    /// Number of pending callbacks.
    pub fn pending_callbacks(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Consume the accepted blocks stream until `cancel` fires or the stream
    /// ends.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        let stream = self.client.listen_to_accepted_blocks().await?;
        info!("Listening to accepted blocks");

        let result = listen_to_stream(cancel, stream, |metadata| {
            self.deliver(metadata);
            Ok(())
        })
        .await;

        if let Err(e) = &result {
            error!(error = %e, "Error listening to accepted blocks");
        }
        result
    }

    /// Deliver an acceptance reported by the stream.
    fn deliver(&self, metadata: BlockMetadata) {
        let block_id = metadata.block_id;
        self.trigger_callback(metadata.clone());
        self.block_accepted.notify(&block_id);
        self.events.block_accepted.trigger(&metadata);
    }

    /// Remove the callback for the block and run it on its own task.
    fn trigger_callback(&self, metadata: BlockMetadata) {
        let callback = self.callbacks.lock().remove(&metadata.block_id);
        if let Some(callback) = callback {
            tokio::spawn(async move { callback(metadata) });
        }
    }

    async fn query_metadata(&self, block_id: BlockId) -> Result<Option<BlockMetadata>> {
        match self.client.read_block_metadata(block_id).await {
            Ok(metadata) => Ok(Some(metadata)),
            Err(status) if status.is_not_found() => Ok(None),
            Err(status) => Err(status.into()),
        }
    }
}
