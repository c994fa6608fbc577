//! In-memory Node
//!
//! `MockNodeClient` implements `NodeClient` without a network. Each server
//! stream is backed by an unbounded channel the test pushes into; unary calls
//! read from maps seeded through setter methods.
//!
//! The fixture functions at the bottom build raw node messages whose encoded
//! payloads and identity proofs are valid for `BincodeCodec`.

use super::codec::BincodeCodec;
use crate::domain::SUPPORTED_PROTOCOL_VERSION;
use crate::ports::{LedgerCodec, NodeClient, RpcResult, RpcStream};
use async_trait::async_trait;
use futures::{stream, StreamExt};
use parking_lot::Mutex;
use shared_types::{
    proof::sha256, AccountInfoRequest, ApiRouteRequest, BatchMarker, BlockId, BlockMetadata,
    CommitmentId, CommitmentRequest, LedgerUpdateRecord, MarkerType, OutputId, OutputIdProof,
    ProtocolParameters, RawAcceptedTransaction, RawBlock, RawBlockMessage, RawCommitment,
    RawNodeStatus, RawOutput, RawOutputResponse, RawProtocolParameters, RpcStatus,
    SlotCommitment, SlotIndex, SlotRangeRequest, Tips, TransactionId, TransactionMetadata,
    TransactionOutput,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// A server stream fed by the test.
///
/// The stream can be opened once. Items pushed before it is opened are
/// buffered. Closing the sender ends the stream after the buffered items.
pub struct MockStream<T> {
    sender: Mutex<Option<mpsc::UnboundedSender<RpcResult<T>>>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<RpcResult<T>>>>,
    open_error: Mutex<Option<RpcStatus>>,
}

impl<T: Send + 'static> MockStream<T> {
    /// Create an unopened stream.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
            open_error: Mutex::new(None),
        }
    }

    /// Push an item. Returns `false` if the stream was closed or dropped.
    pub fn send(&self, item: T) -> bool {
        self.push(Ok(item))
    }

    /// Push an error status.
    pub fn fail(&self, status: RpcStatus) -> bool {
        self.push(Err(status))
    }

    /// End the stream once buffered items are drained.
    pub fn close(&self) {
        self.sender.lock().take();
    }

    /// Make the next `open` fail with `status`.
    pub fn fail_open(&self, status: RpcStatus) {
        *self.open_error.lock() = Some(status);
    }

    /// Whether the stream was opened by a listener.
    pub fn is_opened(&self) -> bool {
        self.receiver.lock().is_none()
    }

    fn push(&self, item: RpcResult<T>) -> bool {
        self.sender
            .lock()
            .as_ref()
            .map_or(false, |sender| sender.send(item).is_ok())
    }

    fn open(&self) -> RpcResult<RpcStream<T>> {
        if let Some(status) = self.open_error.lock().take() {
            return Err(status);
        }

        let receiver = self
            .receiver
            .lock()
            .take()
            .ok_or_else(|| RpcStatus::unavailable("stream already opened"))?;
        Ok(UnboundedReceiverStream::new(receiver).boxed())
    }
}

impl<T: Send + 'static> Default for MockStream<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Role an account can hold in the committee selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountRole {
    /// Announced candidacy.
    Candidate,
    /// Selected into the committee.
    CommitteeMember,
    /// Registered validator.
    Validator,
}

/// Mock node for testing.
#[derive(Default)]
pub struct MockNodeClient {
    node_status_stream: MockStream<RawNodeStatus>,
    ledger_update_stream: MockStream<LedgerUpdateRecord>,
    accepted_transaction_stream: MockStream<RawAcceptedTransaction>,
    accepted_block_stream: MockStream<BlockMetadata>,
    block_stream: MockStream<RawBlockMessage>,

    node_status: Mutex<Option<RawNodeStatus>>,
    block_metadata: Mutex<HashMap<BlockId, BlockMetadata>>,
    block_metadata_error: Mutex<Option<RpcStatus>>,
    blocks: Mutex<HashMap<BlockId, RawBlock>>,
    commitment_cones: Mutex<HashMap<SlotIndex, Vec<BlockMetadata>>>,
    transaction_metadata: Mutex<HashMap<TransactionId, TransactionMetadata>>,
    account_roles: Mutex<HashSet<(AccountInfoRequest, AccountRole)>>,
    outputs: Mutex<HashMap<OutputId, RawOutputResponse>>,
    commitments: Mutex<Vec<RawCommitment>>,
    submitted_blocks: Mutex<Vec<RawBlock>>,
    routes: Mutex<Vec<String>>,
    registered_routes: Mutex<Vec<ApiRouteRequest>>,
    tips: Mutex<Tips>,

    status_cooldown_ms: Mutex<Option<u32>>,
    ledger_range: Mutex<Option<SlotRangeRequest>>,
    metadata_reads: AtomicUsize,
    tips_requests: AtomicUsize,
    route_reads: AtomicUsize,
}

impl MockNodeClient {
    /// Create a mock node with no state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock node reporting a healthy status with the given slots.
    pub fn with_status(latest_slot: SlotIndex, finalized_slot: SlotIndex) -> Self {
        let node = Self::new();
        node.set_node_status(raw_node_status(
            &BincodeCodec::new(),
            latest_slot,
            finalized_slot,
        ));
        node
    }

    /// Node status stream.
    pub fn node_status(&self) -> &MockStream<RawNodeStatus> {
        &self.node_status_stream
    }

    /// Ledger update stream.
    pub fn ledger_updates(&self) -> &MockStream<LedgerUpdateRecord> {
        &self.ledger_update_stream
    }

    /// Accepted transaction stream.
    pub fn accepted_transactions(&self) -> &MockStream<RawAcceptedTransaction> {
        &self.accepted_transaction_stream
    }

    /// Accepted block stream.
    pub fn accepted_blocks(&self) -> &MockStream<BlockMetadata> {
        &self.accepted_block_stream
    }

    /// Block stream.
    pub fn blocks(&self) -> &MockStream<RawBlockMessage> {
        &self.block_stream
    }

    /// Status returned by `read_node_status`.
    pub fn set_node_status(&self, status: RawNodeStatus) {
        *self.node_status.lock() = Some(status);
    }

    /// Add or replace the metadata of a block.
    pub fn insert_block_metadata(&self, metadata: BlockMetadata) {
        self.block_metadata
            .lock()
            .insert(metadata.block_id, metadata);
    }

    /// Make `read_block_metadata` fail with `status` (or stop failing).
    pub fn set_block_metadata_error(&self, status: Option<RpcStatus>) {
        *self.block_metadata_error.lock() = status;
    }

    /// Store an encoded block under `block_id`.
    pub fn insert_block(&self, block_id: BlockId, block: RawBlock) {
        self.blocks.lock().insert(block_id, block);
    }

    /// Metadata of the blocks in the past cone of the commitment at `slot`.
    pub fn set_commitment_cone(&self, slot: SlotIndex, cone: Vec<BlockMetadata>) {
        self.commitment_cones.lock().insert(slot, cone);
    }

    /// Add or replace the metadata of a transaction.
    pub fn insert_transaction_metadata(&self, metadata: TransactionMetadata) {
        self.transaction_metadata
            .lock()
            .insert(metadata.transaction_id, metadata);
    }

    /// Grant `role` to the account at the request's slot.
    pub fn grant_account_role(&self, request: AccountInfoRequest, role: AccountRole) {
        self.account_roles.lock().insert((request, role));
    }

    /// Add an output response.
    pub fn insert_output(&self, output_id: OutputId, response: RawOutputResponse) {
        self.outputs.lock().insert(output_id, response);
    }

    /// Add a commitment.
    pub fn insert_commitment(&self, commitment: RawCommitment) {
        self.commitments.lock().push(commitment);
    }

    /// Tips returned by `request_tips`.
    pub fn set_tips(&self, tips: Tips) {
        *self.tips.lock() = tips;
    }

    /// Expose a route as if another plugin registered it.
    pub fn add_route(&self, route: &str) {
        self.routes.lock().push(route.to_string());
    }

    /// Blocks received through `submit_block`.
    pub fn submitted_blocks(&self) -> Vec<RawBlock> {
        self.submitted_blocks.lock().clone()
    }

    /// Routes currently registered through `register_api_route`.
    pub fn registered_routes(&self) -> Vec<ApiRouteRequest> {
        self.registered_routes.lock().clone()
    }

    /// Cooldown requested by the last node status listener.
    pub fn status_cooldown_ms(&self) -> Option<u32> {
        *self.status_cooldown_ms.lock()
    }

    /// Range requested by the last ledger update listener.
    pub fn ledger_range(&self) -> Option<SlotRangeRequest> {
        *self.ledger_range.lock()
    }

    /// Number of `read_block_metadata` calls.
    pub fn metadata_reads(&self) -> usize {
        self.metadata_reads.load(Ordering::SeqCst)
    }

    /// Number of `request_tips` calls.
    pub fn tips_requests(&self) -> usize {
        self.tips_requests.load(Ordering::SeqCst)
    }

    /// Number of `read_node_routes` calls.
    pub fn route_reads(&self) -> usize {
        self.route_reads.load(Ordering::SeqCst)
    }

    fn has_role(&self, request: AccountInfoRequest, role: AccountRole) -> bool {
        self.account_roles.lock().contains(&(request, role))
    }
}

#[async_trait]
impl NodeClient for MockNodeClient {
    async fn read_node_status(&self) -> RpcResult<RawNodeStatus> {
        self.node_status
            .lock()
            .clone()
            .ok_or_else(|| RpcStatus::unavailable("node status not set"))
    }

    async fn listen_to_node_status(&self, cooldown_ms: u32) -> RpcResult<RpcStream<RawNodeStatus>> {
        *self.status_cooldown_ms.lock() = Some(cooldown_ms);
        self.node_status_stream.open()
    }

    async fn listen_to_ledger_updates(
        &self,
        range: SlotRangeRequest,
    ) -> RpcResult<RpcStream<LedgerUpdateRecord>> {
        *self.ledger_range.lock() = Some(range);
        self.ledger_update_stream.open()
    }

    async fn listen_to_accepted_transactions(
        &self,
    ) -> RpcResult<RpcStream<RawAcceptedTransaction>> {
        self.accepted_transaction_stream.open()
    }

    async fn listen_to_accepted_blocks(&self) -> RpcResult<RpcStream<BlockMetadata>> {
        self.accepted_block_stream.open()
    }

    async fn read_block_metadata(&self, block_id: BlockId) -> RpcResult<BlockMetadata> {
        self.metadata_reads.fetch_add(1, Ordering::SeqCst);

        if let Some(status) = self.block_metadata_error.lock().clone() {
            return Err(status);
        }

        self.block_metadata
            .lock()
            .get(&block_id)
            .cloned()
            .ok_or_else(|| RpcStatus::not_found(format!("block {block_id} not found")))
    }

    async fn read_block(&self, block_id: BlockId) -> RpcResult<RawBlock> {
        self.blocks
            .lock()
            .get(&block_id)
            .cloned()
            .ok_or_else(|| RpcStatus::not_found(format!("block {block_id} not found")))
    }

    async fn listen_to_blocks(&self) -> RpcResult<RpcStream<RawBlockMessage>> {
        self.block_stream.open()
    }

    async fn submit_block(&self, block: RawBlock) -> RpcResult<BlockId> {
        let block_id = BlockId::new(sha256(&block.data), 0);
        self.blocks.lock().insert(block_id, block.clone());
        self.submitted_blocks.lock().push(block);
        Ok(block_id)
    }

    async fn read_output(&self, output_id: OutputId) -> RpcResult<RawOutputResponse> {
        self.outputs
            .lock()
            .get(&output_id)
            .cloned()
            .ok_or_else(|| RpcStatus::not_found(format!("output {output_id} not found")))
    }

    async fn read_commitment(&self, request: CommitmentRequest) -> RpcResult<RawCommitment> {
        self.commitments
            .lock()
            .iter()
            .find(|c| match request {
                CommitmentRequest::BySlot(slot) => c.commitment_id.slot() == slot,
                CommitmentRequest::ById(id) => c.commitment_id == id,
            })
            .cloned()
            .ok_or_else(|| RpcStatus::not_found(format!("commitment {request:?} not found")))
    }

    async fn read_commitment_cone_metadata(
        &self,
        slot: SlotIndex,
    ) -> RpcResult<RpcStream<BlockMetadata>> {
        let cone = self
            .commitment_cones
            .lock()
            .get(&slot)
            .cloned()
            .ok_or_else(|| RpcStatus::not_found(format!("commitment for slot {slot} not found")))?;
        Ok(stream::iter(cone.into_iter().map(Ok)).boxed())
    }

    async fn read_transaction_metadata(
        &self,
        transaction_id: TransactionId,
    ) -> RpcResult<TransactionMetadata> {
        self.transaction_metadata
            .lock()
            .get(&transaction_id)
            .cloned()
            .ok_or_else(|| {
                RpcStatus::not_found(format!("transaction {transaction_id} not found"))
            })
    }

    async fn read_is_candidate(&self, request: AccountInfoRequest) -> RpcResult<bool> {
        Ok(self.has_role(request, AccountRole::Candidate))
    }

    async fn read_is_committee_member(&self, request: AccountInfoRequest) -> RpcResult<bool> {
        Ok(self.has_role(request, AccountRole::CommitteeMember))
    }

    async fn read_is_validator_account(&self, request: AccountInfoRequest) -> RpcResult<bool> {
        Ok(self.has_role(request, AccountRole::Validator))
    }

    async fn register_api_route(&self, request: ApiRouteRequest) -> RpcResult<()> {
        let mut routes = self.routes.lock();
        if !routes.contains(&request.route) {
            routes.push(request.route.clone());
        }
        self.registered_routes.lock().push(request);
        Ok(())
    }

    async fn unregister_api_route(&self, request: ApiRouteRequest) -> RpcResult<()> {
        self.routes.lock().retain(|route| *route != request.route);
        self.registered_routes
            .lock()
            .retain(|registered| registered.route != request.route);
        Ok(())
    }

    async fn request_tips(&self, count: u32) -> RpcResult<Tips> {
        self.tips_requests.fetch_add(1, Ordering::SeqCst);
        let mut tips = self.tips.lock().clone();
        tips.strong.truncate(count as usize);
        Ok(tips)
    }

    async fn read_node_routes(&self) -> RpcResult<Vec<String>> {
        self.route_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.routes.lock().clone())
    }
}

// =============================================================================
// FIXTURES
// =============================================================================

/// Protocol parameters blob of the supported version.
pub fn raw_protocol_parameters(codec: &BincodeCodec) -> RawProtocolParameters {
    RawProtocolParameters {
        protocol_version: SUPPORTED_PROTOCOL_VERSION,
        params: codec
            .encode_protocol_parameters(&ProtocolParameters::default())
            .unwrap_or_default(),
    }
}

/// Commitment at `slot`, chained to a synthetic predecessor.
pub fn raw_commitment(codec: &BincodeCodec, slot: SlotIndex) -> RawCommitment {
    let commitment = SlotCommitment {
        protocol_version: SUPPORTED_PROTOCOL_VERSION,
        slot,
        previous_commitment_id: CommitmentId::new(
            sha256(&slot.saturating_sub(1).to_le_bytes()),
            slot.saturating_sub(1),
        ),
        roots_id: sha256(&slot.to_be_bytes()),
        cumulative_weight: u64::from(slot) * 10,
        reference_mana_cost: 1,
    };

    RawCommitment {
        commitment_id: codec
            .commitment_id(&commitment)
            .unwrap_or_else(|_| CommitmentId::new([0; 32], slot)),
        data: codec.encode_commitment(&commitment).unwrap_or_default(),
    }
}

/// Healthy node status with commitments at the given slots.
pub fn raw_node_status(
    codec: &BincodeCodec,
    latest_slot: SlotIndex,
    finalized_slot: SlotIndex,
) -> RawNodeStatus {
    RawNodeStatus {
        is_healthy: true,
        latest_commitment: Some(raw_commitment(codec, latest_slot)),
        latest_finalized_commitment: Some(raw_commitment(codec, finalized_slot)),
        pruning_epoch: 0,
        current_protocol_parameters: raw_protocol_parameters(codec),
    }
}

/// Outputs of one transaction at `tx_slot`, one per amount, with valid
/// identity proofs.
pub fn raw_transaction_outputs(
    codec: &BincodeCodec,
    tx_slot: SlotIndex,
    amounts: &[u64],
    block_id: BlockId,
) -> Vec<RawOutput> {
    let api = ProtocolParameters::default();
    let encoded: Vec<Vec<u8>> = amounts
        .iter()
        .map(|amount| {
            let output = TransactionOutput {
                amount: *amount,
                mana: 0,
                owner: [0x11; 32],
                features: Vec::new(),
            };
            codec.encode_output(&output, &api).unwrap_or_default()
        })
        .collect();

    let mut essence = tx_slot.to_le_bytes().to_vec();
    essence.extend(amounts.iter().flat_map(|amount| amount.to_le_bytes()));
    let transaction_commitment = sha256(&essence);

    (0..encoded.len())
        .filter_map(|index| {
            let proof = OutputIdProof::build(tx_slot, transaction_commitment, &encoded, index)?;
            Some(RawOutput {
                block_id,
                output_id: proof.output_id(&encoded[index]),
                slot_booked: tx_slot,
                commitment_id_included: None,
                output: encoded[index].clone(),
                output_id_proof: codec.encode_output_id_proof(&proof).ok()?,
            })
        })
        .collect()
}

/// Accepted transaction creating one output per amount and consuming nothing.
pub fn raw_accepted_transaction(
    codec: &BincodeCodec,
    tx_slot: SlotIndex,
    amounts: &[u64],
) -> RawAcceptedTransaction {
    let created = raw_transaction_outputs(codec, tx_slot, amounts, BlockId::empty());
    let transaction_id = created
        .first()
        .map_or_else(TransactionId::empty, |output| output.output_id.transaction_id);

    RawAcceptedTransaction {
        transaction_id,
        slot: tx_slot,
        consumed: Vec::new(),
        created,
    }
}

/// Begin marker of a batch.
pub fn begin_marker(commitment_id: CommitmentId, consumed: u32, created: u32) -> LedgerUpdateRecord {
    marker(MarkerType::Begin, commitment_id, consumed, created)
}

/// End marker of a batch.
pub fn end_marker(commitment_id: CommitmentId, consumed: u32, created: u32) -> LedgerUpdateRecord {
    marker(MarkerType::End, commitment_id, consumed, created)
}

fn marker(
    marker_type: MarkerType,
    commitment_id: CommitmentId,
    consumed_count: u32,
    created_count: u32,
) -> LedgerUpdateRecord {
    LedgerUpdateRecord::BatchMarker(BatchMarker {
        marker_type,
        commitment_id,
        consumed_count,
        created_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_stream_buffers_until_closed() {
        let node = MockNodeClient::new();
        node.accepted_blocks().send(BlockMetadata::default());
        node.accepted_blocks().close();

        let mut stream = node.listen_to_accepted_blocks().await.expect("open");
        assert!(matches!(stream.next().await, Some(Ok(_))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_opens_once() {
        let node = MockNodeClient::new();
        let _stream = node.listen_to_accepted_blocks().await.expect("open");
        assert!(node.accepted_blocks().is_opened());
        assert!(node.listen_to_accepted_blocks().await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_block_is_not_found() {
        let node = MockNodeClient::new();
        let err = node
            .read_block_metadata(BlockId::new([1; 32], 1))
            .await
            .expect_err("unknown");
        assert!(err.is_not_found());
        assert_eq!(node.metadata_reads(), 1);
    }

    #[tokio::test]
    async fn test_route_registration_exposes_route() {
        let node = MockNodeClient::new();
        node.register_api_route(ApiRouteRequest {
            route: "indexer/v2".into(),
            host: "localhost".into(),
            port: 9091,
            path: String::new(),
        })
        .await
        .expect("register");

        assert_eq!(node.read_node_routes().await.expect("routes"), vec!["indexer/v2"]);

        node.unregister_api_route(ApiRouteRequest {
            route: "indexer/v2".into(),
            ..ApiRouteRequest::default()
        })
        .await
        .expect("unregister");
        assert!(node.registered_routes().is_empty());
    }

    #[tokio::test]
    async fn test_submitted_block_is_readable() {
        let node = MockNodeClient::new();
        let raw = RawBlock {
            data: vec![1, 2, 3],
        };
        let block_id = node.submit_block(raw.clone()).await.expect("submit");

        assert_eq!(node.read_block(block_id).await.expect("read"), raw);
        assert!(node
            .read_block(BlockId::new([9; 32], 1))
            .await
            .expect_err("unknown")
            .is_not_found());
    }

    #[tokio::test]
    async fn test_commitment_cone_is_finite() {
        let node = MockNodeClient::new();
        node.set_commitment_cone(4, vec![BlockMetadata::default(); 2]);

        let cone: Vec<_> = node
            .read_commitment_cone_metadata(4)
            .await
            .expect("cone")
            .collect()
            .await;
        assert_eq!(cone.len(), 2);
        assert!(node.read_commitment_cone_metadata(5).await.is_err());
    }

    #[test]
    fn test_fixture_commitment_decodes() {
        let codec = BincodeCodec::new();
        let raw = raw_commitment(&codec, 12);
        let commitment = codec
            .decode_commitment(&raw.data, &ProtocolParameters::default())
            .expect("decode");
        assert_eq!(commitment.slot, 12);
        assert_eq!(raw.commitment_id.slot(), 12);
    }

    #[test]
    fn test_fixture_outputs_have_distinct_ids() {
        let outputs = raw_transaction_outputs(&BincodeCodec::new(), 5, &[1, 2, 3], BlockId::empty());
        assert_eq!(outputs.len(), 3);
        assert_ne!(outputs[0].output_id, outputs[1].output_id);
        assert_eq!(outputs[2].output_id.index, 2);
        assert_eq!(outputs[0].output_id.slot(), 5);
    }
}
