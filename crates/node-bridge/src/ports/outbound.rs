//! # Outbound Ports
//!
//! Traits for the external collaborators of the bridge: the node's RPC
//! interface and the binary codec of ledger objects.

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use shared_types::{
    AccountInfoRequest, ApiRouteRequest, Block, BlockId, BlockMetadata, CommitmentRequest,
    LedgerUpdateRecord, OutputId, OutputIdProof, ProtocolParameters, RawAcceptedTransaction,
    RawBlock, RawBlockMessage, RawCommitment, RawNodeStatus, RawOutputResponse, RpcStatus,
    SlotCommitment, SlotIndex, SlotRangeRequest, Tips, TransactionId, TransactionMetadata,
    TransactionOutput,
};

/// Result of a call on the node, carrying the node's status on failure.
pub type RpcResult<T> = std::result::Result<T, RpcStatus>;

/// Server-streaming response. Ends with `None` on orderly end-of-stream.
pub type RpcStream<T> = BoxStream<'static, RpcResult<T>>;

/// Node extension interface - outbound port.
///
/// Unary calls and server streams exposed by the node. Implementations share
/// one connection and must be usable from any number of tasks at once.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Fetch the current node status.
    async fn read_node_status(&self) -> RpcResult<RawNodeStatus>;

    /// Stream node status updates, at most one per `cooldown_ms`.
    async fn listen_to_node_status(&self, cooldown_ms: u32) -> RpcResult<RpcStream<RawNodeStatus>>;

    /// Stream ledger update records for a slot range.
    async fn listen_to_ledger_updates(
        &self,
        range: SlotRangeRequest,
    ) -> RpcResult<RpcStream<LedgerUpdateRecord>>;

    /// Stream transactions as they get accepted.
    async fn listen_to_accepted_transactions(&self)
        -> RpcResult<RpcStream<RawAcceptedTransaction>>;

    /// Stream metadata of blocks as they get accepted or confirmed.
    async fn listen_to_accepted_blocks(&self) -> RpcResult<RpcStream<BlockMetadata>>;

    /// Fetch the metadata of a block. `NotFound` if the node does not know it.
    async fn read_block_metadata(&self, block_id: BlockId) -> RpcResult<BlockMetadata>;

    /// Read an encoded block. `NotFound` if the node does not know it.
    async fn read_block(&self, block_id: BlockId) -> RpcResult<RawBlock>;

    /// Stream every block the node attaches.
    async fn listen_to_blocks(&self) -> RpcResult<RpcStream<RawBlockMessage>>;

    /// Submit an encoded block, returning its ID.
    async fn submit_block(&self, block: RawBlock) -> RpcResult<BlockId>;

    /// Read an output and its spend state.
    async fn read_output(&self, output_id: OutputId) -> RpcResult<RawOutputResponse>;

    /// Read a commitment by slot or by ID.
    async fn read_commitment(&self, request: CommitmentRequest) -> RpcResult<RawCommitment>;

    /// Stream the metadata of every block in the past cone of a slot's
    /// commitment.
    async fn read_commitment_cone_metadata(
        &self,
        slot: SlotIndex,
    ) -> RpcResult<RpcStream<BlockMetadata>>;

    /// Fetch the metadata of a transaction.
    async fn read_transaction_metadata(
        &self,
        transaction_id: TransactionId,
    ) -> RpcResult<TransactionMetadata>;

    /// Whether the account is a committee candidate at the slot.
    async fn read_is_candidate(&self, request: AccountInfoRequest) -> RpcResult<bool>;

    /// Whether the account is a committee member at the slot.
    async fn read_is_committee_member(&self, request: AccountInfoRequest) -> RpcResult<bool>;

    /// Whether the account is registered as a validator at the slot.
    async fn read_is_validator_account(&self, request: AccountInfoRequest) -> RpcResult<bool>;

    /// Expose a plugin route through the node's API.
    async fn register_api_route(&self, request: ApiRouteRequest) -> RpcResult<()>;

    /// Remove a plugin route. Only `route` is read from the request.
    async fn unregister_api_route(&self, request: ApiRouteRequest) -> RpcResult<()>;

    /// Ask the node for tips to reference as parents.
    async fn request_tips(&self, count: u32) -> RpcResult<Tips>;

    /// Routes currently exposed by the node's API.
    async fn read_node_routes(&self) -> RpcResult<Vec<String>>;
}

/// Ledger object codec - outbound port.
///
/// Decoding takes the protocol parameters in effect for the object's slot.
pub trait LedgerCodec: Send + Sync {
    /// Decode a protocol parameters blob. The version tag is checked by the
    /// caller before this is invoked.
    fn decode_protocol_parameters(&self, data: &[u8]) -> Result<ProtocolParameters>;

    /// Decode a slot commitment.
    fn decode_commitment(&self, data: &[u8], api: &ProtocolParameters) -> Result<SlotCommitment>;

    /// Decode a transaction output.
    fn decode_output(&self, data: &[u8], api: &ProtocolParameters) -> Result<TransactionOutput>;

    /// Encode a transaction output.
    fn encode_output(&self, output: &TransactionOutput, api: &ProtocolParameters)
        -> Result<Vec<u8>>;

    /// Decode an output identity proof.
    fn decode_output_id_proof(&self, data: &[u8], api: &ProtocolParameters)
        -> Result<OutputIdProof>;

    /// Derive the ID `proof` binds `output` to.
    fn derive_output_id(
        &self,
        proof: &OutputIdProof,
        output: &TransactionOutput,
        api: &ProtocolParameters,
    ) -> Result<OutputId>;

    /// Encode a block. The encoding must end with the nonce as eight
    /// little-endian bytes.
    fn encode_block(&self, block: &Block, api: &ProtocolParameters) -> Result<Vec<u8>>;

    /// Decode a block.
    fn decode_block(&self, data: &[u8], api: &ProtocolParameters) -> Result<Block>;
}
