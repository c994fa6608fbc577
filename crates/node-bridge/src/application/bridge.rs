//! # Node Bridge
//!
//! Facade over one node connection: owns the status cache, runs the node
//! status listener and exposes the ledger streams and unary calls with their
//! payloads decoded and verified.

use super::stream::listen_to_stream;
use super::tangle_listener::TangleListener;
use crate::config::BridgeConfig;
use crate::domain::status::decode_commitment;
use crate::domain::{
    do_pow, protocol_parameters_from_raw, unwrap_accepted_transaction, unwrap_output,
    AcceptedTransaction, BatchContext, BridgeEvents, Commitment, LedgerUpdate,
    LedgerUpdateAssembler, NodeStatus, Output, StatusCache, TipRefresher,
};
use crate::error::{BridgeError, Result};
use crate::ports::{LedgerCodec, NodeClient};
use async_trait::async_trait;
use shared_types::{
    AccountId, AccountInfoRequest, ApiRouteRequest, Block, BlockId, BlockMetadata, CommitmentId,
    CommitmentRequest, OutputId, OutputState, ProtocolParameters, RawBlock, SlotIndex,
    SlotRangeRequest, Tips, TransactionId, TransactionMetadata,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Client-side view of a connected node.
pub struct NodeBridge {
    client: Arc<dyn NodeClient>,
    codec: Arc<dyn LedgerCodec>,
    config: BridgeConfig,
    status: Arc<StatusCache>,
}

impl NodeBridge {
    /// Read the node's status and check that the bridge can talk to it.
    ///
    /// Fails if the protocol parameters have an unsupported version or the
    /// node runs another network than `config.target_network_name`.
    pub async fn connect(
        client: Arc<dyn NodeClient>,
        codec: Arc<dyn LedgerCodec>,
        config: BridgeConfig,
    ) -> Result<Self> {
        info!(address = %config.address, "Reading node status ...");
        let raw = client.read_node_status().await?;

        let params = protocol_parameters_from_raw(codec.as_ref(), &raw.current_protocol_parameters)?;
        if let Some(target) = config
            .target_network_name
            .as_deref()
            .filter(|target| !target.is_empty())
        {
            if target != params.network_name {
                return Err(BridgeError::NetworkNameMismatch {
                    network_name: params.network_name,
                    target: target.to_string(),
                });
            }
        }

        let status = Arc::new(StatusCache::new(codec.clone()));
        status.apply_incoming_status(raw)?;

        info!(
            network = %params.network_name,
            protocol_version = params.version,
            "Connected to node"
        );

        Ok(Self {
            client,
            codec,
            config,
            status,
        })
    }

    /// Listen to node status updates until `cancel` fires or the stream ends.
    ///
    /// Updates the cache rejects are logged and skipped.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        let stream = self
            .client
            .listen_to_node_status(self.config.status_cooldown_ms)
            .await?;
        info!(cooldown_ms = self.config.status_cooldown_ms, "Listening to node status");

        let result = listen_to_stream(cancel, stream, |raw| {
            if let Err(e) = self.status.apply_incoming_status(raw) {
                warn!(error = %e, "Skipping node status update");
            }
            Ok(())
        })
        .await;
        logged("node status", result)
    }

    /// Node client.
    pub fn client(&self) -> &Arc<dyn NodeClient> {
        &self.client
    }

    /// Ledger codec.
    pub fn codec(&self) -> &Arc<dyn LedgerCodec> {
        &self.codec
    }

    /// Bridge configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Status cache.
    pub fn status_cache(&self) -> &Arc<StatusCache> {
        &self.status
    }

    /// Events triggered on commitment progress.
    pub fn events(&self) -> &BridgeEvents {
        self.status.events()
    }

    /// Create an acceptance registry on this connection.
    pub fn tangle_listener(&self) -> TangleListener {
        TangleListener::new(self.client.clone(), self.status.clone())
    }

    // -------------------------------------------------------------------------
    // Status
    // -------------------------------------------------------------------------

    /// Current node status snapshot.
    pub fn node_status(&self) -> Option<NodeStatus> {
        self.status.status()
    }

    /// Whether the node reported itself healthy in the last snapshot.
    pub fn is_node_healthy(&self) -> bool {
        self.status.status().is_some_and(|status| status.is_healthy)
    }

    /// Latest commitment.
    pub fn latest_commitment(&self) -> Option<Commitment> {
        self.status.latest_commitment()
    }

    /// Latest finalized commitment.
    pub fn latest_finalized_commitment(&self) -> Option<Commitment> {
        self.status.latest_finalized_commitment()
    }

    /// Slot of the latest commitment, 0 if none is known.
    pub fn latest_committed_slot(&self) -> SlotIndex {
        self.latest_commitment().map_or(0, |c| c.slot())
    }

    /// Slot of the latest finalized commitment, 0 if none is known.
    pub fn latest_finalized_slot(&self) -> SlotIndex {
        self.latest_finalized_commitment().map_or(0, |c| c.slot())
    }

    /// Protocol parameters currently in effect.
    pub fn protocol_parameters(&self) -> Result<Arc<ProtocolParameters>> {
        self.status
            .protocol_parameters()
            .ok_or(BridgeError::StatusUnavailable)
    }

    /// Protocol parameters to decode objects of `slot` with.
    pub fn api_for_slot(&self, slot: SlotIndex) -> Result<Arc<ProtocolParameters>> {
        self.status.api_for_slot(slot)
    }

    // -------------------------------------------------------------------------
    // Ledger streams
    // -------------------------------------------------------------------------

    /// Stream complete ledger updates for `start_slot..=end_slot` to
    /// `consumer`. An `end_slot` of 0 follows the ledger indefinitely.
    ///
    /// Aborts on the first malformed batch or failing output proof.
    pub async fn listen_to_ledger_updates<F>(
        &self,
        cancel: &CancellationToken,
        start_slot: SlotIndex,
        end_slot: SlotIndex,
        mut consumer: F,
    ) -> Result<()>
    where
        F: FnMut(LedgerUpdate) -> Result<()>,
    {
        let stream = self
            .client
            .listen_to_ledger_updates(SlotRangeRequest {
                start_slot,
                end_slot,
            })
            .await?;
        info!(start_slot, end_slot, "Listening to ledger updates");

        let ctx: &StatusCache = &self.status;
        let mut assembler = LedgerUpdateAssembler::new(self.codec.clone());

        let result = listen_to_stream(cancel, stream, |record| {
            if let Some(update) = assembler.process(record, ctx)? {
                debug!(
                    commitment_id = %update.commitment_id,
                    consumed = update.consumed.len(),
                    created = update.created.len(),
                    "Ledger update complete"
                );
                consumer(update)?;
            }
            Ok(())
        })
        .await;
        logged("ledger updates", result)
    }

    /// Stream accepted transactions with their outputs verified.
    pub async fn listen_to_accepted_transactions<F>(
        &self,
        cancel: &CancellationToken,
        mut consumer: F,
    ) -> Result<()>
    where
        F: FnMut(AcceptedTransaction) -> Result<()>,
    {
        let stream = self.client.listen_to_accepted_transactions().await?;
        info!("Listening to accepted transactions");

        let result = listen_to_stream(cancel, stream, |raw| {
            let transaction =
                unwrap_accepted_transaction(self.codec.as_ref(), &*self.status, raw)?;
            consumer(transaction)
        })
        .await;
        logged("accepted transactions", result)
    }

    /// Stream every block the node attaches, decoded.
    ///
    /// Aborts on the first block that fails to decode.
    pub async fn listen_to_blocks<F>(&self, cancel: &CancellationToken, mut consumer: F) -> Result<()>
    where
        F: FnMut(BlockId, Block) -> Result<()>,
    {
        let stream = self.client.listen_to_blocks().await?;
        info!("Listening to blocks");

        let result = listen_to_stream(cancel, stream, |message| {
            let api = self.api_for_slot(message.block_id.slot())?;
            let block = self.codec.decode_block(&message.block.data, &api)?;
            consumer(message.block_id, block)
        })
        .await;
        logged("blocks", result)
    }

    /// Stream the metadata of every block in the past cone of the commitment
    /// of `slot`. Returns once the cone is exhausted.
    pub async fn commitment_cone_metadata<F>(
        &self,
        cancel: &CancellationToken,
        slot: SlotIndex,
        consumer: F,
    ) -> Result<()>
    where
        F: FnMut(BlockMetadata) -> Result<()>,
    {
        let stream = self.client.read_commitment_cone_metadata(slot).await?;
        debug!(slot, "Reading commitment cone metadata");

        let result = listen_to_stream(cancel, stream, consumer).await;
        logged("commitment cone metadata", result)
    }

    // -------------------------------------------------------------------------
    // Unary calls
    // -------------------------------------------------------------------------

    /// Encode and submit a block.
    pub async fn submit_block(&self, block: &Block) -> Result<BlockId> {
        let api = self.protocol_parameters()?;
        let data = self.codec.encode_block(block, &api)?;
        let block_id = self.client.submit_block(RawBlock { data }).await?;
        debug!(%block_id, "Block submitted");
        Ok(block_id)
    }

    /// Metadata of a block.
    pub async fn block_metadata(&self, block_id: BlockId) -> Result<BlockMetadata> {
        Ok(self.client.read_block_metadata(block_id).await?)
    }

    /// Read and decode a block.
    pub async fn block(&self, block_id: BlockId) -> Result<Block> {
        let raw = self.client.read_block(block_id).await?;
        let api = self.api_for_slot(block_id.slot())?;
        self.codec.decode_block(&raw.data, &api)
    }

    /// Metadata of a transaction.
    pub async fn transaction_metadata(
        &self,
        transaction_id: TransactionId,
    ) -> Result<TransactionMetadata> {
        Ok(self.client.read_transaction_metadata(transaction_id).await?)
    }

    /// Whether the account is a committee candidate at `slot`.
    pub async fn is_candidate(&self, account_id: AccountId, slot: SlotIndex) -> Result<bool> {
        let request = AccountInfoRequest { account_id, slot };
        Ok(self.client.read_is_candidate(request).await?)
    }

    /// Whether the account is a committee member at `slot`.
    pub async fn is_committee_member(&self, account_id: AccountId, slot: SlotIndex) -> Result<bool> {
        let request = AccountInfoRequest { account_id, slot };
        Ok(self.client.read_is_committee_member(request).await?)
    }

    /// Whether the account is registered as a validator at `slot`.
    pub async fn is_validator_account(&self, account_id: AccountId, slot: SlotIndex) -> Result<bool> {
        let request = AccountInfoRequest { account_id, slot };
        Ok(self.client.read_is_validator_account(request).await?)
    }

    /// Read an output and verify it is the one requested.
    pub async fn output(&self, output_id: OutputId) -> Result<Output> {
        let response = self.client.read_output(output_id).await?;
        let api = self.api_for_slot(output_id.slot())?;

        let output = match &response.state {
            OutputState::Unspent(raw) => unwrap_output(
                self.codec.as_ref(),
                &api,
                raw,
                None,
                response.latest_commitment_id,
            )?,
            OutputState::Spent(spent) => unwrap_output(
                self.codec.as_ref(),
                &api,
                &spent.output,
                Some(spent),
                response.latest_commitment_id,
            )?,
        };

        if output.output_id != output_id {
            return Err(BridgeError::OutputIdMismatch {
                expected: output_id,
                derived: output.output_id,
            });
        }
        Ok(output)
    }

    /// Commitment of `slot`.
    pub async fn commitment_by_slot(&self, slot: SlotIndex) -> Result<Commitment> {
        self.commitment(CommitmentRequest::BySlot(slot)).await
    }

    /// Commitment with ID `commitment_id`.
    pub async fn commitment_by_id(&self, commitment_id: CommitmentId) -> Result<Commitment> {
        self.commitment(CommitmentRequest::ById(commitment_id)).await
    }

    async fn commitment(&self, request: CommitmentRequest) -> Result<Commitment> {
        let raw = self.client.read_commitment(request).await?;
        let api = self.api_for_slot(raw.commitment_id.slot())?;
        decode_commitment(self.codec.as_ref(), &raw, &api)
    }

    /// Tips to reference as parents of a new block.
    pub async fn request_tips(&self, count: u32) -> Result<Tips> {
        Ok(self.client.request_tips(count).await?)
    }

    /// Expose `route` through the node's API, proxied to `bind_address`
    /// (`host:port`) under `path`.
    pub async fn register_api_route(&self, route: &str, bind_address: &str, path: &str) -> Result<()> {
        let (host, port) = parse_bind_address(bind_address)?;
        self.client
            .register_api_route(ApiRouteRequest {
                route: route.to_string(),
                host,
                port,
                path: path.to_string(),
            })
            .await?;
        info!(route, bind_address, "Registered API route");
        Ok(())
    }

    /// Remove a route registered with `register_api_route`.
    pub async fn unregister_api_route(&self, route: &str) -> Result<()> {
        self.client
            .unregister_api_route(ApiRouteRequest {
                route: route.to_string(),
                ..ApiRouteRequest::default()
            })
            .await?;
        info!(route, "Unregistered API route");
        Ok(())
    }

    /// Wait until the node exposes `route`, checking every
    /// `capability_retry_interval_ms`.
    pub async fn wait_for_route(&self, cancel: &CancellationToken, route: &str) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Err(BridgeError::OperationAborted);
            }

            match self.check_route(route).await {
                Err(BridgeError::NotAvailable(_)) => {
                    debug!(route, "Route not available yet");
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(BridgeError::OperationAborted),
                        _ = tokio::time::sleep(self.config.capability_retry_interval()) => {}
                    }
                }
                result => return result,
            }
        }
    }

    async fn check_route(&self, route: &str) -> Result<()> {
        let routes = self.client.read_node_routes().await?;
        if routes.iter().any(|exposed| exposed == route) {
            Ok(())
        } else {
            Err(BridgeError::NotAvailable(route.to_string()))
        }
    }

    // -------------------------------------------------------------------------
    // PoW
    // -------------------------------------------------------------------------

    /// Do the PoW the current protocol parameters require on `block`,
    /// refreshing its parents from the node's tips when the search runs long.
    ///
    /// Returns the size of the encoded block.
    pub async fn mine_block(&self, cancel: &CancellationToken, block: &mut Block) -> Result<usize> {
        let api = self.protocol_parameters()?;
        let refresher: &dyn TipRefresher = self;

        do_pow(
            cancel,
            block,
            self.codec.as_ref(),
            &api,
            self.config.pow.parallelism,
            self.config.pow.refresh_tips_interval(),
            Some(refresher),
        )
        .await
    }
}

#[async_trait]
impl TipRefresher for NodeBridge {
    async fn refresh_tips(&self) -> Result<Vec<BlockId>> {
        let tips = self.request_tips(self.config.pow.tips_count).await?;
        Ok(tips.strong)
    }
}

/// Log a listener that stopped on an error.
fn logged(stream: &'static str, result: Result<()>) -> Result<()> {
    if let Err(e) = &result {
        error!(stream, error = %e, "Error listening to stream");
    }
    result
}

/// Split `host:port`.
fn parse_bind_address(bind_address: &str) -> Result<(String, u32)> {
    let parts: Vec<&str> = bind_address.split(':').collect();
    let [host, port] = parts.as_slice() else {
        return Err(BridgeError::InvalidBindAddress(bind_address.to_string()));
    };

    let port = port
        .parse::<u32>()
        .map_err(|_| BridgeError::InvalidBindAddress(bind_address.to_string()))?;
    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::codec::BincodeCodec;
    use crate::adapters::mock::{
        begin_marker, raw_commitment, raw_transaction_outputs, AccountRole, MockNodeClient,
    };
    use shared_types::{
        BlockState, RawBlockMessage, RawOutputResponse, RawSpent, TransactionState,
    };
    use std::time::Duration;

    async fn connect(node: Arc<MockNodeClient>, config: BridgeConfig) -> Result<NodeBridge> {
        NodeBridge::connect(node, Arc::new(BincodeCodec::new()), config).await
    }

    #[test]
    fn test_parse_bind_address() {
        assert_eq!(
            parse_bind_address("localhost:9091").expect("valid"),
            ("localhost".to_string(), 9091)
        );
        assert!(parse_bind_address("localhost").is_err());
        assert!(parse_bind_address("a:b:c").is_err());
        assert!(matches!(
            parse_bind_address("localhost:http"),
            Err(BridgeError::InvalidBindAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_reads_status() {
        let node = Arc::new(MockNodeClient::with_status(20, 18));
        let bridge = connect(node, BridgeConfig::for_testing())
            .await
            .expect("connect");

        assert!(bridge.is_node_healthy());
        assert_eq!(bridge.latest_committed_slot(), 20);
        assert_eq!(bridge.latest_finalized_slot(), 18);
        assert_eq!(bridge.protocol_parameters().expect("params").version, 3);
    }

    #[tokio::test]
    async fn test_connect_checks_network_name() {
        let node = Arc::new(MockNodeClient::with_status(1, 1));
        let config = BridgeConfig {
            target_network_name: Some("mainnet".into()),
            ..BridgeConfig::for_testing()
        };

        let err = connect(node, config).await.err().expect("mismatch");
        assert!(matches!(err, BridgeError::NetworkNameMismatch { .. }));
    }

    #[tokio::test]
    async fn test_connect_without_status_fails() {
        let node = Arc::new(MockNodeClient::new());
        let err = connect(node, BridgeConfig::for_testing())
            .await
            .err()
            .expect("no status");
        assert!(matches!(err, BridgeError::Rpc(_)));
    }

    #[tokio::test]
    async fn test_run_skips_bad_updates() {
        let node = Arc::new(MockNodeClient::with_status(10, 8));
        let bridge = connect(node.clone(), BridgeConfig::for_testing())
            .await
            .expect("connect");
        let codec = BincodeCodec::new();

        let mut skewed = crate::adapters::mock::raw_node_status(&codec, 11, 9);
        skewed.current_protocol_parameters.protocol_version = 99;
        node.node_status().send(skewed);
        node.node_status()
            .send(crate::adapters::mock::raw_node_status(&codec, 12, 10));
        node.node_status().close();

        bridge
            .run(&CancellationToken::new())
            .await
            .expect("stream end is clean");
        assert_eq!(bridge.latest_committed_slot(), 12);
        assert_eq!(node.status_cooldown_ms(), Some(10));
    }

    #[tokio::test]
    async fn test_output_verified_against_request() {
        let node = Arc::new(MockNodeClient::with_status(10, 8));
        let codec = BincodeCodec::new();
        let outputs = raw_transaction_outputs(&codec, 9, &[10, 20], BlockId::empty());

        node.insert_output(
            outputs[0].output_id,
            RawOutputResponse {
                latest_commitment_id: CommitmentId::new([1; 32], 10),
                state: OutputState::Unspent(outputs[0].clone()),
            },
        );
        node.insert_output(
            outputs[1].output_id,
            RawOutputResponse {
                latest_commitment_id: CommitmentId::new([1; 32], 10),
                state: OutputState::Spent(RawSpent {
                    output: outputs[0].clone(),
                    transaction_id_spent: TransactionId::new([2; 32], 10),
                    slot_spent: 10,
                    commitment_id_spent: None,
                }),
            },
        );

        let bridge = connect(node, BridgeConfig::for_testing())
            .await
            .expect("connect");

        let output = bridge.output(outputs[0].output_id).await.expect("output");
        assert_eq!(output.output.amount, 10);
        assert_eq!(output.metadata.latest_commitment_id.slot(), 10);

        let err = bridge.output(outputs[1].output_id).await.expect_err("wrong output");
        assert!(matches!(err, BridgeError::OutputIdMismatch { .. }));
    }

    #[tokio::test]
    async fn test_commitment_lookup() {
        let node = Arc::new(MockNodeClient::with_status(10, 8));
        let codec = BincodeCodec::new();
        let raw = raw_commitment(&codec, 7);
        node.insert_commitment(raw.clone());

        let bridge = connect(node, BridgeConfig::for_testing())
            .await
            .expect("connect");

        let by_slot = bridge.commitment_by_slot(7).await.expect("by slot");
        let by_id = bridge
            .commitment_by_id(raw.commitment_id)
            .await
            .expect("by id");
        assert_eq!(by_slot, by_id);
        assert_eq!(by_slot.commitment.slot, 7);

        let err = bridge.commitment_by_slot(6).await.expect_err("unknown");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_register_api_route() {
        let node = Arc::new(MockNodeClient::with_status(1, 1));
        let bridge = connect(node.clone(), BridgeConfig::for_testing())
            .await
            .expect("connect");

        bridge
            .register_api_route("indexer/v2", "0.0.0.0:9091", "/api")
            .await
            .expect("register");
        let registered = node.registered_routes();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].host, "0.0.0.0");
        assert_eq!(registered[0].port, 9091);
        assert_eq!(registered[0].path, "/api");

        let err = bridge
            .register_api_route("mqtt/v2", "nope", "")
            .await
            .expect_err("bad address");
        assert!(matches!(err, BridgeError::InvalidBindAddress(_)));

        bridge
            .unregister_api_route("indexer/v2")
            .await
            .expect("unregister");
        assert!(node.registered_routes().is_empty());
    }

    #[tokio::test]
    async fn test_wait_for_route_retries() {
        let node = Arc::new(MockNodeClient::with_status(1, 1));
        let bridge = connect(node.clone(), BridgeConfig::for_testing())
            .await
            .expect("connect");

        let exposer = {
            let node = node.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(35)).await;
                node.add_route("indexer/v2");
            })
        };

        bridge
            .wait_for_route(&CancellationToken::new(), "indexer/v2")
            .await
            .expect("route appears");
        assert!(node.route_reads() >= 2);
        exposer.await.expect("join");
    }

    #[tokio::test]
    async fn test_wait_for_route_aborts_on_cancel() {
        let node = Arc::new(MockNodeClient::with_status(1, 1));
        let bridge = connect(node, BridgeConfig::for_testing())
            .await
            .expect("connect");

        let cancel = CancellationToken::new();
        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(25)).await;
                cancel.cancel();
            })
        };

        let err = bridge
            .wait_for_route(&cancel, "mqtt/v2")
            .await
            .expect_err("cancelled");
        assert!(matches!(err, BridgeError::OperationAborted));
        canceller.await.expect("join");
    }

    fn encoded_block(codec: &BincodeCodec, nonce: u64) -> (Block, RawBlock) {
        let block = Block {
            strong_parents: vec![BlockId::new([6; 32], 9)],
            nonce,
            ..Block::default()
        };
        let data = codec
            .encode_block(&block, &ProtocolParameters::default())
            .expect("encode");
        (block, RawBlock { data })
    }

    #[tokio::test]
    async fn test_block_read_and_decoded() {
        let node = Arc::new(MockNodeClient::with_status(10, 8));
        let (block, raw) = encoded_block(&BincodeCodec::new(), 42);
        let block_id = BlockId::new([5; 32], 9);
        node.insert_block(block_id, raw);

        let bridge = connect(node, BridgeConfig::for_testing())
            .await
            .expect("connect");

        assert_eq!(bridge.block(block_id).await.expect("block"), block);
        let err = bridge
            .block(BlockId::new([1; 32], 9))
            .await
            .expect_err("unknown");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_listen_to_blocks_decodes_in_order() {
        let node = Arc::new(MockNodeClient::with_status(10, 8));
        let codec = BincodeCodec::new();
        for nonce in 1..=3u64 {
            let (_, block) = encoded_block(&codec, nonce);
            node.blocks().send(RawBlockMessage {
                block_id: BlockId::new([nonce as u8; 32], 9),
                block,
            });
        }
        node.blocks().close();

        let bridge = connect(node, BridgeConfig::for_testing())
            .await
            .expect("connect");

        let mut nonces = Vec::new();
        bridge
            .listen_to_blocks(&CancellationToken::new(), |_, block| {
                nonces.push(block.nonce);
                Ok(())
            })
            .await
            .expect("stream end is clean");
        assert_eq!(nonces, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_listen_to_blocks_aborts_on_garbage() {
        let node = Arc::new(MockNodeClient::with_status(10, 8));
        let codec = BincodeCodec::new();
        node.blocks().send(RawBlockMessage {
            block_id: BlockId::new([1; 32], 9),
            block: RawBlock { data: vec![0xFF] },
        });
        let (_, block) = encoded_block(&codec, 2);
        node.blocks().send(RawBlockMessage {
            block_id: BlockId::new([2; 32], 9),
            block,
        });

        let bridge = connect(node, BridgeConfig::for_testing())
            .await
            .expect("connect");

        let mut seen = 0;
        let err = bridge
            .listen_to_blocks(&CancellationToken::new(), |_, _| {
                seen += 1;
                Ok(())
            })
            .await
            .expect_err("undecodable block");
        assert!(matches!(err, BridgeError::Decode(_)));
        assert_eq!(seen, 0);
    }

    #[tokio::test]
    async fn test_commitment_cone_metadata() {
        let node = Arc::new(MockNodeClient::with_status(10, 8));
        let cone: Vec<BlockMetadata> = (1..=3u8)
            .map(|n| BlockMetadata {
                block_id: BlockId::new([n; 32], 7),
                block_state: BlockState::Confirmed,
                block_failure_reason: None,
            })
            .collect();
        node.set_commitment_cone(7, cone.clone());

        let bridge = connect(node, BridgeConfig::for_testing())
            .await
            .expect("connect");

        let mut seen = Vec::new();
        bridge
            .commitment_cone_metadata(&CancellationToken::new(), 7, |metadata| {
                seen.push(metadata);
                Ok(())
            })
            .await
            .expect("cone exhausted");
        assert_eq!(seen, cone);

        let err = bridge
            .commitment_cone_metadata(&CancellationToken::new(), 8, |_| Ok(()))
            .await
            .expect_err("unknown slot");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_transaction_metadata() {
        let node = Arc::new(MockNodeClient::with_status(10, 8));
        let transaction_id = TransactionId::new([3; 32], 9);
        node.insert_transaction_metadata(TransactionMetadata {
            transaction_id,
            transaction_state: TransactionState::Accepted,
            earliest_attachment_slot: 9,
            transaction_failure_reason: None,
        });

        let bridge = connect(node, BridgeConfig::for_testing())
            .await
            .expect("connect");

        let metadata = bridge
            .transaction_metadata(transaction_id)
            .await
            .expect("metadata");
        assert_eq!(metadata.transaction_state, TransactionState::Accepted);
        assert_eq!(metadata.earliest_attachment_slot, 9);
        assert!(bridge
            .transaction_metadata(TransactionId::new([4; 32], 9))
            .await
            .expect_err("unknown")
            .is_not_found());
    }

    #[tokio::test]
    async fn test_account_roles() {
        let node = Arc::new(MockNodeClient::with_status(10, 8));
        let account_id = AccountId([8; 32]);
        let at = |slot| AccountInfoRequest { account_id, slot };
        node.grant_account_role(at(10), AccountRole::Candidate);
        node.grant_account_role(at(10), AccountRole::Validator);
        node.grant_account_role(at(11), AccountRole::CommitteeMember);

        let bridge = connect(node, BridgeConfig::for_testing())
            .await
            .expect("connect");

        assert!(bridge.is_candidate(account_id, 10).await.expect("candidate"));
        assert!(bridge.is_validator_account(account_id, 10).await.expect("validator"));
        assert!(!bridge.is_committee_member(account_id, 10).await.expect("member"));
        assert!(bridge.is_committee_member(account_id, 11).await.expect("member"));
        assert!(!bridge.is_candidate(AccountId([9; 32]), 10).await.expect("candidate"));
    }

    #[tokio::test]
    async fn test_ledger_listener_error_returned() {
        let node = Arc::new(MockNodeClient::with_status(10, 8));
        let commitment_id = CommitmentId::new([1; 32], 9);
        node.ledger_updates().send(begin_marker(commitment_id, 0, 0));
        node.ledger_updates().send(begin_marker(commitment_id, 0, 0));

        let bridge = connect(node, BridgeConfig::for_testing())
            .await
            .expect("connect");

        let err = bridge
            .listen_to_ledger_updates(&CancellationToken::new(), 9, 0, |_| Ok(()))
            .await
            .expect_err("double begin");
        assert!(matches!(err, BridgeError::LedgerUpdateAlreadyInProgress));
    }

    #[tokio::test]
    async fn test_mine_block_fetches_parents() {
        let node = Arc::new(MockNodeClient::with_status(1, 1));
        node.set_tips(Tips {
            strong: vec![BlockId::new([4; 32], 1)],
            ..Tips::default()
        });
        let bridge = connect(node.clone(), BridgeConfig::for_testing())
            .await
            .expect("connect");

        let mut block = Block::default();
        let size = bridge
            .mine_block(&CancellationToken::new(), &mut block)
            .await
            .expect("pow disabled");

        assert_eq!(block.nonce, 0);
        assert_eq!(block.strong_parents, vec![BlockId::new([4; 32], 1)]);
        assert_eq!(node.tips_requests(), 1);

        let block_id = bridge.submit_block(&block).await.expect("submit");
        assert!(!block_id.is_empty());
        assert_eq!(node.submitted_blocks()[0].data.len(), size);
    }
}
