//! In-memory execution client.
//!
//! Payload hashes are derived only from the parent hash and the payload attributes, so two
//! nodes on the same chain build identical payloads and can import each other's blocks.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

use alloy_primitives::{Bloom, keccak256};
use alloy_rpc_types_engine::{
    ExecutionPayloadV1, ForkchoiceState, ForkchoiceUpdated, PayloadAttributes, PayloadId,
    PayloadStatus, PayloadStatusEnum,
};
use async_trait::async_trait;
use clmock_execution::{EngineApi, EthRpc, ExecutionClient};
use clmock_types::{
    aliases::{B256, BlockNumber, BlockNumberOrTag, Bytes, TxHash, U256},
    engine_api::ExecutionBlock,
};
use color_eyre::{Result, eyre::eyre};

/// Genesis block shared by every node of a test network.
pub fn genesis_block(total_difficulty: U256) -> ExecutionBlock {
    ExecutionBlock {
        block_hash: keccak256(b"clmock-genesis"),
        block_number: 0,
        parent_hash: B256::ZERO,
        timestamp: 1_700_000_000,
        total_difficulty: Some(total_difficulty),
    }
}

#[derive(Default)]
struct Behaviour {
    /// Answer every `newPayload` with `INVALID` and never import.
    reject_payloads: bool,
    /// Fail every RPC call at the transport level.
    fail_rpc: bool,
    /// Answer build requests without a payload id.
    omit_payload_id: bool,
}

struct MockChain {
    canonical: BTreeMap<BlockNumber, ExecutionBlock>,
    executed: HashMap<B256, ExecutionPayloadV1>,
    built: HashMap<PayloadId, ExecutionPayloadV1>,
    next_payload_id: u64,
    behaviour: Behaviour,
    forkchoice_updates: Vec<ForkchoiceState>,
    new_payloads: Vec<B256>,
    sent_transactions: Vec<Bytes>,
}

impl MockChain {
    fn tip(&self) -> &ExecutionBlock {
        // The genesis block is inserted on construction and never removed.
        self.canonical.values().next_back().expect("mock chain always has a genesis block")
    }

    /// Makes `hash` the head if it is the tip or an executed child of the tip.
    fn set_head(&mut self, hash: B256) -> bool {
        if self.tip().block_hash == hash || self.canonical.values().any(|b| b.block_hash == hash) {
            return true;
        }
        let Some(payload) = self.executed.get(&hash) else { return false };
        if payload.parent_hash != self.tip().block_hash {
            return false;
        }
        let mut block = ExecutionBlock::from_payload(payload);
        block.total_difficulty = self.tip().total_difficulty;
        self.canonical.insert(block.block_number, block);
        true
    }

    fn build(&mut self, attrs: &PayloadAttributes) -> PayloadId {
        let parent = self.tip().clone();
        let block_number = parent.block_number + 1;

        let mut preimage = Vec::with_capacity(32 + 8 + 8 + 32 + 20);
        preimage.extend_from_slice(parent.block_hash.as_slice());
        preimage.extend_from_slice(&block_number.to_be_bytes());
        preimage.extend_from_slice(&attrs.timestamp.to_be_bytes());
        preimage.extend_from_slice(attrs.prev_randao.as_slice());
        preimage.extend_from_slice(attrs.suggested_fee_recipient.as_slice());

        let payload = ExecutionPayloadV1 {
            parent_hash: parent.block_hash,
            fee_recipient: attrs.suggested_fee_recipient,
            state_root: keccak256(parent.block_hash),
            receipts_root: B256::ZERO,
            logs_bloom: Bloom::ZERO,
            prev_randao: attrs.prev_randao,
            block_number,
            gas_limit: 30_000_000,
            gas_used: 0,
            timestamp: attrs.timestamp,
            extra_data: Bytes::new(),
            base_fee_per_gas: U256::from(7),
            block_hash: keccak256(&preimage),
            transactions: self.sent_transactions.clone(),
        };

        self.next_payload_id += 1;
        let id = PayloadId::new(self.next_payload_id.to_be_bytes());
        self.built.insert(id, payload);
        id
    }
}

/// An execution client double implementing both [`EngineApi`] and [`EthRpc`].
///
/// Clones share the same chain, so a test keeps one handle for inspection and hands another
/// to the mocker through [`MockExecutionNode::client`].
#[derive(Clone)]
pub struct MockExecutionNode {
    name: String,
    chain: Arc<Mutex<MockChain>>,
}

impl MockExecutionNode {
    pub fn new(name: impl Into<String>, genesis: ExecutionBlock) -> Self {
        let mut canonical = BTreeMap::new();
        canonical.insert(genesis.block_number, genesis);
        Self {
            name: name.into(),
            chain: Arc::new(Mutex::new(MockChain {
                canonical,
                executed: HashMap::new(),
                built: HashMap::new(),
                next_payload_id: 0,
                behaviour: Behaviour::default(),
                forkchoice_updates: Vec::new(),
                new_payloads: Vec::new(),
                sent_transactions: Vec::new(),
            })),
        }
    }

    /// A node on the shared test genesis reporting `total_difficulty` for its head.
    pub fn with_difficulty(name: impl Into<String>, total_difficulty: u64) -> Self {
        Self::new(name, genesis_block(U256::from(total_difficulty)))
    }

    /// A fresh capability handle backed by this node.
    pub fn client(&self) -> Arc<ExecutionClient> {
        Arc::new(ExecutionClient::from_parts(
            self.name.clone(),
            Arc::new(self.clone()),
            Arc::new(self.clone()),
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_reject_payloads(&self, reject: bool) {
        self.chain.lock().unwrap().behaviour.reject_payloads = reject;
    }

    pub fn set_fail_rpc(&self, fail: bool) {
        self.chain.lock().unwrap().behaviour.fail_rpc = fail;
    }

    pub fn set_omit_payload_id(&self, omit: bool) {
        self.chain.lock().unwrap().behaviour.omit_payload_id = omit;
    }

    /// Overrides the total difficulty reported for the current head.
    pub fn set_total_difficulty(&self, total_difficulty: u64) {
        let mut chain = self.chain.lock().unwrap();
        if let Some(tip) = chain.canonical.values_mut().next_back() {
            tip.total_difficulty = Some(U256::from(total_difficulty));
        }
    }

    pub fn head(&self) -> ExecutionBlock {
        self.chain.lock().unwrap().tip().clone()
    }

    pub fn block_at(&self, number: BlockNumber) -> Option<ExecutionBlock> {
        self.chain.lock().unwrap().canonical.get(&number).cloned()
    }

    pub fn forkchoice_updates(&self) -> Vec<ForkchoiceState> {
        self.chain.lock().unwrap().forkchoice_updates.clone()
    }

    pub fn new_payloads(&self) -> Vec<B256> {
        self.chain.lock().unwrap().new_payloads.clone()
    }

    pub fn sent_transactions(&self) -> Vec<Bytes> {
        self.chain.lock().unwrap().sent_transactions.clone()
    }

    fn check_rpc(&self) -> Result<()> {
        if self.chain.lock().unwrap().behaviour.fail_rpc {
            return Err(eyre!("{}: connection refused", self.name));
        }
        Ok(())
    }
}

#[async_trait]
impl EngineApi for MockExecutionNode {
    async fn forkchoice_updated(
        &self,
        state: ForkchoiceState,
        payload_attributes: Option<PayloadAttributes>,
    ) -> Result<ForkchoiceUpdated> {
        self.check_rpc()?;
        let mut chain = self.chain.lock().unwrap();
        chain.forkchoice_updates.push(state.clone());

        if !chain.set_head(state.head_block_hash) {
            return Ok(ForkchoiceUpdated {
                payload_status: PayloadStatus::from_status(PayloadStatusEnum::Syncing),
                payload_id: None,
            });
        }

        let payload_id = match payload_attributes {
            Some(attrs) => {
                let id = chain.build(&attrs);
                (!chain.behaviour.omit_payload_id).then_some(id)
            }
            None => None,
        };

        Ok(ForkchoiceUpdated {
            payload_status: PayloadStatus::new(
                PayloadStatusEnum::Valid,
                Some(state.head_block_hash),
            ),
            payload_id,
        })
    }

    async fn get_payload(&self, payload_id: PayloadId) -> Result<ExecutionPayloadV1> {
        self.check_rpc()?;
        self.chain
            .lock()
            .unwrap()
            .built
            .get(&payload_id)
            .cloned()
            .ok_or_else(|| eyre!("{}: unknown payload {payload_id:?}", self.name))
    }

    async fn new_payload(&self, payload: ExecutionPayloadV1) -> Result<PayloadStatus> {
        self.check_rpc()?;
        let mut chain = self.chain.lock().unwrap();
        chain.new_payloads.push(payload.block_hash);

        if chain.behaviour.reject_payloads {
            return Ok(PayloadStatus::from_status(PayloadStatusEnum::Invalid {
                validation_error: "rejected by test".to_string(),
            }));
        }
        if payload.parent_hash != chain.tip().block_hash &&
            !chain.executed.contains_key(&payload.parent_hash)
        {
            return Ok(PayloadStatus::from_status(PayloadStatusEnum::Syncing));
        }

        let hash = payload.block_hash;
        chain.executed.insert(hash, payload);
        Ok(PayloadStatus::new(PayloadStatusEnum::Valid, Some(hash)))
    }
}

#[async_trait]
impl EthRpc for MockExecutionNode {
    async fn block_number(&self) -> Result<BlockNumber> {
        self.check_rpc()?;
        Ok(self.chain.lock().unwrap().tip().block_number)
    }

    async fn get_block_by_number(
        &self,
        block_number: BlockNumberOrTag,
    ) -> Result<Option<ExecutionBlock>> {
        self.check_rpc()?;
        let chain = self.chain.lock().unwrap();
        Ok(match block_number {
            BlockNumberOrTag::Number(n) => chain.canonical.get(&n).cloned(),
            _ => Some(chain.tip().clone()),
        })
    }

    async fn send_raw_transaction(&self, tx: Bytes) -> Result<TxHash> {
        self.check_rpc()?;
        let hash = keccak256(&tx);
        self.chain.lock().unwrap().sent_transactions.push(tx);
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Address;

    use super::*;

    fn attrs(timestamp: u64) -> PayloadAttributes {
        PayloadAttributes {
            timestamp,
            prev_randao: B256::repeat_byte(9),
            suggested_fee_recipient: Address::ZERO,
            withdrawals: None,
            parent_beacon_block_root: None,
        }
    }

    fn fcs(hash: B256) -> ForkchoiceState {
        ForkchoiceState { head_block_hash: hash, safe_block_hash: hash, finalized_block_hash: hash }
    }

    #[tokio::test]
    async fn peers_build_identical_payloads_and_import_them() {
        let a = MockExecutionNode::with_difficulty("a", 0);
        let b = MockExecutionNode::with_difficulty("b", 0);
        let genesis = a.head().block_hash;

        let fa = a.forkchoice_updated(fcs(genesis), Some(attrs(5))).await.unwrap();
        let fb = b.forkchoice_updated(fcs(genesis), Some(attrs(5))).await.unwrap();
        let pa = a.get_payload(fa.payload_id.unwrap()).await.unwrap();
        let pb = b.get_payload(fb.payload_id.unwrap()).await.unwrap();
        assert_eq!(pa.block_hash, pb.block_hash);

        let status = b.new_payload(pa.clone()).await.unwrap();
        assert!(matches!(status.status, PayloadStatusEnum::Valid));
        assert_eq!(b.block_number().await.unwrap(), 0);

        b.forkchoice_updated(fcs(pa.block_hash), None).await.unwrap();
        assert_eq!(b.head().block_hash, pa.block_hash);
        assert_eq!(b.block_at(1).map(|blk| blk.block_hash), Some(pa.block_hash));
    }

    #[tokio::test]
    async fn rejecting_node_never_imports() {
        let a = MockExecutionNode::with_difficulty("a", 0);
        let genesis = a.head().block_hash;
        let built = a.forkchoice_updated(fcs(genesis), Some(attrs(5))).await.unwrap();
        let payload = a.get_payload(built.payload_id.unwrap()).await.unwrap();

        a.set_reject_payloads(true);
        let status = a.new_payload(payload.clone()).await.unwrap();
        assert!(matches!(status.status, PayloadStatusEnum::Invalid { .. }));

        let fcu = a.forkchoice_updated(fcs(payload.block_hash), None).await.unwrap();
        assert!(matches!(fcu.payload_status.status, PayloadStatusEnum::Syncing));
        assert_eq!(a.head().block_hash, genesis);
    }

    #[tokio::test]
    async fn failing_node_errors_at_transport_level() {
        let a = MockExecutionNode::with_difficulty("a", 0);
        a.set_fail_rpc(true);
        assert!(a.block_number().await.is_err());
        assert!(a.client().total_difficulty().await.is_err());
    }
}
