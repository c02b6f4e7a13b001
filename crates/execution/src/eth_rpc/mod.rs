pub mod client;

use async_trait::async_trait;
use clmock_types::{
    aliases::{BlockNumber, BlockNumberOrTag, Bytes, TxHash},
    engine_api::ExecutionBlock,
};
use color_eyre::eyre;

/// The subset of the standard Ethereum JSON-RPC API the mocker needs.
#[async_trait]
pub trait EthRpc: Send + Sync {
    /// Corresponds to the `eth_blockNumber` RPC method.
    async fn block_number(&self) -> eyre::Result<BlockNumber>;

    /// Corresponds to the `eth_getBlockByNumber` RPC method, without transaction bodies.
    /// Returns `None` when the client does not know the block.
    async fn get_block_by_number(
        &self,
        block_number: BlockNumberOrTag,
    ) -> eyre::Result<Option<ExecutionBlock>>;

    /// Corresponds to the `eth_sendRawTransaction` RPC method.
    async fn send_raw_transaction(&self, tx: Bytes) -> eyre::Result<TxHash>;
}
