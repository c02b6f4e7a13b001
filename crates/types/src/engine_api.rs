use alloy_rpc_types_engine::{ExecutionPayloadV1, ForkchoiceState, PayloadStatusEnum};
use serde::{Deserialize, Serialize};

use crate::aliases::{BlockHash, BlockNumber, BlockTimestamp, U256};

/// The subset of an `eth_getBlockByNumber` response the mocker relies on.
///
/// Only the fields needed to compare a client's view of the chain against the
/// mocker's finalized tip are kept; everything else in the RPC object is ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionBlock {
    #[serde(rename = "hash")]
    pub block_hash: BlockHash,
    #[serde(rename = "number", with = "alloy_serde::quantity")]
    pub block_number: BlockNumber,
    pub parent_hash: BlockHash,
    #[serde(with = "alloy_serde::quantity")]
    pub timestamp: BlockTimestamp,
    /// Absent on post-merge blocks for some clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_difficulty: Option<U256>,
}

impl ExecutionBlock {
    /// Header view of a payload that has been executed by a client.
    pub fn from_payload(payload: &ExecutionPayloadV1) -> Self {
        Self {
            block_hash: payload.block_hash,
            block_number: payload.block_number,
            parent_hash: payload.parent_hash,
            timestamp: payload.timestamp,
            total_difficulty: None,
        }
    }
}

/// A forkchoice state with head, safe and finalized all pointing at `hash`.
pub fn forkchoice_at(hash: BlockHash) -> ForkchoiceState {
    ForkchoiceState { head_block_hash: hash, safe_block_hash: hash, finalized_block_hash: hash }
}

/// Whether an Engine API status is `VALID`.
pub fn is_valid(status: &PayloadStatusEnum) -> bool {
    matches!(status, PayloadStatusEnum::Valid)
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;

    use super::*;

    #[test]
    fn decodes_rpc_block_and_ignores_unknown_fields() {
        let raw = serde_json::json!({
            "hash": B256::repeat_byte(0xaa),
            "number": "0x10",
            "parentHash": B256::repeat_byte(0xbb),
            "timestamp": "0x64",
            "totalDifficulty": "0x20000",
            "miner": "0x0000000000000000000000000000000000000000",
            "transactions": []
        });

        let block: ExecutionBlock = serde_json::from_value(raw).expect("decode block");
        assert_eq!(block.block_hash, B256::repeat_byte(0xaa));
        assert_eq!(block.block_number, 16);
        assert_eq!(block.timestamp, 100);
        assert_eq!(block.total_difficulty, Some(U256::from(0x20000u64)));
    }

    #[test]
    fn missing_total_difficulty_decodes_as_none() {
        let raw = serde_json::json!({
            "hash": B256::ZERO,
            "number": "0x0",
            "parentHash": B256::ZERO,
            "timestamp": "0x0",
        });

        let block: ExecutionBlock = serde_json::from_value(raw).expect("decode block");
        assert_eq!(block.total_difficulty, None);
    }

    #[test]
    fn only_valid_status_counts_as_valid() {
        assert!(is_valid(&PayloadStatusEnum::Valid));
        assert!(!is_valid(&PayloadStatusEnum::Syncing));
        assert!(!is_valid(&PayloadStatusEnum::Accepted));
        assert!(!is_valid(&PayloadStatusEnum::Invalid { validation_error: "bad".into() }));
    }
}
