use std::collections::{BTreeMap, btree_map::Entry};

use alloy_rpc_types_engine::ExecutionPayloadV1;
use clmock_types::aliases::{B256, BlockNumber};
use tracing::warn;

/// Append-only record of what the mocker produced at each block number.
#[derive(Clone, Debug, Default)]
pub struct History {
    random: BTreeMap<BlockNumber, B256>,
    payloads: BTreeMap<BlockNumber, ExecutionPayloadV1>,
}

impl History {
    /// Records the `prevRandao` used to build block `number`. An existing entry is kept.
    pub fn record_random(&mut self, number: BlockNumber, random: B256) -> bool {
        match self.random.entry(number) {
            Entry::Vacant(entry) => {
                entry.insert(random);
                true
            }
            Entry::Occupied(entry) => {
                warn!(number, existing = %entry.get(), ignored = %random, "Random value already recorded");
                false
            }
        }
    }

    /// Records the payload executed at block `number`. An existing entry is kept.
    pub fn record_payload(&mut self, number: BlockNumber, payload: ExecutionPayloadV1) -> bool {
        match self.payloads.entry(number) {
            Entry::Vacant(entry) => {
                entry.insert(payload);
                true
            }
            Entry::Occupied(entry) => {
                warn!(
                    number,
                    existing = %entry.get().block_hash,
                    ignored = %payload.block_hash,
                    "Payload already recorded"
                );
                false
            }
        }
    }

    pub fn random(&self, number: BlockNumber) -> Option<B256> {
        self.random.get(&number).copied()
    }

    pub fn payload(&self, number: BlockNumber) -> Option<&ExecutionPayloadV1> {
        self.payloads.get(&number)
    }

    /// Number of blocks with an executed payload on record.
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}
