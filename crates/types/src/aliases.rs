pub type U64 = alloy_primitives::U64;
pub type U256 = alloy_primitives::U256;
pub type B256 = alloy_primitives::B256;

pub type Address = alloy_primitives::Address;
pub type BlockHash = alloy_primitives::BlockHash;
pub type BlockNumber = alloy_primitives::BlockNumber;
pub type BlockTimestamp = alloy_primitives::BlockTimestamp;
pub type Bytes = alloy_primitives::Bytes;
pub type TxHash = alloy_primitives::TxHash;

pub type BlockNumberOrTag = alloy_eips::BlockNumberOrTag;
