//! Canonical domain types returned by every provider.

use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use bitcoin::ScriptBuf;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Chain a provider serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    pub fn to_bitcoin(self) -> bitcoin::Network {
        match self {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
            Network::Regtest => bitcoin::Network::Regtest,
        }
    }

    /// Chain name as reported by `getblockchaininfo`.
    pub fn node_chain_name(self) -> &'static str {
        match self {
            Network::Mainnet => "main",
            Network::Testnet => "test",
            Network::Regtest => "regtest",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        };
        f.write_str(name)
    }
}

impl FromStr for Network {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Ok(Network::Mainnet),
            "testnet" | "test" | "testnet3" | "test3" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            other => Err(BridgeError::Config(format!("Unknown network '{}'", other))),
        }
    }
}

/// A spendable output, identified by `(source_tx_id, output_index)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnspentOutput {
    pub source_tx_id: String,
    pub output_index: u32,
    /// Amount in coins.
    pub amount: BigDecimal,
    pub script: Option<ScriptBuf>,
}

/// Fee rate in coins per 1000 virtual bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeEstimate {
    pub rate_per_kilo_byte: BigDecimal,
}

impl FeeEstimate {
    /// Absolute fee for a transaction of `size_kb` kilobytes.
    pub fn fee_for(&self, size_kb: &BigDecimal) -> BigDecimal {
        &self.rate_per_kilo_byte * size_kb
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub id: String,
    pub version: i32,
    pub block_hash: Option<String>,
    pub confirmations: u64,
    /// Unix seconds the transaction was first seen.
    pub time: i64,
    pub block_time: Option<i64>,
    pub size_bytes: u64,
    pub value_in: BigDecimal,
    pub value_out: BigDecimal,
    pub fees: BigDecimal,
    /// Hex payload of the first data-carrier output.
    pub embedded_data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub hash: String,
    pub height: u64,
    pub size_bytes: u64,
    pub version: i32,
    pub confirmations: i64,
    pub merkle_root: String,
    /// In-block order.
    pub transaction_ids: Vec<String>,
    pub previous_block_hash: Option<String>,
    pub time: i64,
    pub nonce: u32,
    pub difficulty: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastReceipt {
    pub tx_id: String,
}

/// Block lookup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockId {
    Height(u64),
    Hash(String),
}

impl BlockId {
    /// All-digit input is a height, anything else a hash.
    pub fn parse(value: &str) -> Self {
        match value.parse::<u64>() {
            Ok(height) => BlockId::Height(height),
            Err(_) => BlockId::Hash(value.to_string()),
        }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockId::Height(h) => write!(f, "{}", h),
            BlockId::Hash(h) => f.write_str(h),
        }
    }
}

impl From<u64> for BlockId {
    fn from(height: u64) -> Self {
        BlockId::Height(height)
    }
}

impl From<&str> for BlockId {
    fn from(value: &str) -> Self {
        BlockId::parse(value)
    }
}
