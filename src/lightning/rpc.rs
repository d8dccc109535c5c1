//! Narrow RPC surface of the remote wallet.
//!
//! Response shapes follow the node's wallet, chain and signer services.
//! Status codes are gRPC codes.

use std::fmt::Debug;

use async_trait::async_trait;
use bitcoin::sighash::EcdsaSighashType;
use bitcoin::{PublicKey, Transaction, TxOut};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::BridgeError;

/// `UNIMPLEMENTED`, returned by the unlocker service once the wallet is open.
pub const CODE_ALREADY_UNLOCKED: i32 = 12;
pub const CODE_DEADLINE_EXCEEDED: i32 = 4;
pub const CODE_UNAVAILABLE: i32 = 14;
pub const CODE_UNAUTHENTICATED: i32 = 16;

/// A failed RPC call.
#[derive(Debug, Clone, Error)]
#[error("{message} (code {code})")]
pub struct RpcFailure {
    pub code: i32,
    pub message: String,
}

impl RpcFailure {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Map into the bridge taxonomy for `operation`.
    pub fn into_bridge(self, operation: &str) -> BridgeError {
        match self.code {
            CODE_UNAUTHENTICATED => BridgeError::Credential,
            CODE_UNAVAILABLE | CODE_DEADLINE_EXCEEDED => BridgeError::network(operation, self.message),
            _ => BridgeError::remote(None, self.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LnUtxo {
    pub address: String,
    /// Display-order transaction id.
    pub txid: String,
    pub output_index: u32,
    pub amount_sat: i64,
    /// Hex-encoded output script.
    pub pk_script: String,
    pub confirmations: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LnTransaction {
    pub tx_hash: String,
    pub amount_sat: i64,
    pub num_confirmations: i32,
    /// Empty while unconfirmed.
    pub block_hash: String,
    pub block_height: i32,
    pub time_stamp: i64,
    pub total_fees: i64,
    pub raw_tx_hex: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LnChain {
    pub chain: String,
    pub network: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LnInfo {
    pub identity_pubkey: String,
    pub block_height: u32,
    pub block_hash: String,
    pub synced_to_chain: bool,
    pub chains: Vec<LnChain>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LnFeeEstimate {
    pub sat_per_kw: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LnPublishResponse {
    /// Non-empty when the node rejected the transaction.
    pub publish_error: String,
}

/// What the signer needs to produce one input signature.
#[derive(Debug, Clone)]
pub struct SignDescriptor {
    pub public_key: PublicKey,
    pub output: TxOut,
    pub input_index: usize,
    pub sighash: EcdsaSighashType,
}

/// The remote wallet. Implemented by the host process's RPC client.
#[async_trait]
pub trait LightningRpc: Send + Sync + Debug {
    async fn unlock_wallet(&self, password: &str) -> Result<(), RpcFailure>;

    async fn get_info(&self) -> Result<LnInfo, RpcFailure>;

    async fn list_unspent(&self, min_confs: i32, max_confs: i32) -> Result<Vec<LnUtxo>, RpcFailure>;

    async fn publish_transaction(&self, raw_tx: &[u8]) -> Result<LnPublishResponse, RpcFailure>;

    async fn get_transactions(&self) -> Result<Vec<LnTransaction>, RpcFailure>;

    /// Block hash bytes in internal byte order.
    async fn get_block_hash(&self, height: u64) -> Result<Vec<u8>, RpcFailure>;

    /// Serialized block for an internal-order hash.
    async fn get_block(&self, block_hash: &[u8]) -> Result<Vec<u8>, RpcFailure>;

    async fn estimate_fee(&self, conf_target: u32) -> Result<LnFeeEstimate, RpcFailure>;

    /// Serialized public key controlling `address`.
    async fn key_for_address(&self, address: &str) -> Result<Vec<u8>, RpcFailure>;

    /// DER signatures without the sighash byte, one per descriptor.
    async fn sign_output_raw(
        &self,
        tx: &Transaction,
        descriptors: &[SignDescriptor],
    ) -> Result<Vec<Vec<u8>>, RpcFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_mapping() {
        assert!(matches!(
            RpcFailure::new(CODE_UNAUTHENTICATED, "bad macaroon").into_bridge("op"),
            BridgeError::Credential
        ));
        assert!(matches!(
            RpcFailure::new(CODE_UNAVAILABLE, "connection refused").into_bridge("op"),
            BridgeError::Network { .. }
        ));
        let remote = RpcFailure::new(2, "unable to find tx").into_bridge("op");
        assert_eq!(remote.to_string(), "Invalid response : - : unable to find tx (code 2)");
    }
}
