//! Lightning node adapter.
//!
//! Reads go through the node's wallet and chain services. Raw transactions
//! and blocks are decoded locally, so ids, merkle roots and data carriers
//! come from the codec rather than from node-rendered fields.

use std::sync::Arc;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use bitcoin::consensus::deserialize;
use bitcoin::hashes::Hash;
use bitcoin::{Block, BlockHash, ScriptBuf, Transaction};
use serde_json::{json, Value};

use crate::error::{BridgeError, BridgeResult};
use crate::lightning::{LightningRpc, RpcFailure, WalletUnlocker};
use crate::providers::types::{BlockId, BlockSummary, BroadcastReceipt, FeeEstimate, Network, TransactionSummary, UnspentOutput};
use crate::providers::{validate_target, CallOptions, Fetched, Provider};
use crate::units::{self, amount, data_carrier, hash};

/// The node's fee estimator rejects targets below two blocks.
const MIN_NODE_CONF_TARGET: u32 = 2;

/// Weight units per virtual byte.
const WEIGHT_PER_VBYTE: u32 = 4;

#[derive(Debug)]
pub struct LightningProvider {
    name: String,
    network: Network,
    endpoint: String,
    unlocker: Arc<WalletUnlocker>,
}

impl LightningProvider {
    /// `endpoint` is the node's RPC socket, for failure reports only.
    pub fn new(network: Network, endpoint: impl Into<String>, unlocker: Arc<WalletUnlocker>) -> Self {
        Self {
            name: "lightning".to_string(),
            network,
            endpoint: endpoint.into(),
            unlocker,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn rpc(&self) -> &Arc<dyn LightningRpc> {
        self.unlocker.rpc()
    }

    /// Unlock, then run one RPC under the caller's cancellation signal.
    async fn call<T, F>(&self, operation: &'static str, options: &CallOptions, request: F) -> BridgeResult<T>
    where
        F: std::future::Future<Output = Result<T, RpcFailure>>,
    {
        self.unlocker.ensure_unlocked(&options.cancel).await?;
        options
            .cancel
            .run(request)
            .await?
            .map_err(|failure| failure.into_bridge(operation))
    }

    /// Check that the node serves the configured network.
    pub async fn verify_network(&self) -> BridgeResult<()> {
        let options = CallOptions::new();
        let info = self.call("verifyNetwork", &options, self.rpc().get_info()).await?;
        let expected = self.network.to_string();
        let matches = info
            .chains
            .iter()
            .any(|c| c.chain == "bitcoin" && c.network == expected);
        if !matches {
            return Err(BridgeError::Config(format!(
                "Lightning node at {} does not serve bitcoin {}",
                self.endpoint, expected
            )));
        }
        Ok(())
    }

    fn to_json<T: serde::Serialize>(value: &T) -> Value {
        serde_json::to_value(value).unwrap_or(Value::Null)
    }
}

#[async_trait]
impl Provider for LightningProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn network(&self) -> Network {
        self.network
    }

    async fn get_unspent_outputs(
        &self,
        address: &str,
        options: &CallOptions,
    ) -> BridgeResult<Fetched<Vec<UnspentOutput>>> {
        let utxos = self
            .call("getUnspentOutputs", options, self.rpc().list_unspent(1, i32::MAX))
            .await?;

        let outputs = utxos
            .iter()
            .filter(|u| u.address == address)
            .map(|u| -> BridgeResult<UnspentOutput> {
                let sats = u64::try_from(u.amount_sat)
                    .map_err(|_| BridgeError::remote(None, format!("Negative output amount {}", u.amount_sat)))?;
                let script = if u.pk_script.is_empty() {
                    None
                } else {
                    Some(
                        ScriptBuf::from_hex(&u.pk_script)
                            .map_err(|e| BridgeError::remote(None, format!("Invalid output script: {}", e)))?,
                    )
                };
                Ok(UnspentOutput {
                    source_tx_id: u.txid.clone(),
                    output_index: u.output_index,
                    amount: amount::sats_to_coins(sats),
                    script,
                })
            })
            .collect::<BridgeResult<Vec<_>>>()?;

        Ok(Fetched::with_body(outputs, options, &self.name, &self.endpoint, Self::to_json(&utxos)))
    }

    async fn broadcast_transaction(
        &self,
        tx_hex: &str,
        options: &CallOptions,
    ) -> BridgeResult<Fetched<BroadcastReceipt>> {
        let bytes = hex::decode(tx_hex).map_err(|e| BridgeError::InvalidInput(format!("Invalid transaction hex: {}", e)))?;
        let tx: Transaction =
            deserialize(&bytes).map_err(|e| BridgeError::InvalidInput(format!("Invalid transaction: {}", e)))?;

        let published = self
            .call("broadcastTransaction", options, self.rpc().publish_transaction(&bytes))
            .await?;
        if !published.publish_error.is_empty() {
            return Err(BridgeError::remote(None, published.publish_error));
        }

        let tx_id = tx.compute_txid().to_string();
        tracing::info!(provider = %self.name, tx_id = %tx_id, "Transaction broadcast");
        Ok(Fetched::with_body(
            BroadcastReceipt { tx_id },
            options,
            &self.name,
            &self.endpoint,
            Self::to_json(&published),
        ))
    }

    async fn get_transaction_data(
        &self,
        tx_id: &str,
        options: &CallOptions,
    ) -> BridgeResult<Fetched<TransactionSummary>> {
        let transactions = self
            .call("getTransactionData", options, self.rpc().get_transactions())
            .await?;
        let found = transactions
            .into_iter()
            .find(|t| t.tx_hash == tx_id)
            .ok_or_else(|| BridgeError::remote(None, format!("Transaction {} not found in wallet", tx_id)))?;

        let bytes = hex::decode(&found.raw_tx_hex)
            .map_err(|e| BridgeError::remote(None, format!("Invalid raw transaction hex: {}", e)))?;
        let tx: Transaction =
            deserialize(&bytes).map_err(|e| BridgeError::remote(None, format!("Invalid raw transaction: {}", e)))?;

        let out_sats: u64 = tx.output.iter().map(|o| o.value.to_sat()).sum();
        let value_out = amount::sats_to_coins(out_sats);
        let fees = amount::signed_sats_to_coins(found.total_fees);
        let embedded_data = data_carrier::first_payload(&tx.output, |o| data_carrier::from_script(&o.script_pubkey));

        let summary = TransactionSummary {
            id: tx.compute_txid().to_string(),
            version: tx.version.0,
            block_hash: Some(found.block_hash.clone()).filter(|h| !h.is_empty()),
            confirmations: u64::try_from(found.num_confirmations).unwrap_or(0),
            time: found.time_stamp,
            block_time: None,
            size_bytes: bytes.len() as u64,
            value_in: &value_out + &fees,
            value_out,
            fees,
            embedded_data,
        };
        Ok(Fetched::with_body(summary, options, &self.name, &self.endpoint, Self::to_json(&found)))
    }

    async fn get_block_data(&self, block: &BlockId, options: &CallOptions) -> BridgeResult<Fetched<BlockSummary>> {
        let (hash_bytes, known_height) = match block {
            BlockId::Height(height) => {
                let bytes = self
                    .call("getBlockData", options, self.rpc().get_block_hash(*height))
                    .await?;
                (bytes, Some(*height))
            }
            BlockId::Hash(display) => {
                let internal = hex::decode(hash::reverse_hex(display))
                    .map_err(|e| BridgeError::InvalidInput(format!("Invalid block hash '{}': {}", display, e)))?;
                (internal, None)
            }
        };

        let raw = self
            .call("getBlockData", options, self.rpc().get_block(&hash_bytes))
            .await?;
        let parsed: Block =
            deserialize(&raw).map_err(|e| BridgeError::remote(None, format!("Invalid raw block: {}", e)))?;
        let info = self.call("getBlockData", options, self.rpc().get_info()).await?;

        let height = match known_height {
            Some(height) => height,
            None => parsed
                .bip34_block_height()
                .map_err(|e| BridgeError::remote(None, format!("Block height unavailable: {}", e)))?,
        };
        let header = &parsed.header;
        let previous_block_hash =
            Some(header.prev_blockhash).filter(|h| *h != BlockHash::all_zeros()).map(|h| h.to_string());

        let summary = BlockSummary {
            hash: hash::display_hex(&hash_bytes),
            height,
            size_bytes: raw.len() as u64,
            version: header.version.to_consensus(),
            confirmations: info.block_height as i64 - height as i64 + 1,
            merkle_root: header.merkle_root.to_string(),
            transaction_ids: parsed.txdata.iter().map(|tx| tx.compute_txid().to_string()).collect(),
            previous_block_hash,
            time: header.time as i64,
            nonce: header.nonce,
            difficulty: units::bits_to_difficulty(header.bits.to_consensus()),
        };
        let body = json!({
            "block_hash": summary.hash.clone(),
            "raw_block": hex::encode(&raw),
        });
        Ok(Fetched::with_body(summary, options, &self.name, &self.endpoint, body))
    }

    async fn get_estimated_fee(
        &self,
        target_blocks: u32,
        options: &CallOptions,
    ) -> BridgeResult<Fetched<FeeEstimate>> {
        let target_blocks = validate_target(target_blocks)?;
        let conf_target = target_blocks.max(MIN_NODE_CONF_TARGET);
        let estimate = self
            .call("getEstimatedFee", options, self.rpc().estimate_fee(conf_target))
            .await?;

        if estimate.sat_per_kw <= 0 {
            return Err(BridgeError::remote(
                None,
                format!("Invalid estimated fee value received: {}", estimate.sat_per_kw),
            ));
        }
        let rate = amount::signed_sats_to_coins(estimate.sat_per_kw) * BigDecimal::from(WEIGHT_PER_VBYTE);
        Ok(Fetched::with_body(
            FeeEstimate { rate_per_kilo_byte: rate },
            options,
            &self.name,
            &self.endpoint,
            Self::to_json(&estimate),
        ))
    }
}
