//! Block-explorer REST adapter.
//!
//! Amounts arrive as satoshi integers, timestamps as RFC 3339 strings and
//! fee rates as satoshis per kB in three priority buckets.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bitcoin::ScriptBuf;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::error::{BridgeError, BridgeResult};
use crate::providers::types::{BlockId, BlockSummary, BroadcastReceipt, FeeEstimate, Network, TransactionSummary, UnspentOutput};
use crate::providers::{validate_target, CallOptions, Fetched, Provider};
use crate::transport::status::message_from_json;
use crate::transport::{classify, decode_json, parse_json_body, HttpRequest, Transport};
use crate::units::{self, amount, data_carrier};

/// Public API root.
pub const DEFAULT_BASE_URL: &str = "https://api.blockcypher.com/v1";

/// Transaction ids returned per block page.
pub const BLOCK_PAGE_LIMIT: u64 = 500;

/// Script type the explorer reports for data-carrier outputs.
const NULL_DATA: &str = "null-data";

pub struct ExplorerProvider {
    name: String,
    network: Network,
    base_url: String,
    token: Option<String>,
    transport: Arc<dyn Transport>,
}

impl ExplorerProvider {
    /// Fails with [`BridgeError::Config`] for networks the explorer does not serve.
    pub fn new(network: Network, transport: Arc<dyn Transport>) -> BridgeResult<Self> {
        Self::with_base_url(network, DEFAULT_BASE_URL, transport)
    }

    pub fn with_base_url(network: Network, base_url: &str, transport: Arc<dyn Transport>) -> BridgeResult<Self> {
        let chain = match network {
            Network::Mainnet => "main",
            Network::Testnet => "test3",
            Network::Regtest => {
                return Err(BridgeError::Config(format!("Invalid network {} for explorer provider", network)))
            }
        };
        let base_url = format!("{}/btc/{}", base_url.trim_end_matches('/'), chain);
        Url::parse(&base_url).map_err(|e| BridgeError::Config(format!("Invalid explorer URL '{}': {}", base_url, e)))?;

        Ok(Self {
            name: "explorer".to_string(),
            network,
            base_url,
            token: None,
            transport,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> BridgeResult<String> {
        let raw = if path.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, path)
        };
        let mut url = Url::parse(&raw).map_err(|e| BridgeError::InvalidInput(format!("Invalid request path '{}': {}", path, e)))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            if let Some(token) = &self.token {
                pairs.append_pair("token", token);
            }
        }
        // drop the dangling '?' when nothing was appended
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url.into())
    }

    async fn send_json(&self, operation: &'static str, request: HttpRequest, options: &CallOptions) -> BridgeResult<Value> {
        let outcome = options.cancel.run(self.transport.send(request)).await?;
        let response = classify(operation, outcome)?;
        let body = parse_json_body(&response)?;
        if let Some(message) = message_from_json(&body) {
            return Err(BridgeError::remote(Some(response.status), message));
        }
        Ok(body)
    }

    async fn get_json(&self, operation: &'static str, url: String, options: &CallOptions) -> BridgeResult<Value> {
        tracing::debug!(provider = %self.name, operation, "Explorer request");
        self.send_json(operation, HttpRequest::get(url), options).await
    }

    async fn fetch_block_page(&self, block: &str, start: u64, options: &CallOptions) -> BridgeResult<(ExplorerBlock, Value)> {
        let url = self.url(
            &format!("blocks/{}", block),
            &[("txstart", start.to_string()), ("limit", BLOCK_PAGE_LIMIT.to_string())],
        )?;
        let body = self.get_json("getBlockData", url, options).await?;
        let page: ExplorerBlock = decode_json(&body)?;
        Ok((page, body))
    }
}

impl fmt::Debug for ExplorerProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExplorerProvider")
            .field("name", &self.name)
            .field("network", &self.network)
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl Provider for ExplorerProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> &str {
        &self.base_url
    }

    fn network(&self) -> Network {
        self.network
    }

    async fn get_unspent_outputs(
        &self,
        address: &str,
        options: &CallOptions,
    ) -> BridgeResult<Fetched<Vec<UnspentOutput>>> {
        let url = self.url(&format!("addrs/{}", address), &[("unspentOnly", "1".to_string())])?;
        let body = self.get_json("getUnspentOutputs", url, options).await?;
        let parsed: ExplorerAddress = decode_json(&body)?;

        let outputs = parsed
            .txrefs
            .iter()
            .chain(parsed.unconfirmed_txrefs.iter())
            .filter(|r| r.tx_output_n >= 0)
            .map(|r| -> BridgeResult<UnspentOutput> {
                Ok(UnspentOutput {
                    source_tx_id: r.tx_hash.clone(),
                    output_index: r.tx_output_n as u32,
                    amount: amount::sats_to_coins(r.value),
                    script: r.script.as_deref().map(parse_script).transpose()?,
                })
            })
            .collect::<BridgeResult<Vec<_>>>()?;

        Ok(Fetched::with_body(outputs, options, &self.name, &self.base_url, body))
    }

    async fn broadcast_transaction(
        &self,
        tx_hex: &str,
        options: &CallOptions,
    ) -> BridgeResult<Fetched<BroadcastReceipt>> {
        let url = self.url("txs/push", &[])?;
        let request = HttpRequest::post_json(url, &json!({ "tx": tx_hex }));
        let body = self.send_json("broadcastTransaction", request, options).await?;
        let pushed: ExplorerPush = decode_json(&body)?;

        tracing::info!(provider = %self.name, tx_id = %pushed.tx.hash, "Transaction broadcast");
        let receipt = BroadcastReceipt { tx_id: pushed.tx.hash };
        Ok(Fetched::with_body(receipt, options, &self.name, &self.base_url, body))
    }

    async fn get_transaction_data(
        &self,
        tx_id: &str,
        options: &CallOptions,
    ) -> BridgeResult<Fetched<TransactionSummary>> {
        let url = self.url(&format!("txs/{}", tx_id), &[])?;
        let body = self.get_json("getTransactionData", url, options).await?;
        let tx: ExplorerTx = decode_json(&body)?;

        let value_out = amount::sats_to_coins(tx.total);
        let fees = amount::sats_to_coins(tx.fees);
        let embedded_data = data_carrier::first_payload(&tx.outputs, |o| {
            data_carrier::from_type_tag(o.script_type.as_deref(), NULL_DATA, o.data_hex.as_deref())
                .or_else(|| o.script.as_deref().and_then(data_carrier::from_script_hex))
        });

        let summary = TransactionSummary {
            id: tx.hash,
            version: tx.ver,
            block_hash: tx.block_hash,
            confirmations: tx.confirmations,
            time: parse_timestamp(&tx.received)?,
            block_time: tx.confirmed.as_deref().map(parse_timestamp).transpose()?,
            size_bytes: tx.size,
            value_in: &value_out + &fees,
            value_out,
            fees,
            embedded_data,
        };
        Ok(Fetched::with_body(summary, options, &self.name, &self.base_url, body))
    }

    async fn get_block_data(&self, block: &BlockId, options: &CallOptions) -> BridgeResult<Fetched<BlockSummary>> {
        let (first, body) = self.fetch_block_page(&block.to_string(), 0, options).await?;

        let mut transaction_ids = first.txids.clone();
        let mut start = BLOCK_PAGE_LIMIT;
        // pages are fetched by hash so every segment comes from the same block
        while (transaction_ids.len() as u64) < first.n_tx && start < first.n_tx {
            let (page, _) = self.fetch_block_page(&first.hash, start, options).await?;
            if page.txids.is_empty() {
                break;
            }
            transaction_ids.extend(page.txids);
            start += BLOCK_PAGE_LIMIT;
        }
        if transaction_ids.len() as u64 != first.n_tx {
            return Err(BridgeError::remote(
                None,
                format!(
                    "Incomplete transaction list for block {}: received {} of {}",
                    first.hash,
                    transaction_ids.len(),
                    first.n_tx
                ),
            ));
        }

        let summary = BlockSummary {
            hash: first.hash,
            height: first.height,
            size_bytes: first.size,
            version: first.ver,
            confirmations: first.depth as i64 + 1,
            merkle_root: first.mrkl_root,
            transaction_ids,
            previous_block_hash: first.prev_block.filter(|h| !h.is_empty()),
            time: parse_timestamp(&first.time)?,
            nonce: first.nonce,
            difficulty: units::bits_to_difficulty(first.bits),
        };
        Ok(Fetched::with_body(summary, options, &self.name, &self.base_url, body))
    }

    async fn get_estimated_fee(
        &self,
        target_blocks: u32,
        options: &CallOptions,
    ) -> BridgeResult<Fetched<FeeEstimate>> {
        let target_blocks = validate_target(target_blocks)?;
        let url = self.url("", &[])?;
        let body = self.get_json("getEstimatedFee", url, options).await?;
        let chain: ExplorerChain = decode_json(&body)?;

        let sats_per_kb = chain.rate_for(target_blocks);
        if sats_per_kb <= 0 {
            return Err(BridgeError::remote(
                None,
                format!("Invalid estimated fee value received: {}", sats_per_kb),
            ));
        }
        let estimate = FeeEstimate {
            rate_per_kilo_byte: amount::signed_sats_to_coins(sats_per_kb),
        };
        Ok(Fetched::with_body(estimate, options, &self.name, &self.base_url, body))
    }
}

fn parse_timestamp(value: &str) -> BridgeResult<i64> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.timestamp())
        .map_err(|e| BridgeError::remote(None, format!("Invalid timestamp '{}': {}", value, e)))
}

fn parse_script(hex_script: &str) -> BridgeResult<ScriptBuf> {
    ScriptBuf::from_hex(hex_script).map_err(|e| BridgeError::remote(None, format!("Invalid output script: {}", e)))
}

#[derive(Debug, Deserialize)]
struct ExplorerAddress {
    #[serde(default)]
    txrefs: Vec<ExplorerTxRef>,
    #[serde(default)]
    unconfirmed_txrefs: Vec<ExplorerTxRef>,
}

#[derive(Debug, Deserialize)]
struct ExplorerTxRef {
    tx_hash: String,
    tx_output_n: i64,
    value: u64,
    #[serde(default)]
    script: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExplorerPush {
    tx: ExplorerPushedTx,
}

#[derive(Debug, Deserialize)]
struct ExplorerPushedTx {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct ExplorerTx {
    hash: String,
    ver: i32,
    #[serde(default)]
    block_hash: Option<String>,
    #[serde(default)]
    confirmations: u64,
    received: String,
    #[serde(default)]
    confirmed: Option<String>,
    size: u64,
    total: u64,
    fees: u64,
    #[serde(default)]
    outputs: Vec<ExplorerOutput>,
}

#[derive(Debug, Deserialize)]
struct ExplorerOutput {
    #[serde(default)]
    script_type: Option<String>,
    #[serde(default)]
    data_hex: Option<String>,
    #[serde(default)]
    script: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExplorerBlock {
    hash: String,
    height: u64,
    #[serde(default)]
    depth: u64,
    ver: i32,
    time: String,
    bits: u32,
    nonce: u32,
    n_tx: u64,
    size: u64,
    #[serde(default)]
    prev_block: Option<String>,
    mrkl_root: String,
    #[serde(default)]
    txids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ExplorerChain {
    high_fee_per_kb: i64,
    medium_fee_per_kb: i64,
    low_fee_per_kb: i64,
}

impl ExplorerChain {
    /// More than 6 blocks is the low bucket, more than 2 medium, otherwise high.
    fn rate_for(&self, target_blocks: u32) -> i64 {
        if target_blocks > 6 {
            self.low_fee_per_kb
        } else if target_blocks > 2 {
            self.medium_fee_per_kb
        } else {
            self.high_fee_per_kb
        }
    }
}
