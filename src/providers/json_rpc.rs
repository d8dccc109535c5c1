//! Full node JSON-RPC adapter.
//!
//! Speaks the Bitcoin Core JSON-RPC 1.0 envelope over the injected
//! transport. Credentials embedded in the URL are moved into an HTTP Basic
//! header and never appear in `endpoint()`.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bigdecimal::BigDecimal;
use bitcoin::ScriptBuf;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;
use uuid::Uuid;

use crate::error::{BridgeError, BridgeResult};
use crate::providers::types::{BlockId, BlockSummary, BroadcastReceipt, FeeEstimate, Network, TransactionSummary, UnspentOutput};
use crate::providers::{validate_target, CallOptions, Fetched, Provider};
use crate::transport::{classify, decode_json, parse_json_body, HttpRequest, Transport};
use crate::units::{self, amount, data_carrier, difficulty};

/// `listunspent` upper confirmation bound.
const MAX_CONFIRMATIONS: u64 = 9_999_999;

pub struct JsonRpcProvider {
    name: String,
    network: Network,
    url: String,
    authorization: Option<String>,
    transport: Arc<dyn Transport>,
}

impl JsonRpcProvider {
    /// `url` may carry `user:password@` credentials.
    pub fn new(network: Network, url: &str, transport: Arc<dyn Transport>) -> BridgeResult<Self> {
        let mut parsed = Url::parse(url)
            .map_err(|e| BridgeError::Config(format!("Invalid JSON-RPC URL '{}': {}", redact_url(url), e)))?;

        let authorization = if parsed.username().is_empty() {
            None
        } else {
            Some(basic_auth(parsed.username(), parsed.password().unwrap_or_default()))
        };
        strip_credentials(&mut parsed);

        Ok(Self {
            name: "json-rpc".to_string(),
            network,
            url: parsed.into(),
            authorization,
            transport,
        })
    }

    /// Credentials configured separately from the URL take precedence.
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.authorization = Some(basic_auth(username, password));
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Check that the node serves the configured network.
    pub async fn verify_network(&self) -> BridgeResult<()> {
        let info = self
            .call("verifyNetwork", "getblockchaininfo", json!([]), &CallOptions::new())
            .await?;
        let chain = info.get("chain").and_then(Value::as_str).unwrap_or_default();
        if chain != self.network.node_chain_name() {
            return Err(BridgeError::Config(format!(
                "Node at {} serves chain '{}', expected '{}'",
                self.url,
                chain,
                self.network.node_chain_name()
            )));
        }
        Ok(())
    }

    async fn call(&self, operation: &'static str, method: &str, params: Value, options: &CallOptions) -> BridgeResult<Value> {
        let envelope = json!({
            "jsonrpc": "1.0",
            "id": Uuid::new_v4().to_string(),
            "method": method,
            "params": params,
        });
        let mut request = HttpRequest::post_json(self.url.clone(), &envelope);
        if let Some(authorization) = &self.authorization {
            request = request.header("Authorization", authorization.clone());
        }

        tracing::debug!(provider = %self.name, method, "JSON-RPC call");
        let outcome = options.cancel.run(self.transport.send(request)).await?;
        let response = classify(operation, outcome)?;
        let reply: RpcReply = decode_json(&parse_json_body(&response)?)?;

        if let Some(error) = reply.error {
            return Err(BridgeError::remote(Some(response.status), error.message));
        }
        Ok(reply.result)
    }

    async fn fetch_block(&self, hash: &str, options: &CallOptions) -> BridgeResult<Value> {
        self.call("getBlockData", "getblock", json!([hash, 1]), options).await
    }
}

impl fmt::Debug for JsonRpcProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonRpcProvider")
            .field("name", &self.name)
            .field("network", &self.network)
            .field("url", &self.url)
            .field("authorization", &self.authorization.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl Provider for JsonRpcProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> &str {
        &self.url
    }

    fn network(&self) -> Network {
        self.network
    }

    async fn get_unspent_outputs(
        &self,
        address: &str,
        options: &CallOptions,
    ) -> BridgeResult<Fetched<Vec<UnspentOutput>>> {
        let body = self
            .call("getUnspentOutputs", "listunspent", json!([0, MAX_CONFIRMATIONS, [address]]), options)
            .await?;
        let entries: Vec<RpcUnspent> = decode_json(&body)?;

        let outputs = entries
            .into_iter()
            .map(|entry| -> BridgeResult<UnspentOutput> {
                let script = match entry.script_pub_key.as_deref() {
                    Some(hex_script) => Some(
                        ScriptBuf::from_hex(hex_script)
                            .map_err(|e| BridgeError::remote(None, format!("Invalid output script: {}", e)))?,
                    ),
                    None => None,
                };
                Ok(UnspentOutput {
                    source_tx_id: entry.txid,
                    output_index: entry.vout,
                    amount: required_decimal(&entry.amount, "amount")?,
                    script,
                })
            })
            .collect::<BridgeResult<Vec<_>>>()?;

        Ok(Fetched::with_body(outputs, options, &self.name, &self.url, body))
    }

    async fn broadcast_transaction(
        &self,
        tx_hex: &str,
        options: &CallOptions,
    ) -> BridgeResult<Fetched<BroadcastReceipt>> {
        let body = self
            .call("broadcastTransaction", "sendrawtransaction", json!([tx_hex]), options)
            .await?;
        let tx_id = body
            .as_str()
            .ok_or_else(|| BridgeError::remote(None, "sendrawtransaction returned no transaction id"))?
            .to_string();

        tracing::info!(provider = %self.name, tx_id = %tx_id, "Transaction broadcast");
        Ok(Fetched::with_body(BroadcastReceipt { tx_id }, options, &self.name, &self.url, body))
    }

    async fn get_transaction_data(
        &self,
        tx_id: &str,
        options: &CallOptions,
    ) -> BridgeResult<Fetched<TransactionSummary>> {
        // verbosity 2 adds prevout values on nodes that keep undo data
        let body = self
            .call("getTransactionData", "getrawtransaction", json!([tx_id, 2]), options)
            .await?;
        let tx: RpcTransaction = decode_json(&body)?;

        let mut value_out = BigDecimal::from(0);
        for output in &tx.vout {
            value_out += required_decimal(&output.value, "vout.value")?;
        }
        // coinbase spends nothing, so its input value is what it pays out
        let value_in = if tx.vin.iter().any(|input| input.coinbase.is_some()) {
            value_out.clone()
        } else {
            let mut total = BigDecimal::from(0);
            for (index, input) in tx.vin.iter().enumerate() {
                let value = input
                    .value
                    .as_ref()
                    .or_else(|| input.prevout.as_ref().map(|p| &p.value))
                    .ok_or_else(|| {
                        BridgeError::remote(None, format!("Input {} of {} carries no prevout value", index, tx_id))
                    })?;
                total += required_decimal(value, "vin.value")?;
            }
            total
        };

        let embedded_data = data_carrier::first_payload(&tx.vout, |o| {
            let script = &o.script_pub_key;
            script
                .asm
                .as_deref()
                .and_then(data_carrier::from_asm)
                .or_else(|| script.hex.as_deref().and_then(data_carrier::from_script_hex))
        });

        let summary = TransactionSummary {
            id: tx.txid,
            version: tx.version,
            block_hash: tx.blockhash,
            confirmations: tx.confirmations,
            time: tx.time.unwrap_or_default(),
            block_time: tx.blocktime,
            size_bytes: tx.size,
            fees: &value_in - &value_out,
            value_in,
            value_out,
            embedded_data,
        };
        Ok(Fetched::with_body(summary, options, &self.name, &self.url, body))
    }

    async fn get_block_data(&self, block: &BlockId, options: &CallOptions) -> BridgeResult<Fetched<BlockSummary>> {
        let hash = match block {
            BlockId::Hash(hash) => hash.clone(),
            BlockId::Height(height) => {
                let found = self.call("getBlockData", "getblockhash", json!([height]), options).await?;
                found
                    .as_str()
                    .ok_or_else(|| BridgeError::remote(None, format!("No block hash for height {}", height)))?
                    .to_string()
            }
        };

        let body = self.fetch_block(&hash, options).await?;
        let block: RpcBlock = decode_json(&body)?;
        let bits = difficulty::parse_bits_hex(&block.bits)
            .ok_or_else(|| BridgeError::remote(None, format!("Invalid bits '{}'", block.bits)))?;

        let summary = BlockSummary {
            hash: block.hash,
            height: block.height,
            size_bytes: block.size,
            version: block.version,
            confirmations: block.confirmations,
            merkle_root: block.merkleroot,
            transaction_ids: block.tx,
            previous_block_hash: block.previousblockhash,
            time: block.time,
            nonce: block.nonce,
            difficulty: units::bits_to_difficulty(bits),
        };
        Ok(Fetched::with_body(summary, options, &self.name, &self.url, body))
    }

    async fn get_estimated_fee(
        &self,
        target_blocks: u32,
        options: &CallOptions,
    ) -> BridgeResult<Fetched<FeeEstimate>> {
        let target_blocks = validate_target(target_blocks)?;
        let body = self
            .call("getEstimatedFee", "estimatesmartfee", json!([target_blocks]), options)
            .await?;
        let estimate: RpcFeeEstimate = decode_json(&body)?;

        let rate = match estimate.feerate.as_ref().and_then(amount::decimal_from_json) {
            Some(rate) => rate,
            None => {
                let reason = if estimate.errors.is_empty() {
                    "no feerate returned".to_string()
                } else {
                    estimate.errors.join(", ")
                };
                return Err(BridgeError::remote(None, format!("Fee estimation failed: {}", reason)));
            }
        };
        if rate <= BigDecimal::from(0) {
            return Err(BridgeError::remote(None, format!("Invalid estimated fee value received: {}", rate)));
        }

        let fee = FeeEstimate { rate_per_kilo_byte: rate };
        Ok(Fetched::with_body(fee, options, &self.name, &self.url, body))
    }
}

/// Render a URL with any password replaced, for logs and errors.
pub fn redact_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("***"));
            }
            parsed.into()
        }
        Err(_) => "<invalid url>".to_string(),
    }
}

fn strip_credentials(url: &mut Url) {
    let _ = url.set_username("");
    let _ = url.set_password(None);
}

fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{}:{}", username, password)))
}

fn required_decimal(value: &Value, field: &str) -> BridgeResult<BigDecimal> {
    amount::decimal_from_json(value).ok_or_else(|| BridgeError::remote(None, format!("Invalid {} '{}'", field, value)))
}

#[derive(Debug, Deserialize)]
struct RpcReply {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcUnspent {
    txid: String,
    vout: u32,
    amount: Value,
    #[serde(rename = "scriptPubKey", default)]
    script_pub_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RpcTransaction {
    txid: String,
    version: i32,
    size: u64,
    #[serde(default)]
    vin: Vec<RpcInput>,
    #[serde(default)]
    vout: Vec<RpcOutput>,
    #[serde(default)]
    blockhash: Option<String>,
    #[serde(default)]
    confirmations: u64,
    #[serde(default)]
    time: Option<i64>,
    #[serde(default)]
    blocktime: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RpcInput {
    #[serde(default)]
    coinbase: Option<String>,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    prevout: Option<RpcPrevout>,
}

#[derive(Debug, Deserialize)]
struct RpcPrevout {
    value: Value,
}

#[derive(Debug, Deserialize)]
struct RpcOutput {
    value: Value,
    #[serde(rename = "scriptPubKey")]
    script_pub_key: RpcScript,
}

#[derive(Debug, Deserialize)]
struct RpcScript {
    #[serde(default)]
    asm: Option<String>,
    #[serde(default)]
    hex: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RpcBlock {
    hash: String,
    confirmations: i64,
    size: u64,
    height: u64,
    version: i32,
    merkleroot: String,
    #[serde(default)]
    tx: Vec<String>,
    time: i64,
    nonce: u32,
    bits: String,
    #[serde(default)]
    previousblockhash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RpcFeeEstimate {
    #[serde(default)]
    feerate: Option<Value>,
    #[serde(default)]
    errors: Vec<String>,
}
