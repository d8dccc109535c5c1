//! Shared doubles for integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use bitcoin::consensus::deserialize;
use bitcoin::secp256k1::Secp256k1;
use bitcoin::{PrivateKey, Transaction};
use btc_bridge::error::{BridgeError, BridgeResult};
use btc_bridge::lifecycle::Clock;
use btc_bridge::lightning::{
    LightningRpc, LnFeeEstimate, LnInfo, LnPublishResponse, LnTransaction, LnUtxo, RpcFailure, SignDescriptor,
};
use btc_bridge::providers::{
    BlockId, BlockSummary, BroadcastReceipt, CallOptions, FeeEstimate, Fetched, Network, Provider,
    TransactionSummary, UnspentOutput,
};
use btc_bridge::transport::{HttpRequest, HttpResponse, Transport, TransportError};
use btc_bridge::wallet::script;

pub fn decimal(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap()
}

pub fn test_key(network: Network) -> PrivateKey {
    PrivateKey::from_slice(&[0x11; 32], network.to_bitcoin()).unwrap()
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

type Responder = dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync;

/// Answers every request through a closure and keeps a log of what was sent.
pub struct ScriptedTransport {
    responder: Box<Responder>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Same status and body for every request.
    pub fn fixed(status: u16, body: &str) -> Arc<Self> {
        let body = body.to_string();
        Self::new(move |_| Ok(response(status, &body)))
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let outcome = (self.responder)(&request);
        self.requests.lock().unwrap().push(request);
        outcome
    }
}

pub fn response(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        body: body.to_string(),
    }
}

/// Body of a JSON-RPC request, parsed.
pub fn rpc_method(request: &HttpRequest) -> (String, serde_json::Value) {
    let body: serde_json::Value = serde_json::from_str(request.body.as_deref().unwrap_or("{}")).unwrap();
    (
        body["method"].as_str().unwrap_or_default().to_string(),
        body["params"].clone(),
    )
}

pub fn rpc_result(result: serde_json::Value) -> HttpResponse {
    response(
        200,
        &serde_json::json!({ "result": result, "error": null, "id": "test" }).to_string(),
    )
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// Provider double with canned answers.
#[derive(Debug)]
pub struct StubProvider {
    pub name: String,
    pub endpoint: String,
    pub network: Network,
    pub utxos: Vec<UnspentOutput>,
    /// BTC per 1000 vbytes.
    pub fee_rate: BigDecimal,
    /// When set every operation fails with a remote error carrying this message.
    pub failure: Option<String>,
    /// Delay before answering.
    pub delay: Option<Duration>,
    /// Overrides the id returned by broadcast.
    pub broadcast_id: Option<String>,
    pub calls: AtomicU32,
    pub call_log: Option<Arc<Mutex<Vec<String>>>>,
    pub broadcasts: Mutex<Vec<String>>,
}

impl StubProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            endpoint: format!("stub://{}", name),
            network: Network::Testnet,
            utxos: Vec::new(),
            fee_rate: decimal("0.0001"),
            failure: None,
            delay: None,
            broadcast_id: None,
            calls: AtomicU32::new(0),
            call_log: None,
            broadcasts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(name: &str, message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new(name)
        }
    }

    pub fn on(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    pub fn with_utxos(mut self, utxos: Vec<UnspentOutput>) -> Self {
        self.utxos = utxos;
        self
    }

    pub fn with_fee_rate(mut self, rate: &str) -> Self {
        self.fee_rate = decimal(rate);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_broadcast_id(mut self, id: &str) -> Self {
        self.broadcast_id = Some(id.to_string());
        self
    }

    pub fn logging_to(mut self, log: Arc<Mutex<Vec<String>>>) -> Self {
        self.call_log = Some(log);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> BridgeResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.call_log {
            log.lock().unwrap().push(self.name.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some(message) => Err(BridgeError::remote(Some(500), message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Provider for StubProvider {
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
        _address: &str,
        _options: &CallOptions,
    ) -> BridgeResult<Fetched<Vec<UnspentOutput>>> {
        self.enter().await?;
        Ok(Fetched::new(self.utxos.clone()))
    }

    async fn broadcast_transaction(
        &self,
        tx_hex: &str,
        _options: &CallOptions,
    ) -> BridgeResult<Fetched<BroadcastReceipt>> {
        self.enter().await?;
        self.broadcasts.lock().unwrap().push(tx_hex.to_string());
        let tx_id = match &self.broadcast_id {
            Some(id) => id.clone(),
            None => {
                let tx: Transaction = deserialize(&hex::decode(tx_hex).unwrap()).unwrap();
                tx.compute_txid().to_string()
            }
        };
        Ok(Fetched::new(BroadcastReceipt { tx_id }))
    }

    async fn get_transaction_data(
        &self,
        tx_id: &str,
        _options: &CallOptions,
    ) -> BridgeResult<Fetched<TransactionSummary>> {
        self.enter().await?;
        Err(BridgeError::remote(Some(404), format!("{} not found", tx_id)))
    }

    async fn get_block_data(&self, block: &BlockId, _options: &CallOptions) -> BridgeResult<Fetched<BlockSummary>> {
        self.enter().await?;
        Err(BridgeError::remote(Some(404), format!("{} not found", block)))
    }

    async fn get_estimated_fee(
        &self,
        _target_blocks: u32,
        _options: &CallOptions,
    ) -> BridgeResult<Fetched<FeeEstimate>> {
        self.enter().await?;
        Ok(Fetched::new(FeeEstimate {
            rate_per_kilo_byte: self.fee_rate.clone(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Lightning
// ---------------------------------------------------------------------------

/// In-memory remote wallet. Signs with a key it holds, like the real node.
#[derive(Debug)]
pub struct MockLightningRpc {
    pub key: PrivateKey,
    /// Unlock answers consumed in order; when empty `unlock_default` applies.
    pub unlock_script: Mutex<VecDeque<Result<(), RpcFailure>>>,
    pub unlock_default: Result<(), RpcFailure>,
    pub unlock_calls: AtomicU32,
    pub sign_calls: AtomicU32,
    pub utxos: Vec<LnUtxo>,
    pub transactions: Vec<LnTransaction>,
    pub info: LnInfo,
    pub blocks: Vec<(u64, Vec<u8>, Vec<u8>)>,
    pub sat_per_kw: i64,
    pub fee_targets: Mutex<Vec<u32>>,
    pub published: Mutex<Vec<Vec<u8>>>,
    pub publish_error: String,
    /// Replace every returned signature with this DER blob.
    pub forged_signature: Option<Vec<u8>>,
}

impl MockLightningRpc {
    pub fn new(network: Network) -> Self {
        Self {
            key: test_key(network),
            unlock_script: Mutex::new(VecDeque::new()),
            unlock_default: Ok(()),
            unlock_calls: AtomicU32::new(0),
            sign_calls: AtomicU32::new(0),
            utxos: Vec::new(),
            transactions: Vec::new(),
            info: LnInfo {
                identity_pubkey: "02aa".to_string(),
                block_height: 0,
                block_hash: String::new(),
                synced_to_chain: true,
                chains: vec![btc_bridge::lightning::LnChain {
                    chain: "bitcoin".to_string(),
                    network: network.to_string(),
                }],
            },
            blocks: Vec::new(),
            sat_per_kw: 2500,
            fee_targets: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
            publish_error: String::new(),
            forged_signature: None,
        }
    }

    /// Every unlock attempt fails with `code`.
    pub fn never_unlocks(mut self, code: i32) -> Self {
        self.unlock_default = Err(RpcFailure::new(code, "wallet locked"));
        self
    }

    pub fn unlock_answers(self, answers: Vec<Result<(), RpcFailure>>) -> Self {
        *self.unlock_script.lock().unwrap() = answers.into();
        self
    }

    pub fn unlock_count(&self) -> u32 {
        self.unlock_calls.load(Ordering::SeqCst)
    }

    pub fn sign_count(&self) -> u32 {
        self.sign_calls.load(Ordering::SeqCst)
    }

    fn public_key(&self) -> bitcoin::PublicKey {
        self.key.public_key(&Secp256k1::new())
    }
}

#[async_trait]
impl LightningRpc for MockLightningRpc {
    async fn unlock_wallet(&self, _password: &str) -> Result<(), RpcFailure> {
        self.unlock_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.unlock_script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.unlock_default.clone())
    }

    async fn get_info(&self) -> Result<LnInfo, RpcFailure> {
        Ok(self.info.clone())
    }

    async fn list_unspent(&self, _min_confs: i32, _max_confs: i32) -> Result<Vec<LnUtxo>, RpcFailure> {
        Ok(self.utxos.clone())
    }

    async fn publish_transaction(&self, raw_tx: &[u8]) -> Result<LnPublishResponse, RpcFailure> {
        self.published.lock().unwrap().push(raw_tx.to_vec());
        Ok(LnPublishResponse {
            publish_error: self.publish_error.clone(),
        })
    }

    async fn get_transactions(&self) -> Result<Vec<LnTransaction>, RpcFailure> {
        Ok(self.transactions.clone())
    }

    async fn get_block_hash(&self, height: u64) -> Result<Vec<u8>, RpcFailure> {
        self.blocks
            .iter()
            .find(|(h, _, _)| *h == height)
            .map(|(_, hash, _)| hash.clone())
            .ok_or_else(|| RpcFailure::new(2, "block not found"))
    }

    async fn get_block(&self, block_hash: &[u8]) -> Result<Vec<u8>, RpcFailure> {
        self.blocks
            .iter()
            .find(|(_, hash, _)| hash.as_slice() == block_hash)
            .map(|(_, _, raw)| raw.clone())
            .ok_or_else(|| RpcFailure::new(2, "block not found"))
    }

    async fn estimate_fee(&self, conf_target: u32) -> Result<LnFeeEstimate, RpcFailure> {
        self.fee_targets.lock().unwrap().push(conf_target);
        Ok(LnFeeEstimate {
            sat_per_kw: self.sat_per_kw,
        })
    }

    async fn key_for_address(&self, _address: &str) -> Result<Vec<u8>, RpcFailure> {
        Ok(self.public_key().to_bytes())
    }

    async fn sign_output_raw(
        &self,
        tx: &Transaction,
        descriptors: &[SignDescriptor],
    ) -> Result<Vec<Vec<u8>>, RpcFailure> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        let secp = Secp256k1::new();
        descriptors
            .iter()
            .map(|descriptor| -> Result<Vec<u8>, RpcFailure> {
                if let Some(forged) = &self.forged_signature {
                    return Ok(forged.clone());
                }
                let message = script::signature_hash(tx, descriptor.input_index, &descriptor.output)
                    .map_err(|e| RpcFailure::new(2, e.to_string()))?;
                Ok(secp.sign_ecdsa(&message, &self.key.inner).serialize_der().to_vec())
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Clock that returns immediately and counts requested sleeps.
#[derive(Debug, Default)]
pub struct ManualClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
}
