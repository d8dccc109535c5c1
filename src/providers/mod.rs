//! Provider capability contract, adapters and failover.
//!
//! # Data Flow
//! ```text
//! caller
//!     → fallback.rs (FallbackProvider: order strategy, one attempt per adapter,
//!                    ordered failure aggregation)
//!     → adapter:
//!         explorer.rs  (block-explorer REST over Transport)
//!         json_rpc.rs  (full node JSON-RPC over Transport)
//!         lightning.rs (LightningRpc collaborator, behind the unlock machine)
//!     → units (normalizer)
//!     → Fetched<T> { canonical value, optional raw payload }
//! ```
//!
//! `factory.rs` builds the HTTP adapters and the orchestrator from config.

pub mod explorer;
pub mod factory;
pub mod fallback;
pub mod json_rpc;
pub mod lightning;
pub mod strategy;
pub mod types;

use std::fmt::Debug;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::{BridgeError, BridgeResult};
use crate::lifecycle::CancelToken;

pub use explorer::ExplorerProvider;
pub use fallback::FallbackProvider;
pub use json_rpc::JsonRpcProvider;
pub use lightning::LightningProvider;
pub use strategy::{AttemptStrategy, Sequential, Shuffled};
pub use types::{
    BlockId, BlockSummary, BroadcastReceipt, FeeEstimate, Network, TransactionSummary, UnspentOutput,
};

/// Lowest accepted confirmation target.
pub const MIN_TARGET_BLOCKS: u32 = 1;
/// Highest accepted confirmation target.
pub const MAX_TARGET_BLOCKS: u32 = 1008;

/// Per-call options shared by every operation.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Also return the untouched backend payload.
    pub with_raw: bool,
    pub cancel: CancelToken,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(mut self) -> Self {
        self.with_raw = true;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Backend-native payload kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawPayload {
    pub provider: String,
    pub endpoint: String,
    pub body: Value,
}

/// A normalized result, optionally with the payload it came from.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub value: T,
    pub raw: Option<RawPayload>,
}

impl<T> Fetched<T> {
    pub fn new(value: T) -> Self {
        Self { value, raw: None }
    }

    /// Attach `body` only when the caller asked for it.
    pub fn with_body(value: T, options: &CallOptions, provider: &str, endpoint: &str, body: Value) -> Self {
        let raw = options.with_raw.then(|| RawPayload {
            provider: provider.to_string(),
            endpoint: endpoint.to_string(),
            body,
        });
        Self { value, raw }
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// The operation set every adapter and the orchestrator implement.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Short adapter name used in failure reports.
    fn name(&self) -> &str;

    /// Public endpoint, credentials removed.
    fn endpoint(&self) -> &str;

    fn network(&self) -> Network;

    async fn get_unspent_outputs(
        &self,
        address: &str,
        options: &CallOptions,
    ) -> BridgeResult<Fetched<Vec<UnspentOutput>>>;

    async fn broadcast_transaction(
        &self,
        tx_hex: &str,
        options: &CallOptions,
    ) -> BridgeResult<Fetched<BroadcastReceipt>>;

    async fn get_transaction_data(
        &self,
        tx_id: &str,
        options: &CallOptions,
    ) -> BridgeResult<Fetched<TransactionSummary>>;

    async fn get_block_data(&self, block: &BlockId, options: &CallOptions) -> BridgeResult<Fetched<BlockSummary>>;

    async fn get_estimated_fee(
        &self,
        target_blocks: u32,
        options: &CallOptions,
    ) -> BridgeResult<Fetched<FeeEstimate>>;
}

/// Reject confirmation targets outside `1..=1008`.
pub fn validate_target(target_blocks: u32) -> BridgeResult<u32> {
    if (MIN_TARGET_BLOCKS..=MAX_TARGET_BLOCKS).contains(&target_blocks) {
        Ok(target_blocks)
    } else {
        Err(BridgeError::InvalidInput(format!(
            "Invalid fee estimation block count, must be >= {} and <= {}",
            MIN_TARGET_BLOCKS, MAX_TARGET_BLOCKS
        )))
    }
}
