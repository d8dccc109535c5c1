//! Fallback orchestrator over a list of homogeneous-network providers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{BridgeError, BridgeResult, ProviderFailure};
use crate::observability::metrics;
use crate::providers::strategy::{AttemptStrategy, Sequential, Shuffled};
use crate::providers::types::{BlockId, BlockSummary, BroadcastReceipt, FeeEstimate, Network, TransactionSummary, UnspentOutput};
use crate::providers::{validate_target, CallOptions, Fetched, Provider};

/// Tries each provider once per call, in the strategy's order, and returns
/// the first success. When all fail the error is [`BridgeError::Aggregate`]
/// with one entry per provider in attempt order.
#[derive(Debug, Clone)]
pub struct FallbackProvider {
    providers: Vec<Arc<dyn Provider>>,
    strategy: Arc<dyn AttemptStrategy>,
    attempt_timeout: Option<Duration>,
    network: Network,
    endpoint: String,
}

impl FallbackProvider {
    /// Fails with [`BridgeError::Config`] on an empty list or mixed networks.
    pub fn new(providers: Vec<Arc<dyn Provider>>, strategy: Arc<dyn AttemptStrategy>) -> BridgeResult<Self> {
        let network = match providers.first() {
            Some(first) => first.network(),
            None => {
                return Err(BridgeError::Config(
                    "No providers specified for fallback provider".to_string(),
                ))
            }
        };
        if providers.iter().any(|p| p.network() != network) {
            return Err(BridgeError::Config(
                "Providers must all be configured to use the same network within the fallback provider".to_string(),
            ));
        }

        let endpoint = providers.iter().map(|p| p.endpoint()).collect::<Vec<_>>().join(",");
        tracing::debug!(providers = providers.len(), %network, "Fallback provider initialized");

        Ok(Self {
            providers,
            strategy,
            attempt_timeout: None,
            network,
            endpoint,
        })
    }

    pub fn sequential(providers: Vec<Arc<dyn Provider>>) -> BridgeResult<Self> {
        Self::new(providers, Arc::new(Sequential))
    }

    pub fn shuffled(providers: Vec<Arc<dyn Provider>>) -> BridgeResult<Self> {
        Self::new(providers, Arc::new(Shuffled))
    }

    /// Bound every single attempt; an expired attempt counts as a network failure.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    async fn attempt<T, F, Fut>(&self, operation: &'static str, options: &CallOptions, call: F) -> BridgeResult<T>
    where
        F: Fn(Arc<dyn Provider>) -> Fut,
        Fut: Future<Output = BridgeResult<T>>,
    {
        options.cancel.check()?;

        let order = self.strategy.order(self.providers.len());
        let mut failures = Vec::with_capacity(order.len());

        for idx in order {
            let provider = Arc::clone(&self.providers[idx]);
            let pending = call(Arc::clone(&provider));

            let outcome = match self.attempt_timeout {
                Some(limit) => match options.cancel.run(tokio::time::timeout(limit, pending)).await? {
                    Ok(result) => result,
                    Err(_) => Err(BridgeError::network(
                        operation,
                        format!("timed out after {}ms", limit.as_millis()),
                    )),
                },
                None => options.cancel.run(pending).await?,
            };

            match outcome {
                Ok(value) => {
                    metrics::record_provider_attempt(provider.name(), operation, true);
                    return Ok(value);
                }
                Err(BridgeError::Cancelled) => return Err(BridgeError::Cancelled),
                Err(error) => {
                    metrics::record_provider_attempt(provider.name(), operation, false);
                    tracing::warn!(
                        provider = provider.name(),
                        endpoint = provider.endpoint(),
                        operation,
                        error = %error,
                        "Provider failed, trying next provider"
                    );
                    failures.push(ProviderFailure {
                        provider: provider.name().to_string(),
                        endpoint: provider.endpoint().to_string(),
                        error,
                    });
                }
            }
        }

        tracing::error!(operation, attempts = failures.len(), "All providers failed");
        Err(BridgeError::Aggregate(failures))
    }
}

#[async_trait]
impl Provider for FallbackProvider {
    fn name(&self) -> &str {
        "fallback"
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
        self.attempt("getUnspentOutputs", options, |p| async move {
            p.get_unspent_outputs(address, options).await
        })
        .await
    }

    async fn broadcast_transaction(
        &self,
        tx_hex: &str,
        options: &CallOptions,
    ) -> BridgeResult<Fetched<BroadcastReceipt>> {
        self.attempt("broadcastTransaction", options, |p| async move {
            p.broadcast_transaction(tx_hex, options).await
        })
        .await
    }

    async fn get_transaction_data(
        &self,
        tx_id: &str,
        options: &CallOptions,
    ) -> BridgeResult<Fetched<TransactionSummary>> {
        self.attempt("getTransactionData", options, |p| async move {
            p.get_transaction_data(tx_id, options).await
        })
        .await
    }

    async fn get_block_data(&self, block: &BlockId, options: &CallOptions) -> BridgeResult<Fetched<BlockSummary>> {
        self.attempt("getBlockData", options, |p| async move { p.get_block_data(block, options).await })
            .await
    }

    async fn get_estimated_fee(
        &self,
        target_blocks: u32,
        options: &CallOptions,
    ) -> BridgeResult<Fetched<FeeEstimate>> {
        // a bad target is the caller's mistake, not a provider failure
        let target_blocks = validate_target(target_blocks)?;
        self.attempt("getEstimatedFee", options, |p| async move {
            p.get_estimated_fee(target_blocks, options).await
        })
        .await
    }
}
