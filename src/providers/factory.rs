//! Builds the HTTP adapters and the fallback orchestrator from configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::config::schema::{BridgeConfig, ProviderConfig};
use crate::error::BridgeResult;
use crate::providers::strategy::{AttemptStrategy, Sequential, Shuffled};
use crate::providers::{ExplorerProvider, FallbackProvider, JsonRpcProvider, Provider};
use crate::providers::types::Network;
use crate::transport::Transport;

/// Build one adapter per configured provider, in file order.
pub fn build_providers(config: &BridgeConfig, transport: Arc<dyn Transport>) -> BridgeResult<Vec<Arc<dyn Provider>>> {
    config
        .providers
        .iter()
        .map(|entry| build_provider(config.network, entry, Arc::clone(&transport)))
        .collect()
}

pub fn build_provider(
    network: Network,
    entry: &ProviderConfig,
    transport: Arc<dyn Transport>,
) -> BridgeResult<Arc<dyn Provider>> {
    let provider: Arc<dyn Provider> = match entry {
        ProviderConfig::Explorer { name, base_url, token } => {
            let mut explorer = match base_url {
                Some(url) => ExplorerProvider::with_base_url(network, url, transport)?,
                None => ExplorerProvider::new(network, transport)?,
            };
            if let Some(token) = token {
                explorer = explorer.with_token(token.clone());
            }
            Arc::new(explorer.with_name(name.clone()))
        }
        ProviderConfig::JsonRpc { name, url, username, password } => {
            let mut node = JsonRpcProvider::new(network, url, transport)?;
            if let (Some(username), Some(password)) = (username, password) {
                node = node.with_credentials(username, password);
            }
            Arc::new(node.with_name(name.clone()))
        }
    };
    tracing::debug!(provider = entry.name(), %network, "Provider configured");
    Ok(provider)
}

/// Wrap `providers` (configured ones plus any extra, e.g. a Lightning
/// adapter) in a fallback orchestrator using the configured policy.
pub fn build_orchestrator(config: &BridgeConfig, providers: Vec<Arc<dyn Provider>>) -> BridgeResult<FallbackProvider> {
    let strategy: Arc<dyn AttemptStrategy> = if config.fallback.shuffle {
        Arc::new(Shuffled)
    } else {
        Arc::new(Sequential)
    };
    let orchestrator = FallbackProvider::new(providers, strategy)?;
    Ok(match config.fallback.attempt_timeout_secs {
        0 => orchestrator,
        secs => orchestrator.with_attempt_timeout(Duration::from_secs(secs)),
    })
}
