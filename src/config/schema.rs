//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files. Every
//! section has defaults so a minimal file only lists its providers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::providers::types::Network;

/// Root configuration for the bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// Network every provider must target.
    pub network: Network,

    /// Fallback orchestrator settings.
    pub fallback: FallbackConfig,

    /// Provider definitions, in attempt order.
    pub providers: Vec<ProviderConfig>,

    /// Transaction assembly settings.
    pub wallet: WalletConfig,

    /// Remote wallet unlock policy.
    pub unlock: UnlockConfig,

    /// HTTP transport settings.
    pub transport: TransportConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

/// Fallback orchestrator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Randomize provider order on every call.
    pub shuffle: bool,

    /// Per-attempt deadline in seconds (0 = none).
    pub attempt_timeout_secs: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            shuffle: false,
            attempt_timeout_secs: 30,
        }
    }
}

/// One HTTP-reachable provider.
#[derive(Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Block-explorer REST API.
    Explorer {
        name: String,
        /// Override for the API root (defaults to the public endpoint).
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        token: Option<String>,
    },
    /// Full node JSON-RPC.
    JsonRpc {
        name: String,
        url: String,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        password: Option<String>,
    },
}

impl ProviderConfig {
    pub fn name(&self) -> &str {
        match self {
            ProviderConfig::Explorer { name, .. } | ProviderConfig::JsonRpc { name, .. } => name,
        }
    }
}

// Credentials stay out of logs.
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderConfig::Explorer { name, base_url, token } => f
                .debug_struct("Explorer")
                .field("name", name)
                .field("base_url", base_url)
                .field("token", &token.as_ref().map(|_| "<redacted>"))
                .finish(),
            ProviderConfig::JsonRpc { name, url, username, password } => f
                .debug_struct("JsonRpc")
                .field("name", name)
                .field("url", &crate::providers::json_rpc::redact_url(url))
                .field("username", username)
                .field("password", &password.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}

/// Transaction assembly configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Default confirmation target for fee estimates (1..=1008).
    pub fee_target_blocks: u32,

    /// Assumed size of a one-input, two-output transaction, in kB.
    pub assumed_tx_size_kb: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            fee_target_blocks: 2,
            assumed_tx_size_kb: "0.234375".to_string(),
        }
    }
}

/// Wallet unlock retry policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UnlockConfig {
    /// Attempts before the unlock machine fails.
    pub max_attempts: u32,

    /// Delay between attempts in milliseconds.
    pub retry_delay_ms: u64,
}

impl Default for UnlockConfig {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            retry_delay_ms: 500,
        }
    }
}

/// HTTP transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// User-Agent header sent to backends.
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 15,
            user_agent: concat!("btc-bridge/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}
