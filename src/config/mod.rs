//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, all errors at once)
//!     → BridgeConfig (validated, immutable)
//!     → providers::factory builds adapters + orchestrator from it
//! ```

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BridgeConfig, FallbackConfig, ObservabilityConfig, ProviderConfig, TransportConfig, UnlockConfig,
    WalletConfig,
};
