//! UTXO blockchain provider abstraction.
//!
//! # Architecture Overview
//!
//! ```text
//!     host process
//!         │
//!         ├──▶ providers::FallbackProvider ──▶ explorer / json_rpc / lightning adapters
//!         │         (ordered failover)              │            │             │
//!         │                                     transport    transport    lightning::WalletUnlocker
//!         │                                          └──────▶ units ◀───────────┘
//!         │
//!         └──▶ wallet::TransactionAssembler ──▶ Provider (utxos, fee, broadcast)
//!                                           └─▶ SigningStrategy (LocalSigner | RemoteSigner)
//!
//!     cross-cutting: config, error, lifecycle (cancel, clock), observability
//! ```

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod lightning;
pub mod observability;
pub mod providers;
pub mod transport;
pub mod units;
pub mod wallet;

pub use config::schema::BridgeConfig;
pub use error::{BridgeError, BridgeResult, ProviderFailure};
pub use lifecycle::CancelToken;
pub use providers::{CallOptions, Fetched, FallbackProvider, Network, Provider};
pub use wallet::{AssembleRequest, AssembledTransaction, FeePolicy, TransactionAssembler};
