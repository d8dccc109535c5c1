//! Remote Lightning wallet collaborator.
//!
//! # Data Flow
//! ```text
//! LightningProvider / RemoteSigner
//!     → unlock.rs (WalletUnlocker: Locked → Unlocking → Unlocked | Failed)
//!     → rpc.rs    (LightningRpc trait, implemented by the host's RPC client)
//!     → remote wallet process (holds the keys)
//! ```

pub mod rpc;
pub mod unlock;

pub use rpc::{
    LightningRpc, LnChain, LnFeeEstimate, LnInfo, LnPublishResponse, LnTransaction, LnUtxo, RpcFailure, SignDescriptor,
};
pub use unlock::{UnlockPolicy, UnlockState, WalletUnlocker};
