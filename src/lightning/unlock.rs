//! Wallet unlock state machine.
//!
//! ```text
//! Locked ──attempt──▶ Unlocking{n} ──ok / already unlocked──▶ Unlocked
//!                         │  ▲
//!                    error│  │retry after delay
//!                         ▼  │
//!                     n == max_attempts ──▶ Failed{n}
//! ```
//!
//! `Unlocked` and `Failed` are terminal. Only [`WalletUnlocker::reset`]
//! leaves `Failed`. A cancelled unlock returns to `Locked`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::config::schema::UnlockConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::lifecycle::{CancelToken, Clock, TokioClock};
use crate::lightning::rpc::{LightningRpc, CODE_ALREADY_UNLOCKED};
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockState {
    Locked,
    Unlocking { attempts: u32 },
    Unlocked,
    Failed { attempts: u32 },
}

/// Bounded fixed-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnlockPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for UnlockPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            retry_delay: Duration::from_millis(500),
        }
    }
}

impl From<&UnlockConfig> for UnlockPolicy {
    fn from(config: &UnlockConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

/// Drives the remote wallet to `Unlocked`, once, for every user of the RPC.
pub struct WalletUnlocker {
    rpc: Arc<dyn LightningRpc>,
    password: String,
    policy: UnlockPolicy,
    clock: Arc<dyn Clock>,
    state: Mutex<UnlockState>,
}

impl WalletUnlocker {
    pub fn new(rpc: Arc<dyn LightningRpc>, password: impl Into<String>) -> Self {
        Self {
            rpc,
            password: password.into(),
            policy: UnlockPolicy::default(),
            clock: Arc::new(TokioClock),
            state: Mutex::new(UnlockState::Locked),
        }
    }

    pub fn with_policy(mut self, policy: UnlockPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn rpc(&self) -> &Arc<dyn LightningRpc> {
        &self.rpc
    }

    pub async fn state(&self) -> UnlockState {
        *self.state.lock().await
    }

    /// Leave `Failed` so the next call attempts an unlock again.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        if let UnlockState::Failed { .. } = *state {
            tracing::info!("Wallet unlock state reset by caller");
            *state = UnlockState::Locked;
        }
    }

    /// Return once the wallet is unlocked.
    ///
    /// Concurrent callers wait on the same attempt sequence. A caller whose
    /// token fires while waiting returns `Cancelled` without touching the state.
    pub async fn ensure_unlocked(&self, cancel: &CancelToken) -> BridgeResult<()> {
        let mut state = cancel.run(self.state.lock()).await?;
        match *state {
            UnlockState::Unlocked => return Ok(()),
            UnlockState::Failed { attempts } => return Err(BridgeError::UnlockTimeout { attempts }),
            UnlockState::Locked | UnlockState::Unlocking { .. } => {}
        }

        let mut attempts = 0;
        loop {
            attempts += 1;
            *state = UnlockState::Unlocking { attempts };

            match cancel.run(self.rpc.unlock_wallet(&self.password)).await {
                Err(_) => {
                    *state = UnlockState::Locked;
                    return Err(BridgeError::Cancelled);
                }
                Ok(Ok(())) => {
                    metrics::record_unlock_attempt("unlocked");
                    tracing::info!(attempts, "Wallet unlocked");
                    *state = UnlockState::Unlocked;
                    return Ok(());
                }
                Ok(Err(failure)) if failure.code == CODE_ALREADY_UNLOCKED => {
                    metrics::record_unlock_attempt("already_unlocked");
                    tracing::debug!(attempts, "Wallet already unlocked");
                    *state = UnlockState::Unlocked;
                    return Ok(());
                }
                Ok(Err(failure)) => {
                    metrics::record_unlock_attempt("error");
                    tracing::debug!(attempts, error = %failure, "Wallet unlock attempt failed");
                }
            }

            if attempts >= self.policy.max_attempts {
                tracing::error!(attempts, "Unable to unlock wallet");
                *state = UnlockState::Failed { attempts };
                return Err(BridgeError::UnlockTimeout { attempts });
            }

            if cancel.run(self.clock.sleep(self.policy.retry_delay)).await.is_err() {
                *state = UnlockState::Locked;
                return Err(BridgeError::Cancelled);
            }
        }
    }
}

impl fmt::Debug for WalletUnlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletUnlocker")
            .field("rpc", &self.rpc)
            .field("password", &"<redacted>")
            .field("policy", &self.policy)
            .finish()
    }
}
