//! Remote-delegated signing through the Lightning wallet.
//!
//! The key never leaves the remote wallet. Each signature costs an unlock
//! check, a public key lookup for the spending address and one raw signing
//! call; the returned DER signature gets the `SIGHASH_ALL` byte appended here.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bitcoin::sighash::EcdsaSighashType;
use bitcoin::{ecdsa, Address, PublicKey};

use crate::error::{BridgeError, BridgeResult};
use crate::lifecycle::CancelToken;
use crate::lightning::{SignDescriptor, UnlockState, WalletUnlocker};
use crate::providers::Network;
use crate::wallet::signer::{InputSignature, SigningRequest, SigningStrategy};

pub struct RemoteSigner {
    address: Address,
    unlocker: Arc<WalletUnlocker>,
}

impl RemoteSigner {
    pub fn new(address: &str, network: Network, unlocker: Arc<WalletUnlocker>) -> BridgeResult<Self> {
        let address = Address::from_str(address)
            .map_err(|e| BridgeError::Config(format!("Invalid spending address '{}': {}", address, e)))?
            .require_network(network.to_bitcoin())
            .map_err(|e| BridgeError::Config(format!("Spending address is not valid for {}: {}", network, e)))?;
        Ok(Self { address, unlocker })
    }

    pub async fn unlock_state(&self) -> UnlockState {
        self.unlocker.state().await
    }

    /// Allow unlocking again after a `Failed` unlock.
    pub async fn reset_unlock(&self) {
        self.unlocker.reset().await;
    }
}

impl fmt::Debug for RemoteSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSigner")
            .field("address", &self.address.to_string())
            .field("unlocker", &self.unlocker)
            .finish()
    }
}

#[async_trait]
impl SigningStrategy for RemoteSigner {
    fn spending_address(&self) -> &Address {
        &self.address
    }

    async fn sign_input(&self, request: SigningRequest<'_>, cancel: &CancelToken) -> BridgeResult<InputSignature> {
        self.unlocker.ensure_unlocked(cancel).await?;
        let rpc = self.unlocker.rpc();

        let address = self.address.to_string();
        let key_bytes = cancel
            .run(rpc.key_for_address(&address))
            .await?
            .map_err(|f| f.into_bridge("keyForAddress"))?;
        let public_key = PublicKey::from_slice(&key_bytes)
            .map_err(|e| BridgeError::Signature(format!("Remote wallet returned an invalid public key: {}", e)))?;

        let descriptor = SignDescriptor {
            public_key,
            output: request.spent_output.clone(),
            input_index: request.input_index,
            sighash: EcdsaSighashType::All,
        };
        let signatures = cancel
            .run(rpc.sign_output_raw(request.tx, std::slice::from_ref(&descriptor)))
            .await?
            .map_err(|f| f.into_bridge("signOutputRaw"))?;

        let mut raw = signatures
            .into_iter()
            .next()
            .ok_or_else(|| BridgeError::Signature("Remote wallet returned no signature".to_string()))?;
        raw.push(EcdsaSighashType::All.to_u32() as u8);
        let signature = ecdsa::Signature::from_slice(&raw)
            .map_err(|e| BridgeError::Signature(format!("Remote wallet returned an invalid signature: {}", e)))?;

        tracing::debug!(address = %address, input = request.input_index, "Input signed by remote wallet");
        Ok(InputSignature { public_key, signature })
    }
}
