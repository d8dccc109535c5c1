//! Signing strategies and the locally held key variant.

use std::fmt::{self, Debug};

use async_trait::async_trait;
use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::sighash::EcdsaSighashType;
use bitcoin::{ecdsa, Address, CompressedPublicKey, NetworkKind, PrivateKey, PublicKey, Transaction, TxOut};

use crate::error::{BridgeError, BridgeResult};
use crate::lifecycle::CancelToken;
use crate::providers::Network;
use crate::wallet::script;

/// One input the assembler needs signed.
#[derive(Debug, Clone, Copy)]
pub struct SigningRequest<'a> {
    /// Unsigned transaction.
    pub tx: &'a Transaction,
    pub input_index: usize,
    /// Output being spent by `input_index`.
    pub spent_output: &'a TxOut,
}

/// Signature plus the key it claims to be made with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSignature {
    pub public_key: PublicKey,
    pub signature: ecdsa::Signature,
}

/// Produces input signatures for the assembler.
///
/// The assembler validates and finalizes whatever comes back.
#[async_trait]
pub trait SigningStrategy: Send + Sync + Debug {
    /// Address whose outputs are spent and which receives change.
    fn spending_address(&self) -> &Address;

    async fn sign_input(&self, request: SigningRequest<'_>, cancel: &CancelToken) -> BridgeResult<InputSignature>;
}

/// Address type derived from a local key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressKind {
    #[default]
    P2pkh,
    P2wpkh,
}

/// Signs with a private key held in process memory.
pub struct LocalSigner {
    private_key: PrivateKey,
    public_key: PublicKey,
    address: Address,
    secp: Secp256k1<All>,
}

impl LocalSigner {
    /// Build from a WIF key. The key's network must match `network`.
    pub fn from_wif(wif: &str, network: Network, kind: AddressKind) -> BridgeResult<Self> {
        let private_key =
            PrivateKey::from_wif(wif).map_err(|e| BridgeError::Config(format!("Invalid private key: {}", e)))?;
        Self::new(private_key, network, kind)
    }

    pub fn new(private_key: PrivateKey, network: Network, kind: AddressKind) -> BridgeResult<Self> {
        let btc_network = network.to_bitcoin();
        if private_key.network != NetworkKind::from(btc_network) {
            return Err(BridgeError::Config(format!("Private key is not valid for {}", network)));
        }

        let secp = Secp256k1::new();
        let public_key = private_key.public_key(&secp);
        let address = match kind {
            AddressKind::P2pkh => Address::p2pkh(public_key.pubkey_hash(), btc_network),
            AddressKind::P2wpkh => {
                let compressed = CompressedPublicKey::try_from(public_key)
                    .map_err(|e| BridgeError::Config(format!("Segwit address needs a compressed key: {}", e)))?;
                Address::p2wpkh(&compressed, btc_network)
            }
        };

        Ok(Self {
            private_key,
            public_key,
            address,
            secp,
        })
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

impl Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address.to_string())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl SigningStrategy for LocalSigner {
    fn spending_address(&self) -> &Address {
        &self.address
    }

    async fn sign_input(&self, request: SigningRequest<'_>, cancel: &CancelToken) -> BridgeResult<InputSignature> {
        cancel.check()?;
        let message = script::signature_hash(request.tx, request.input_index, request.spent_output)?;
        let signature = self.secp.sign_ecdsa(&message, &self.private_key.inner);

        Ok(InputSignature {
            public_key: self.public_key,
            signature: ecdsa::Signature {
                signature,
                sighash_type: EcdsaSighashType::All,
            },
        })
    }
}
