//! Transaction assembly: input selection, fee resolution, output
//! construction, signing, validation and optional broadcast.

use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode::serialize_hex;
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use serde::Serialize;

use crate::config::schema::WalletConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::lifecycle::CancelToken;
use crate::observability::metrics;
use crate::providers::{validate_target, CallOptions, Provider, UnspentOutput};
use crate::units::amount::coins_to_sats;
use crate::wallet::script;
use crate::wallet::signer::{SigningRequest, SigningStrategy};

/// Largest payload relayed in a data-carrier output by standard policy.
pub const MAX_DATA_CARRIER_BYTES: usize = 80;

/// Confirmation target used when the caller does not pick one.
pub const DEFAULT_TARGET_BLOCKS: u32 = 2;

/// How the absolute fee is obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum FeePolicy {
    /// Absolute fee in coins.
    Explicit(BigDecimal),
    /// Rate estimate for a confirmation target, times the assumed size.
    Estimate { target_blocks: u32 },
}

impl Default for FeePolicy {
    fn default() -> Self {
        FeePolicy::Estimate {
            target_blocks: DEFAULT_TARGET_BLOCKS,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssembleRequest {
    /// Payload for the data-carrier output.
    pub data: Vec<u8>,
    pub fee: FeePolicy,
    pub broadcast: bool,
}

impl AssembleRequest {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    pub fn with_fee(mut self, fee: FeePolicy) -> Self {
        self.fee = fee;
        self
    }

    pub fn broadcast(mut self, broadcast: bool) -> Self {
        self.broadcast = broadcast;
        self
    }
}

/// Signed transaction ready for the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssembledTransaction {
    pub id: String,
    pub hex: String,
}

/// Builds single-input transactions embedding application data.
#[derive(Debug, Clone)]
pub struct TransactionAssembler {
    provider: Arc<dyn Provider>,
    signer: Arc<dyn SigningStrategy>,
    tx_size_kb: BigDecimal,
    default_fee: FeePolicy,
}

impl TransactionAssembler {
    pub fn new(provider: Arc<dyn Provider>, signer: Arc<dyn SigningStrategy>) -> Self {
        Self {
            provider,
            signer,
            tx_size_kb: default_tx_size_kb(),
            default_fee: FeePolicy::default(),
        }
    }

    pub fn from_config(
        provider: Arc<dyn Provider>,
        signer: Arc<dyn SigningStrategy>,
        config: &WalletConfig,
    ) -> BridgeResult<Self> {
        let size = BigDecimal::from_str(&config.assumed_tx_size_kb)
            .map_err(|e| BridgeError::Config(format!("Invalid assumed_tx_size_kb: {}", e)))?;
        let mut assembler = Self::new(provider, signer).with_tx_size_kb(size);
        assembler.default_fee = FeePolicy::Estimate {
            target_blocks: validate_target(config.fee_target_blocks)?,
        };
        Ok(assembler)
    }

    pub fn with_tx_size_kb(mut self, size_kb: BigDecimal) -> Self {
        self.tx_size_kb = size_kb;
        self
    }

    /// Request for `data` using the configured fee policy.
    pub fn request(&self, data: impl Into<Vec<u8>>) -> AssembleRequest {
        AssembleRequest::new(data).with_fee(self.default_fee.clone())
    }

    pub async fn assemble(&self, request: &AssembleRequest, cancel: &CancelToken) -> BridgeResult<AssembledTransaction> {
        cancel.check()?;
        if request.data.len() > MAX_DATA_CARRIER_BYTES {
            return Err(BridgeError::InvalidInput(format!(
                "Data payload is {} bytes, at most {} can be embedded",
                request.data.len(),
                MAX_DATA_CARRIER_BYTES
            )));
        }
        if let FeePolicy::Estimate { target_blocks } = request.fee {
            validate_target(target_blocks)?;
        }
        let options = CallOptions::new().with_cancel(cancel.clone());
        let address = self.signer.spending_address().clone();

        // 1. Input selection
        let utxos = self
            .provider
            .get_unspent_outputs(&address.to_string(), &options)
            .await?
            .into_value();
        let selected = select_largest(utxos)?;

        // 2. Fee resolution
        let fee = self.resolve_fee(&request.fee, &options).await?;
        if selected.amount < fee {
            return Err(BridgeError::InsufficientFunds(
                "No outputs with sufficient funds available".to_string(),
            ));
        }

        // 3. Output construction
        let change_sats = coins_to_sats(&(&selected.amount - &fee))?;
        let spent_output = TxOut {
            value: Amount::from_sat(coins_to_sats(&selected.amount)?),
            script_pubkey: selected.script.clone().unwrap_or_else(|| address.script_pubkey()),
        };
        let source_txid = Txid::from_str(&selected.source_tx_id).map_err(|e| {
            BridgeError::remote(None, format!("Invalid source transaction id '{}': {}", selected.source_tx_id, e))
        })?;

        let mut tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::new(source_txid, selected.output_index),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![
                TxOut {
                    value: Amount::ZERO,
                    script_pubkey: script::data_carrier_script(&request.data)?,
                },
                TxOut {
                    value: Amount::from_sat(change_sats),
                    script_pubkey: address.script_pubkey(),
                },
            ],
        };

        let signature = self
            .signer
            .sign_input(
                SigningRequest {
                    tx: &tx,
                    input_index: 0,
                    spent_output: &spent_output,
                },
                cancel,
            )
            .await?;
        script::verify_input_signature(&tx, 0, &spent_output, &signature)?;
        script::finalize_input(&mut tx, 0, &spent_output, &signature)?;

        let assembled = AssembledTransaction {
            id: tx.compute_txid().to_string(),
            hex: serialize_hex(&tx),
        };
        tracing::info!(
            tx_id = %assembled.id,
            input = %selected.source_tx_id,
            fee = %fee,
            change_sats,
            "Transaction assembled"
        );

        if request.broadcast {
            let receipt = self
                .provider
                .broadcast_transaction(&assembled.hex, &options)
                .await?
                .into_value();
            if receipt.tx_id != assembled.id {
                return Err(BridgeError::remote(
                    None,
                    format!("Broadcast returned id {} for transaction {}", receipt.tx_id, assembled.id),
                ));
            }
        }
        metrics::record_transaction_assembled(request.broadcast);

        Ok(assembled)
    }

    async fn resolve_fee(&self, policy: &FeePolicy, options: &CallOptions) -> BridgeResult<BigDecimal> {
        match policy {
            FeePolicy::Explicit(fee) => {
                if *fee < BigDecimal::from(0) {
                    return Err(BridgeError::InvalidInput(format!("Fee must not be negative, got {}", fee)));
                }
                Ok(fee.clone())
            }
            FeePolicy::Estimate { target_blocks } => {
                let estimate = self
                    .provider
                    .get_estimated_fee(*target_blocks, options)
                    .await?
                    .into_value();
                Ok(estimate.fee_for(&self.tx_size_kb))
            }
        }
    }
}

/// 240 bytes, expressed in 1024-byte kB.
fn default_tx_size_kb() -> BigDecimal {
    BigDecimal::from(240) / BigDecimal::from(1024)
}

fn select_largest(mut utxos: Vec<UnspentOutput>) -> BridgeResult<UnspentOutput> {
    utxos.sort_by(|a, b| b.amount.cmp(&a.amount));
    utxos.into_iter().next().ok_or_else(|| {
        BridgeError::InsufficientFunds("No unspent outputs available, balance likely 0".to_string())
    })
}
