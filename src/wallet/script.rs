//! Spend-script handling: sighash, signature validation and finalization.

use bitcoin::blockdata::opcodes;
use bitcoin::hashes::Hash;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::secp256k1::{Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{Script, ScriptBuf, Transaction, TxOut, Witness};

use crate::error::{BridgeError, BridgeResult};
use crate::wallet::signer::InputSignature;

/// Output script kinds this crate can spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpendKind {
    /// Legacy pay-to-pubkey-hash, signed into `scriptSig`.
    P2pkh,
    /// Native segwit v0 pay-to-witness-pubkey-hash, signed into the witness.
    P2wpkh,
}

impl SpendKind {
    pub fn of(script: &Script) -> BridgeResult<Self> {
        if script.is_p2pkh() {
            Ok(SpendKind::P2pkh)
        } else if script.is_p2wpkh() {
            Ok(SpendKind::P2wpkh)
        } else {
            Err(BridgeError::InvalidInput(format!(
                "Unsupported spending script {}",
                script.to_hex_string()
            )))
        }
    }
}

/// Provably unspendable output script carrying `data`.
pub fn data_carrier_script(data: &[u8]) -> BridgeResult<ScriptBuf> {
    let push = PushBytesBuf::try_from(data.to_vec())
        .map_err(|_| BridgeError::InvalidInput(format!("Data too large to embed: {} bytes", data.len())))?;
    Ok(Builder::new()
        .push_opcode(opcodes::all::OP_RETURN)
        .push_slice(&push)
        .into_script())
}

/// `SIGHASH_ALL` message for one input.
pub fn signature_hash(tx: &Transaction, input_index: usize, spent: &TxOut) -> BridgeResult<Message> {
    let mut cache = SighashCache::new(tx);
    let digest = match SpendKind::of(&spent.script_pubkey)? {
        SpendKind::P2pkh => cache
            .legacy_signature_hash(input_index, &spent.script_pubkey, EcdsaSighashType::All.to_u32())
            .map_err(|e| BridgeError::Signature(format!("Failed to compute sighash: {}", e)))?
            .to_byte_array(),
        SpendKind::P2wpkh => cache
            .p2wpkh_signature_hash(input_index, &spent.script_pubkey, spent.value, EcdsaSighashType::All)
            .map_err(|e| BridgeError::Signature(format!("Failed to compute sighash: {}", e)))?
            .to_byte_array(),
    };
    Ok(Message::from_digest(digest))
}

/// Check that `signature` satisfies the spent output for `input_index`.
pub fn verify_input_signature(
    tx: &Transaction,
    input_index: usize,
    spent: &TxOut,
    signature: &InputSignature,
) -> BridgeResult<()> {
    if signature.signature.sighash_type != EcdsaSighashType::All {
        return Err(BridgeError::Signature(format!(
            "Unexpected sighash type {}",
            signature.signature.sighash_type
        )));
    }

    let expected_script = match SpendKind::of(&spent.script_pubkey)? {
        SpendKind::P2pkh => ScriptBuf::new_p2pkh(&signature.public_key.pubkey_hash()),
        SpendKind::P2wpkh => {
            let hash = signature
                .public_key
                .wpubkey_hash()
                .map_err(|e| BridgeError::Signature(format!("Key cannot spend segwit output: {}", e)))?;
            ScriptBuf::new_p2wpkh(&hash)
        }
    };
    if expected_script != spent.script_pubkey {
        return Err(BridgeError::Signature(
            "Public key does not control the spent output".to_string(),
        ));
    }

    let message = signature_hash(tx, input_index, spent)?;
    Secp256k1::verification_only()
        .verify_ecdsa(&message, &signature.signature.signature, &signature.public_key.inner)
        .map_err(|_| BridgeError::Signature("Signature is not valid".to_string()))
}

/// Place a validated signature into the input.
pub fn finalize_input(
    tx: &mut Transaction,
    input_index: usize,
    spent: &TxOut,
    signature: &InputSignature,
) -> BridgeResult<()> {
    let kind = SpendKind::of(&spent.script_pubkey)?;
    let input = tx
        .input
        .get_mut(input_index)
        .ok_or_else(|| BridgeError::InvalidInput(format!("No input at index {}", input_index)))?;

    match kind {
        SpendKind::P2pkh => {
            let sig = PushBytesBuf::try_from(signature.signature.to_vec())
                .map_err(|_| BridgeError::Signature("Signature too large".to_string()))?;
            input.script_sig = Builder::new()
                .push_slice(&sig)
                .push_key(&signature.public_key)
                .into_script();
        }
        SpendKind::P2wpkh => {
            let mut witness = Witness::new();
            witness.push(signature.signature.to_vec());
            witness.push(signature.public_key.to_bytes());
            input.witness = witness;
        }
    }
    Ok(())
}
