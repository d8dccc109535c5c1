//! Data-carrier (provably unspendable) output detection.
//!
//! Backends mark these outputs differently: the explorer reports a
//! `null-data` script type, nodes report `nulldata` and an `OP_RETURN ...`
//! assembly string, and raw transactions only carry the script bytes. Each
//! detector returns the hex payload of a single output; [`first_payload`]
//! scans an output list.

use bitcoin::script::Instruction;
use bitcoin::{Script, ScriptBuf};

/// Assembly prefix used by nodes for data-carrier outputs.
const ASM_PREFIX: &str = "OP_RETURN ";

/// Return the payload of the first output a detector accepts.
pub fn first_payload<'a, T, F>(outputs: impl IntoIterator<Item = &'a T>, detect: F) -> Option<String>
where
    T: 'a,
    F: Fn(&T) -> Option<String>,
{
    outputs.into_iter().find_map(detect)
}

/// Detect by a reported script type tag.
///
/// A tagged output whose payload was not reported yields `None` so callers
/// can fall back to the script bytes.
pub fn from_type_tag(script_type: Option<&str>, expected: &str, payload_hex: Option<&str>) -> Option<String> {
    match script_type {
        Some(tag) if tag == expected => payload_hex.map(str::to_string),
        _ => None,
    }
}

/// Detect from a node-rendered assembly string such as `OP_RETURN 68656c6c6f`.
pub fn from_asm(asm: &str) -> Option<String> {
    asm.strip_prefix(ASM_PREFIX).map(|rest| rest.trim().to_string())
}

/// Detect from a hex-encoded script. Undecodable hex is not a carrier.
pub fn from_script_hex(script_hex: &str) -> Option<String> {
    ScriptBuf::from_hex(script_hex).ok().and_then(|script| from_script(&script))
}

/// Detect from raw script bytes by the leading `OP_RETURN` opcode.
pub fn from_script(script: &Script) -> Option<String> {
    if !script.is_op_return() {
        return None;
    }
    let mut payload = Vec::new();
    for instruction in script.instructions().skip(1) {
        match instruction {
            Ok(Instruction::PushBytes(bytes)) => payload.extend_from_slice(bytes.as_bytes()),
            Ok(Instruction::Op(_)) => {}
            Err(_) => break,
        }
    }
    Some(hex::encode(payload))
}
