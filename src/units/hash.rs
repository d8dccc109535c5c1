//! Hash byte-order helpers.

/// Reverse the byte order of a hex-encoded hash.
///
/// Odd-length or non-hex input is returned unchanged.
pub fn reverse_hex(hex_str: &str) -> String {
    match hex::decode(hex_str) {
        Ok(mut bytes) => {
            bytes.reverse();
            hex::encode(bytes)
        }
        Err(_) => hex_str.to_string(),
    }
}

/// Reverse raw internal-order hash bytes into a display-order hex string.
pub fn display_hex(bytes: &[u8]) -> String {
    let mut owned = bytes.to_vec();
    owned.reverse();
    hex::encode(owned)
}
