//! Compact "bits" to difficulty conversion.

use bigdecimal::BigDecimal;

/// Compact encoding of the difficulty-1 target (`0x1d00ffff`).
const MAX_TARGET_BITS: u32 = 0x1d00_ffff;

/// Compute the difficulty of a compact target encoding.
///
/// `difficulty = max_target / target` evaluated with arbitrary precision and
/// rounded once into an `f64`. Returns `0.0` for a zero mantissa.
pub fn bits_to_difficulty(bits: u32) -> f64 {
    let (max_exponent, max_mantissa) = split_compact(MAX_TARGET_BITS);
    let (exponent, mantissa) = split_compact(bits);
    if mantissa == 0 {
        return 0.0;
    }

    // target = mantissa * 256^(exponent - 3); only the exponent difference matters
    let mut numerator = BigDecimal::from(max_mantissa);
    let mut denominator = BigDecimal::from(mantissa);
    let shift = max_exponent as i32 - exponent as i32;
    let base = BigDecimal::from(256u32);
    for _ in 0..shift.unsigned_abs() {
        if shift > 0 {
            numerator = numerator * &base;
        } else {
            denominator = denominator * &base;
        }
    }

    let difficulty = numerator / denominator;
    // the decimal string is parsed with correct rounding
    difficulty.to_string().parse::<f64>().unwrap_or(0.0)
}

/// Parse a hex-encoded compact target as reported by JSON-RPC nodes.
pub fn parse_bits_hex(bits: &str) -> Option<u32> {
    u32::from_str_radix(bits.trim_start_matches("0x"), 16).ok()
}

fn split_compact(bits: u32) -> (u32, u32) {
    (bits >> 24, bits & 0x00ff_ffff)
}
