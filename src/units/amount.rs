//! Exact conversions between smallest-unit integers and decimal coin amounts.

use std::str::FromStr;

use bigdecimal::{BigDecimal, ToPrimitive};

use crate::error::{BridgeError, BridgeResult};

/// Satoshis in one coin.
pub const SATS_PER_COIN: u64 = 100_000_000;

/// Convert a satoshi amount into coins.
pub fn sats_to_coins(sats: u64) -> BigDecimal {
    BigDecimal::from(sats) / BigDecimal::from(SATS_PER_COIN)
}

/// Convert a signed satoshi amount (some backends report negative deltas) into coins.
pub fn signed_sats_to_coins(sats: i64) -> BigDecimal {
    BigDecimal::from(sats) / BigDecimal::from(SATS_PER_COIN)
}

/// Convert coins into satoshis, flooring anything below one satoshi.
///
/// Negative amounts are rejected.
pub fn coins_to_sats(coins: &BigDecimal) -> BridgeResult<u64> {
    let scaled = coins * BigDecimal::from(SATS_PER_COIN);
    // with_scale truncates toward zero, which floors for non-negative values
    scaled
        .with_scale(0)
        .to_u64()
        .ok_or_else(|| BridgeError::InvalidInput(format!("amount {} is not a valid satoshi value", coins)))
}

/// Read a JSON number (or numeric string) as an exact decimal.
///
/// Goes through the textual form so values such as `0.10871747` never pass
/// through binary floating point arithmetic.
pub fn decimal_from_json(value: &serde_json::Value) -> Option<BigDecimal> {
    match value {
        serde_json::Value::Number(n) => BigDecimal::from_str(&n.to_string()).ok(),
        serde_json::Value::String(s) => BigDecimal::from_str(s).ok(),
        _ => None,
    }
}
