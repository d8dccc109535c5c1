//! Unit and format normalization.
//!
//! # Data Flow
//! ```text
//! provider-native payload
//!     → amount.rs        (satoshi integers / JSON numbers ↔ exact decimal coins)
//!     → hash.rs          (byte-order reversal of hex hashes)
//!     → difficulty.rs    (compact "bits" → difficulty)
//!     → data_carrier.rs  (first provably unspendable output payload)
//!     → canonical domain values
//! ```
//!
//! Every function here is pure and stateless.

pub mod amount;
pub mod data_carrier;
pub mod difficulty;
pub mod hash;

pub use amount::{coins_to_sats, decimal_from_json, sats_to_coins, SATS_PER_COIN};
pub use difficulty::bits_to_difficulty;
pub use hash::reverse_hex;
