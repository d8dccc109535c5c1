//! Metrics collection.
//!
//! # Metrics
//! - `bridge_provider_attempts_total` (counter): attempts by provider, operation, outcome
//! - `bridge_unlock_attempts_total` (counter): wallet unlock attempts by outcome
//! - `bridge_transactions_assembled_total` (counter): assembled transactions by broadcast flag
//!
//! The host process installs the exporter; without one these are no-ops.

use metrics::counter;

pub fn record_provider_attempt(provider: &str, operation: &'static str, success: bool) {
    counter!(
        "bridge_provider_attempts_total",
        "provider" => provider.to_string(),
        "operation" => operation,
        "outcome" => outcome_label(success)
    )
    .increment(1);
}

pub fn record_unlock_attempt(outcome: &'static str) {
    counter!("bridge_unlock_attempts_total", "outcome" => outcome).increment(1);
}

pub fn record_transaction_assembled(broadcast: bool) {
    counter!(
        "bridge_transactions_assembled_total",
        "broadcast" => if broadcast { "true" } else { "false" }
    )
    .increment(1);
}

fn outcome_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}
