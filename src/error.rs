//! Error taxonomy shared by every subsystem.

use std::fmt;

use thiserror::Error;

/// Fixed diagnostic for rejected credentials. Backend detail is never surfaced.
pub const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Errors produced by providers, the orchestrator and the assembler.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Bad construction arguments. Fatal, never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication rejected by a backend.
    #[error("{}", INVALID_CREDENTIALS)]
    Credential,

    /// The backend did not answer at all.
    #[error("No response received on {operation} : {message}")]
    Network { operation: String, message: String },

    /// The backend answered with a structured failure.
    #[error("Invalid response : {} : {message}", status_label(.status))]
    Remote { status: Option<u16>, message: String },

    /// Every provider behind the orchestrator failed, in attempt order.
    #[error("All providers failed: {}", AggregateDisplay(.0))]
    Aggregate(Vec<ProviderFailure>),

    /// No spendable output, or the selected output cannot cover the fee.
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// The produced signature does not satisfy the spent input.
    #[error("Signature error: {0}")]
    Signature(String),

    /// The remote wallet could not be unlocked.
    #[error("Unable to unlock wallet after {attempts} attempts")]
    UnlockTimeout { attempts: u32 },

    /// Caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// Caller supplied an argument outside the accepted range.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl BridgeError {
    pub fn network(operation: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Network {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub fn remote(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    /// Ordered per-provider failures when this is an aggregate error.
    pub fn failures(&self) -> Option<&[ProviderFailure]> {
        match self {
            Self::Aggregate(failures) => Some(failures),
            _ => None,
        }
    }
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// One failed provider attempt recorded by the orchestrator.
#[derive(Debug)]
pub struct ProviderFailure {
    pub provider: String,
    pub endpoint: String,
    pub error: BridgeError,
}

impl ProviderFailure {
    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} @ {}] {}", self.provider, self.endpoint, self.error)
    }
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "-".to_string(),
    }
}

struct AggregateDisplay<'a>(&'a [ProviderFailure]);

impl fmt::Display for AggregateDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}
