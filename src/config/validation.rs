//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Provider list is non-empty with unique names and parseable URLs
//! - Value ranges (fee target, timeouts, unlock policy, size)
//!
//! Returns all validation errors, not just the first.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;

use crate::config::schema::{BridgeConfig, ProviderConfig};
use crate::providers::types::Network;
use crate::providers::{MAX_TARGET_BLOCKS, MIN_TARGET_BLOCKS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.providers.is_empty() {
        errors.push(ValidationError::new("providers", "at least one provider is required"));
    }

    let mut seen = HashSet::new();
    for (i, provider) in config.providers.iter().enumerate() {
        let field = format!("providers[{}]", i);
        if provider.name().trim().is_empty() {
            errors.push(ValidationError::new(&field, "name must not be empty"));
        } else if !seen.insert(provider.name().to_string()) {
            errors.push(ValidationError::new(&field, format!("duplicate provider name '{}'", provider.name())));
        }

        match provider {
            ProviderConfig::Explorer { base_url, .. } => {
                if config.network == Network::Regtest {
                    errors.push(ValidationError::new(&field, "explorer does not serve regtest"));
                }
                if let Some(url) = base_url {
                    if url::Url::parse(url).is_err() {
                        errors.push(ValidationError::new(&field, format!("invalid base_url '{}'", url)));
                    }
                }
            }
            ProviderConfig::JsonRpc { url, .. } => {
                if url::Url::parse(url).is_err() {
                    errors.push(ValidationError::new(
                        &field,
                        format!("invalid url '{}'", crate::providers::json_rpc::redact_url(url)),
                    ));
                }
            }
        }
    }

    let target = config.wallet.fee_target_blocks;
    if !(MIN_TARGET_BLOCKS..=MAX_TARGET_BLOCKS).contains(&target) {
        errors.push(ValidationError::new(
            "wallet.fee_target_blocks",
            format!("must be >= {} and <= {}", MIN_TARGET_BLOCKS, MAX_TARGET_BLOCKS),
        ));
    }
    match BigDecimal::from_str(&config.wallet.assumed_tx_size_kb) {
        Ok(size) if size > BigDecimal::from(0) => {}
        _ => errors.push(ValidationError::new(
            "wallet.assumed_tx_size_kb",
            "must be a positive decimal",
        )),
    }

    if config.unlock.max_attempts == 0 {
        errors.push(ValidationError::new("unlock.max_attempts", "must be greater than 0"));
    }
    if config.transport.request_timeout_secs == 0 {
        errors.push(ValidationError::new("transport.request_timeout_secs", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_rpc(name: &str, url: &str) -> ProviderConfig {
        ProviderConfig::JsonRpc {
            name: name.into(),
            url: url.into(),
            username: None,
            password: None,
        }
    }

    #[test]
    fn test_valid_config() {
        let mut config = BridgeConfig::default();
        config.providers.push(json_rpc("node", "http://127.0.0.1:8332"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = BridgeConfig::default();
        config.providers.push(json_rpc("node", "not a url"));
        config.providers.push(json_rpc("node", "http://127.0.0.1:8332"));
        config.wallet.fee_target_blocks = 0;
        config.wallet.assumed_tx_size_kb = "-1".into();
        config.unlock.max_attempts = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "providers[0]",
                "providers[1]",
                "wallet.fee_target_blocks",
                "wallet.assumed_tx_size_kb",
                "unlock.max_attempts"
            ]
        );
    }

    #[test]
    fn test_explorer_on_regtest_rejected() {
        let mut config = BridgeConfig::default();
        config.network = Network::Regtest;
        config.providers.push(ProviderConfig::Explorer {
            name: "bc".into(),
            base_url: None,
            token: None,
        });
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].message, "explorer does not serve regtest");
    }
}
