//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate URLs, object identifiers and Move type tags
//! - Validate value ranges (timeouts > 0, intervals > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;

use crate::blockchain::types::{ObjectId, TypeTag};
use crate::config::schema::{ClientConfig, SessionBackend};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

fn check_http_url(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    match url::Url::parse(value) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
        Ok(u) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}'", u.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL: {}", e))),
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_http_url("api.base_url", &config.api.base_url, &mut errors);
    if config.api.timeout_secs == 0 {
        errors.push(ValidationError::new("api.timeout_secs", "must be greater than 0"));
    }

    check_http_url("chain.rpc_url", &config.chain.rpc_url, &mut errors);
    for url in &config.chain.failover_urls {
        check_http_url("chain.failover_urls", url, &mut errors);
    }
    if config.chain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("chain.rpc_timeout_secs", "must be greater than 0"));
    }
    if !config.chain.package_id.is_empty() && ObjectId::from_str(&config.chain.package_id).is_err() {
        errors.push(ValidationError::new("chain.package_id", "not a valid object id"));
    }
    if ObjectId::from_str(&config.chain.clock_id).is_err() {
        errors.push(ValidationError::new("chain.clock_id", "not a valid object id"));
    }
    if !config.chain.usdc_type.is_empty() && TypeTag::from_str(&config.chain.usdc_type).is_err() {
        errors.push(ValidationError::new(
            "chain.usdc_type",
            "expected <address>::<module>::<name>",
        ));
    }
    if config.chain.module.is_empty() {
        errors.push(ValidationError::new("chain.module", "must not be empty"));
    }

    if config.session.ttl_secs == 0 {
        errors.push(ValidationError::new("session.ttl_secs", "must be greater than 0"));
    }
    if config.session.derivation_salt.is_empty() {
        errors.push(ValidationError::new("session.derivation_salt", "must not be empty"));
    }
    if config.session.backend == SessionBackend::File && config.session.storage_path.is_none() {
        errors.push(ValidationError::new(
            "session.storage_path",
            "required when backend is \"file\"",
        ));
    }
    if config.session.expiry_check_secs == 0 {
        errors.push(ValidationError::new("session.expiry_check_secs", "must be greater than 0"));
    }

    if config.live_yield.tick_ms == 0 {
        errors.push(ValidationError::new("live_yield.tick_ms", "must be greater than 0"));
    }
    if config.live_yield.persist_every_ticks == 0 {
        errors.push(ValidationError::new(
            "live_yield.persist_every_ticks",
            "must be greater than 0",
        ));
    }

    if config.dispatch.effects_poll_attempts == 0 {
        errors.push(ValidationError::new(
            "dispatch.effects_poll_attempts",
            "must be at least 1",
        ));
    }
    if config.dispatch.effects_poll_base_ms > config.dispatch.effects_poll_max_ms {
        errors.push(ValidationError::new(
            "dispatch.effects_poll_base_ms",
            "must not exceed effects_poll_max_ms",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "not a valid socket address",
        ));
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

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ClientConfig::default()).is_ok());
    }

    #[test]
    fn test_bad_urls_rejected() {
        let mut config = ClientConfig::default();
        config.api.base_url = "not a url".to_string();
        config.chain.failover_urls.push("ftp://example.com".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "api.base_url"));
        assert!(errors.iter().any(|e| e.field == "chain.failover_urls"));
    }

    #[test]
    fn test_file_backend_needs_path() {
        let mut config = ClientConfig::default();
        config.session.backend = SessionBackend::File;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "session.storage_path");
    }

    #[test]
    fn test_malformed_identifiers_rejected() {
        let mut config = ClientConfig::default();
        config.chain.package_id = "0xnothex".to_string();
        config.chain.usdc_type = "USDC".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "chain.package_id"));
        assert!(errors.iter().any(|e| e.field == "chain.usdc_type"));
    }
}
