//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, header limit within hyper's bounds)
//! - Validate addresses that are parsed later
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EchoConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::EchoConfig;

/// Smallest request-head buffer hyper accepts.
pub const MIN_HEADER_BYTES: usize = 8192;

/// A single semantic problem with the configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("listen address must not be empty")]
    EmptyListenAddr,

    #[error("timeout `{0}` must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("max_header_bytes {actual} is below the minimum of {min}")]
    HeaderLimitTooSmall { actual: usize, min: usize },

    #[error("invalid metrics address `{0}`")]
    InvalidMetricsAddress(String),
}

/// Check the configuration, collecting every problem found.
pub fn validate_config(config: &EchoConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.listen_addr.trim().is_empty() {
        errors.push(ValidationError::EmptyListenAddr);
    }
    if config.listener.max_header_bytes < MIN_HEADER_BYTES {
        errors.push(ValidationError::HeaderLimitTooSmall {
            actual: config.listener.max_header_bytes,
            min: MIN_HEADER_BYTES,
        });
    }

    let timeouts = &config.timeouts;
    for (name, value) in [
        ("read_header_secs", timeouts.read_header_secs),
        ("read_secs", timeouts.read_secs),
        ("write_secs", timeouts.write_secs),
        ("idle_secs", timeouts.idle_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }

    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidMetricsAddress(addr.clone()));
        }
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
        assert_eq!(validate_config(&EchoConfig::default()), Ok(()));
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let mut config = EchoConfig::default();
        config.timeouts.write_secs = 0;
        config.timeouts.idle_secs = 0;
        assert_eq!(
            validate_config(&config),
            Err(vec![
                ValidationError::ZeroTimeout("write_secs"),
                ValidationError::ZeroTimeout("idle_secs"),
            ])
        );
    }

    #[test]
    fn test_zero_grace_period_allowed() {
        let mut config = EchoConfig::default();
        config.timeouts.shutdown_grace_secs = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_metrics_address() {
        let mut config = EchoConfig::default();
        config.observability.metrics_address = Some("0.0.0.0:9090".to_string());
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_address = Some("nowhere".to_string());
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::InvalidMetricsAddress("nowhere".to_string())])
        );
    }
}
