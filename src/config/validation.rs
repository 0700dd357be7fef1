//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation of the keys the supervisory core interprets
//! - Catch unparsable numbers before they are silently defaulted
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Config → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use crate::config::schema::Config;

/// A single semantic problem with a configuration value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{key}: {reason} (got `{value}`)")]
pub struct ValidationError {
    pub key: String,
    pub value: String,
    pub reason: &'static str,
}

impl ValidationError {
    fn new(key: &str, value: &str, reason: &'static str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
            reason,
        }
    }
}

pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Some(port) = config.get("daemon_port") {
        if port.trim().parse::<u16>().is_err() {
            errors.push(ValidationError::new("daemon_port", port, "not a valid port number"));
        }
    }

    if let Some(value) = config.get("retry") {
        if !value.trim().is_empty() && value.trim().parse::<u32>().is_err() {
            errors.push(ValidationError::new("retry", value, "expected a bind attempt count"));
        }
    }

    for key in ["expire_hours", "limit"] {
        if let Some(value) = config.get(key) {
            if !value.trim().is_empty() && value.trim().parse::<u64>().is_err() {
                errors.push(ValidationError::new(key, value, "expected a non-negative integer"));
            }
        }
    }

    if let Some(dir) = config.get("cache_dir") {
        if dir.trim().is_empty() {
            errors.push(ValidationError::new("cache_dir", dir, "must not be empty"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
