//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check endpoint URLs are WebSocket URLs
//! - Validate value ranges (mortality period, address prefix)
//! - Detect duplicate provider names and tracked assets
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::ClientConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
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

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_ws_url("chain.rpc_url", &config.chain.rpc_url, &mut errors);
    for (i, url) in config.chain.failover_urls.iter().enumerate() {
        check_ws_url(&format!("chain.failover_urls[{i}]"), url, &mut errors);
    }

    if let Some(prefix) = config.chain.ss58_prefix {
        if prefix >= 16384 {
            errors.push(ValidationError::new(
                "chain.ss58_prefix",
                format!("{prefix} is out of range (max 16383)"),
            ));
        } else if prefix == 46 || prefix == 47 {
            errors.push(ValidationError::new(
                "chain.ss58_prefix",
                format!("{prefix} is a reserved prefix"),
            ));
        }
    }

    let mut assets = HashSet::new();
    assets.insert(config.assets.primary_asset_id);
    for id in &config.assets.auxiliary_asset_ids {
        if !assets.insert(*id) {
            errors.push(ValidationError::new(
                "assets.auxiliary_asset_ids",
                format!("asset {id} is listed more than once"),
            ));
        }
    }

    let period = config.transaction.mortality_period;
    if period != 0 && !(4..=65536).contains(&period) {
        errors.push(ValidationError::new(
            "transaction.mortality_period",
            format!("{period} must be 0 (immortal) or between 4 and 65536"),
        ));
    }

    let mut names = HashSet::new();
    for (i, provider) in config.identity.providers.iter().enumerate() {
        if provider.name.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("identity.providers[{i}].name"),
                "must not be empty",
            ));
        } else if !names.insert(provider.name.as_str()) {
            errors.push(ValidationError::new(
                format!("identity.providers[{i}].name"),
                format!("duplicate provider '{}'", provider.name),
            ));
        }
        if provider.seeds_env.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("identity.providers[{i}].seeds_env"),
                "must not be empty",
            ));
        }
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!(
                "'{}' is not one of {}",
                config.observability.log_level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_ws_url(field: &str, value: &str, errors: &mut Vec<ValidationError>) {
    match url::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "ws" | "wss") => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("scheme '{}' is not ws or wss", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL: {e}"))),
    }
}
