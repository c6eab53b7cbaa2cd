//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (watch entries reference configured networks)
//! - Validate value ranges (batch size > 0, thresholds > 0, URLs parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: EngineConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::EngineConfig;
use crate::monitor::MAX_CHECK_INTERVAL_MINUTES;

/// One semantic problem in a configuration.
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
pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.scheduler.batch_size == 0 {
        errors.push(ValidationError::new("scheduler.batch_size", "must be at least 1"));
    }
    if config.scheduler.bulk_concurrency == 0 {
        errors.push(ValidationError::new("scheduler.bulk_concurrency", "must be at least 1"));
    }
    if config.scheduler.request_timeout_secs == 0 {
        errors.push(ValidationError::new("scheduler.request_timeout_secs", "must be positive"));
    }
    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if !(0.0..=1.0).contains(&config.retries.jitter_ratio) {
        errors.push(ValidationError::new("retries.jitter_ratio", "must be between 0 and 1"));
    }
    if config.cache.failure_ttl_secs > config.cache.success_ttl_secs {
        errors.push(ValidationError::new(
            "cache.failure_ttl_secs",
            "must not exceed cache.success_ttl_secs",
        ));
    }
    if config.monitor.history_capacity == 0 {
        errors.push(ValidationError::new("monitor.history_capacity", "must be at least 1"));
    }
    if config.monitor.alert_capacity == 0 {
        errors.push(ValidationError::new("monitor.alert_capacity", "must be at least 1"));
    }
    if !(1..=MAX_CHECK_INTERVAL_MINUTES).contains(&config.monitor.default_interval_minutes) {
        errors.push(ValidationError::new(
            "monitor.default_interval_minutes",
            format!("must be between 1 and {}", MAX_CHECK_INTERVAL_MINUTES),
        ));
    }
    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::new("admin.api_key", "must be set when admin is enabled"));
    }

    let mut seen = HashSet::new();
    for (i, network) in config.networks.iter().enumerate() {
        let field = format!("networks[{}]", i);
        if network.id.trim().is_empty() {
            errors.push(ValidationError::new(format!("{}.id", field), "must not be empty"));
        }
        if !seen.insert(network.id.as_str()) {
            errors.push(ValidationError::new(
                format!("{}.id", field),
                format!("duplicate network '{}'", network.id),
            ));
        }
        if network.endpoints.is_empty() {
            errors.push(ValidationError::new(
                format!("{}.endpoints", field),
                "at least one endpoint is required",
            ));
        }
        for (j, endpoint) in network.endpoints.iter().enumerate() {
            if let Err(e) = url::Url::parse(&endpoint.url) {
                errors.push(ValidationError::new(
                    format!("{}.endpoints[{}].url", field, j),
                    format!("invalid URL '{}': {}", endpoint.url, e),
                ));
            }
        }
    }

    for (i, watch) in config.watch.iter().enumerate() {
        let field = format!("watch[{}]", i);
        if !seen.contains(watch.network.as_str()) {
            errors.push(ValidationError::new(
                format!("{}.network", field),
                format!("unknown network '{}'", watch.network),
            ));
        }
        if watch.address.trim().is_empty() {
            errors.push(ValidationError::new(format!("{}.address", field), "must not be empty"));
        }
        match watch.check_interval_minutes {
            Some(0) => errors.push(ValidationError::new(
                format!("{}.check_interval_minutes", field),
                "must be positive",
            )),
            Some(m) if m > MAX_CHECK_INTERVAL_MINUTES => errors.push(ValidationError::new(
                format!("{}.check_interval_minutes", field),
                format!("must be at most {}", MAX_CHECK_INTERVAL_MINUTES),
            )),
            _ => {}
        }
        if watch.alert_threshold_percent.is_some_and(|t| t <= 0.0) {
            errors.push(ValidationError::new(
                format!("{}.alert_threshold_percent", field),
                "must be positive",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
