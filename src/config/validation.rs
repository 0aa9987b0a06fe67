//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, grace below budget)
//! - Check that path and content-type settings are well formed
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ContainerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::ContainerConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &ContainerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.initialization_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "initialization_timeout_ms",
            "must be greater than zero",
        ));
    }

    if config.strip_base_path {
        match config.service_base_path.as_deref() {
            None | Some("") => errors.push(ValidationError::new(
                "service_base_path",
                "required when strip_base_path is enabled",
            )),
            Some(path) if !path.starts_with('/') => errors.push(ValidationError::new(
                "service_base_path",
                format!("'{}' must start with '/'", path),
            )),
            Some(_) => {}
        }
    }

    for content_type in &config.binary_content_types {
        if !content_type.contains('/') {
            errors.push(ValidationError::new(
                "binary_content_types",
                format!("'{}' is not a type/subtype pair", content_type),
            ));
        }
    }

    let cold = &config.cold_start;
    if cold.max_init_ms == 0 {
        errors.push(ValidationError::new("cold_start.max_init_ms", "must be greater than zero"));
    }
    if cold.grace_explicit_ms >= cold.max_init_ms {
        errors.push(ValidationError::new(
            "cold_start.grace_explicit_ms",
            "must be smaller than max_init_ms",
        ));
    }
    if cold.grace_defaulted_ms >= cold.max_init_ms {
        errors.push(ValidationError::new(
            "cold_start.grace_defaulted_ms",
            "must be smaller than max_init_ms",
        ));
    }

    if !LOG_LEVELS.contains(&config.logging.level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "logging.level",
            format!("unknown level '{}'", config.logging.level),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
