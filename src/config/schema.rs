//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

/// Root configuration for the bridge.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ContainerConfig {
    /// Remove `service_base_path` from the front of every request path.
    pub strip_base_path: bool,

    /// Base path mapping of the API (e.g. "/v1").
    pub service_base_path: Option<String>,

    /// Content types written as base64 bodies. A trailing `/*` matches a
    /// whole family.
    pub binary_content_types: Vec<String>,

    /// Also emit the single-value `headers` map on 1.0 payload responses.
    pub single_value_headers: bool,

    /// Upper bound on how long an invocation waits for a framework that is
    /// still starting, in milliseconds.
    pub initialization_timeout_ms: u64,

    /// Cold-start budget settings.
    pub cold_start: ColdStartConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            strip_base_path: false,
            service_base_path: None,
            binary_content_types: vec![
                "application/octet-stream".to_string(),
                "image/*".to_string(),
                "application/pdf".to_string(),
                "application/zip".to_string(),
            ],
            single_value_headers: false,
            initialization_timeout_ms: 20_000,
            cold_start: ColdStartConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ContainerConfig {
    /// Whether a response with this content type gets a base64 body.
    pub fn is_binary_content_type(&self, content_type: &str) -> bool {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        self.binary_content_types.iter().any(|pattern| {
            let pattern = pattern.to_ascii_lowercase();
            match pattern.strip_suffix("/*") {
                Some(family) => mime
                    .split_once('/')
                    .is_some_and(|(kind, _)| kind == family),
                None => pattern == mime,
            }
        })
    }
}

/// Cold-start budget configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ColdStartConfig {
    /// Allow framework bootstrap to continue past the first invocation.
    pub async_init: bool,

    /// Platform startup budget in milliseconds.
    pub max_init_ms: u64,

    /// Margin kept under the budget when the start time was given explicitly.
    pub grace_explicit_ms: u64,

    /// Margin kept under the budget when the start time was derived from the
    /// process.
    pub grace_defaulted_ms: u64,
}

impl Default for ColdStartConfig {
    fn default() -> Self {
        Self {
            async_init: true,
            max_init_ms: 10_000,
            grace_explicit_ms: 250,
            grace_defaulted_ms: 150,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` overrides it.
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    pub json: bool,

    /// Emit one access log line per invocation.
    pub access_log: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            access_log: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: ContainerConfig = toml::from_str("").unwrap();
        assert_eq!(config, ContainerConfig::default());
        assert_eq!(config.initialization_timeout_ms, 20_000);
        assert_eq!(config.cold_start.max_init_ms, 10_000);
    }

    #[test]
    fn test_partial_section() {
        let config: ContainerConfig = toml::from_str(
            r#"
            strip_base_path = true
            service_base_path = "/v1"

            [cold_start]
            grace_explicit_ms = 500
            "#,
        )
        .unwrap();
        assert!(config.strip_base_path);
        assert_eq!(config.cold_start.grace_explicit_ms, 500);
        assert_eq!(config.cold_start.grace_defaulted_ms, 150);
        assert!(config.logging.access_log);
    }

    #[test]
    fn test_binary_content_types() {
        let config = ContainerConfig::default();
        assert!(config.is_binary_content_type("image/png"));
        assert!(config.is_binary_content_type("Application/Octet-Stream; charset=binary"));
        assert!(!config.is_binary_content_type("application/json"));
        assert!(!config.is_binary_content_type("text/html; charset=utf-8"));
        assert!(!config.is_binary_content_type(""));
    }
}
