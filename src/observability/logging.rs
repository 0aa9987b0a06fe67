//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Format one access log line per proxied exchange
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Log level configurable via config and environment (`RUST_LOG` wins)

use chrono::{DateTime, Utc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::http::container::ResponseParts;
use crate::model::ProxyRequest;

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("serverless_bridge={}", config.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    result.is_ok()
}

/// Renders the access log line for one exchange.
pub trait LogFormatter: Send + Sync {
    fn format(&self, request: &ProxyRequest, response: &ResponseParts) -> String;
}

/// Apache "combined" format:
/// `%h %l %u %t "%r" %>s %b "%{Referer}i" "%{User-agent}i"`.
#[derive(Debug, Clone, Copy)]
pub struct ApacheCombinedLogFormatter {
    clock: fn() -> DateTime<Utc>,
}

impl Default for ApacheCombinedLogFormatter {
    fn default() -> Self {
        Self { clock: Utc::now }
    }
}

impl ApacheCombinedLogFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed time source.
    pub fn with_clock(clock: fn() -> DateTime<Utc>) -> Self {
        Self { clock }
    }
}

impl LogFormatter for ApacheCombinedLogFormatter {
    fn format(&self, request: &ProxyRequest, response: &ResponseParts) -> String {
        let principal = request.security.user_principal();
        let host = request.source_ip.as_deref().unwrap_or("-");
        let ident = principal.as_deref().unwrap_or("-");
        let time = (self.clock)().format("%d/%m/%Y:%H:%M:%S %z");
        let bytes = match response.body.len() {
            0 => "-".to_string(),
            n => n.to_string(),
        };

        format!(
            "{} {} {} [{}] \"{} {} HTTP/1.1\" {} {} \"{}\" \"{}\" combined",
            host,
            ident,
            ident,
            time,
            request.method,
            request.path,
            response.status.as_u16(),
            bytes,
            request.header("referer").unwrap_or("-"),
            request.header("user-agent").unwrap_or("-"),
        )
    }
}
