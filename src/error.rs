//! Error types for the bridge.

use std::error::Error as StdError;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while bootstrapping the downstream framework.
#[derive(Debug, Error)]
pub enum InitializationError {
    /// The framework's own bootstrap failed.
    #[error("Container bootstrap failed: {0}")]
    Bootstrap(String),

    /// The framework was not ready within the allowed time.
    #[error("Could not initialize framework within the {}ms timeout", .0.as_millis())]
    Timeout(Duration),

    /// The bounded wait ended without the bootstrap worker opening the gate.
    #[error("Container initialization interrupted")]
    Interrupted,
}

/// Errors raised while proxying one exchange.
///
/// Every variant is converted to a response by an
/// [`ExceptionHandler`](crate::http::exception::ExceptionHandler); none of
/// them escape [`ContainerHandler::proxy`](crate::http::handler::ContainerHandler::proxy).
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The inbound event could not be turned into a request.
    #[error("Invalid request event: {0}")]
    InvalidRequest(String),

    /// The framework reported an internal error of its own.
    #[error("Internal server error: {0}")]
    InternalServerError(String),

    /// The framework refused or failed to accept the request.
    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    /// Every response handle was dropped without a commit.
    #[error("Framework released the response without committing it")]
    NoResponse,

    #[error(transparent)]
    Initialization(#[from] InitializationError),
}

impl ProxyError {
    /// Input translation failures and framework-declared internal errors.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            ProxyError::InvalidRequest(_) | ProxyError::InternalServerError(_)
        )
    }
}

/// Render an error and every `source()` below it, outermost first.
pub fn cause_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        current = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("reading event")]
    struct Wrapped(#[source] std::io::Error);

    #[test]
    fn test_cause_chain_includes_sources() {
        let err = Wrapped(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "stream closed"));
        assert_eq!(cause_chain(&err), "reading event: stream closed");
    }

    #[test]
    fn test_cause_chain_prints_each_message_once() {
        let err = ProxyError::from(InitializationError::Bootstrap("no database".into()));
        assert_eq!(cause_chain(&err), "Container bootstrap failed: no database");
    }

    #[test]
    fn test_timeout_message() {
        let err = InitializationError::Timeout(Duration::from_millis(20_000));
        assert_eq!(
            err.to_string(),
            "Could not initialize framework within the 20000ms timeout"
        );
        assert!(!ProxyError::from(err).is_internal());
        assert!(ProxyError::InvalidRequest("x".into()).is_internal());
    }
}
