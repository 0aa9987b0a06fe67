//! Error to response mapping.

use std::collections::HashMap;
use std::io::Write;

use crate::error::{cause_chain, ProxyError};
use crate::http::container::{APPLICATION_JSON, CONTENT_TYPE};
use crate::model::{ErrorModel, Headers, ProxyResponse};

pub const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";
pub const GATEWAY_TIMEOUT_ERROR: &str = "Gateway timeout";

/// Converts a failed exchange into a well-formed response.
pub trait ExceptionHandler: Send + Sync {
    fn handle(&self, error: &ProxyError) -> ProxyResponse;

    /// Serialize the mapped response to `out`.
    fn handle_to_writer(&self, error: &ProxyError, out: &mut dyn Write) -> std::io::Result<()> {
        let response = self.handle(error);
        serde_json::to_writer(&mut *out, &response)?;
        out.flush()
    }
}

/// 500 for bad input and framework-declared internal errors, 502 otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProxyExceptionHandler;

impl ExceptionHandler for ProxyExceptionHandler {
    fn handle(&self, error: &ProxyError) -> ProxyResponse {
        tracing::error!(error = %cause_chain(error), "Called exception handler");
        if error.is_internal() {
            error_response(500, INTERNAL_SERVER_ERROR)
        } else {
            error_response(502, GATEWAY_TIMEOUT_ERROR)
        }
    }
}

fn error_response(status: u16, message: &str) -> ProxyResponse {
    let body = serde_json::to_string(&ErrorModel::new(message))
        .unwrap_or_else(|_| format!("{{\"message\":\"{}\"}}", message));

    let mut multi = Headers::new();
    multi.put_single(CONTENT_TYPE, APPLICATION_JSON.to_string());
    let mut single = HashMap::new();
    single.insert(CONTENT_TYPE.to_string(), APPLICATION_JSON.to_string());

    ProxyResponse {
        status_code: status,
        headers: Some(single),
        multi_value_headers: Some(multi),
        body: Some(body),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InitializationError;
    use std::time::Duration;

    #[test]
    fn test_internal_errors_are_500() {
        for error in [
            ProxyError::InvalidRequest("bad".into()),
            ProxyError::InternalServerError("boom".into()),
        ] {
            let response = ProxyExceptionHandler.handle(&error);
            assert_eq!(response.status_code, 500);
            assert_eq!(response.body.as_deref(), Some(r#"{"message":"Internal Server Error"}"#));
            assert_eq!(response.header("content-type"), Some(APPLICATION_JSON));
        }
    }

    #[test]
    fn test_everything_else_is_502() {
        for error in [
            ProxyError::Dispatch("refused".into()),
            ProxyError::NoResponse,
            ProxyError::Initialization(InitializationError::Timeout(Duration::from_secs(20))),
        ] {
            let response = ProxyExceptionHandler.handle(&error);
            assert_eq!(response.status_code, 502);
            assert_eq!(response.body.as_deref(), Some(r#"{"message":"Gateway timeout"}"#));
        }
    }

    #[test]
    fn test_handle_to_writer() {
        let mut out = Vec::new();
        ProxyExceptionHandler
            .handle_to_writer(&ProxyError::InvalidRequest("bad".into()), &mut out)
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["statusCode"], 500);
        assert_eq!(json["body"], r#"{"message":"Internal Server Error"}"#);
        assert_eq!(json["multiValueHeaders"]["Content-Type"][0], APPLICATION_JSON);
    }
}
