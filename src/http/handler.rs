//! Per-invocation entry point.
//!
//! # Responsibilities
//! - Resolve security, translate the event, dispatch to the framework
//! - Wait for the framework to commit its response, then convert it
//! - Map every failure to a response; nothing escapes `proxy`
//!
//! # Design Decisions
//! - One attempt per invocation, no retries
//! - No partial responses: a full response or the mapped error
//! - The completion wait has no timeout; the platform deadline is the ceiling

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::ContainerConfig;
use crate::error::{cause_chain, InitializationError, ProxyError};
use crate::http::container::ContainerResponse;
use crate::http::dispatch::Container;
use crate::http::exception::{ExceptionHandler, ProxyExceptionHandler};
use crate::http::reader::{EventRequestReader, RequestReader};
use crate::http::writer::{ProxyResponseWriter, ResponseWriter};
use crate::lifecycle::startup::Initializer;
use crate::model::{InboundEvent, InvocationContext, ProxyResponse};
use crate::observability::logging::{ApacheCombinedLogFormatter, LogFormatter};
use crate::observability::metrics;
use crate::security::{sanitize, SecurityContext};
use crate::sync::gate::GateError;

/// Bridges inbound events to a [`Container`].
pub struct ContainerHandler<C: Container> {
    container: Arc<C>,
    config: Arc<ContainerConfig>,
    reader: Box<dyn RequestReader>,
    writer: Box<dyn ResponseWriter>,
    exception_handler: Box<dyn ExceptionHandler>,
    log_formatter: Option<Box<dyn LogFormatter>>,
    initializer: Option<Initializer>,
}

impl<C: Container> ContainerHandler<C> {
    pub fn new(container: C, config: ContainerConfig) -> Self {
        let log_formatter: Option<Box<dyn LogFormatter>> = if config.logging.access_log {
            Some(Box::new(ApacheCombinedLogFormatter::new()))
        } else {
            None
        };
        Self {
            container: Arc::new(container),
            writer: Box::new(ProxyResponseWriter::from_config(&config)),
            config: Arc::new(config),
            reader: Box::new(EventRequestReader),
            exception_handler: Box::new(ProxyExceptionHandler),
            log_formatter,
            initializer: None,
        }
    }

    pub fn with_request_reader(mut self, reader: impl RequestReader + 'static) -> Self {
        self.reader = Box::new(reader);
        self
    }

    pub fn with_response_writer(mut self, writer: impl ResponseWriter + 'static) -> Self {
        self.writer = Box::new(writer);
        self
    }

    pub fn with_exception_handler(mut self, handler: impl ExceptionHandler + 'static) -> Self {
        self.exception_handler = Box::new(handler);
        self
    }

    /// `None` turns access logging off.
    pub fn with_log_formatter(mut self, formatter: Option<Box<dyn LogFormatter>>) -> Self {
        self.log_formatter = formatter;
        self
    }

    pub fn container(&self) -> &Arc<C> {
        &self.container
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Bootstrap the framework with `initializer`.
    ///
    /// With an async initializer this returns once bootstrap is done or the
    /// startup budget is spent, whichever comes first.
    pub async fn start(&mut self, initializer: Initializer) -> Result<(), InitializationError> {
        let initializer = self.initializer.insert(initializer);
        initializer.start(Arc::clone(&self.container)).await
    }

    /// Abort a bootstrap that is still running.
    pub fn shutdown(&self) {
        if let Some(initializer) = &self.initializer {
            initializer.shutdown();
        }
    }

    /// Proxy one event. Failures come back as mapped error responses.
    pub async fn proxy(&self, event: &InboundEvent, ctx: &InvocationContext) -> ProxyResponse {
        let started = Instant::now();
        let response = match self.exchange(event, ctx).await {
            Ok(response) => response,
            Err(e) => {
                self.log_failure(&e, ctx);
                self.exception_handler.handle(&e)
            }
        };
        metrics::record_invocation(event.source(), Some(response.status_code), started.elapsed());
        response
    }

    /// Like [`proxy`](Self::proxy), but returns the error instead of mapping it.
    pub async fn try_proxy(
        &self,
        event: &InboundEvent,
        ctx: &InvocationContext,
    ) -> Result<ProxyResponse, ProxyError> {
        let started = Instant::now();
        let result = self.exchange(event, ctx).await;
        match &result {
            Ok(response) => {
                metrics::record_invocation(event.source(), Some(response.status_code), started.elapsed())
            }
            Err(e) => {
                self.log_failure(e, ctx);
                metrics::record_invocation(event.source(), None, started.elapsed());
            }
        }
        result
    }

    /// Read an event as JSON from `input`, proxy it and write the response
    /// JSON to `output`. Unparsable input gets the mapped error response.
    pub async fn proxy_stream<R, W>(
        &self,
        mut input: R,
        mut output: W,
        ctx: &InvocationContext,
    ) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut raw = Vec::new();
        input.read_to_end(&mut raw).await?;
        drop(input);

        let mut encoded = Vec::new();
        match serde_json::from_slice::<InboundEvent>(&raw) {
            Ok(event) => {
                let response = self.proxy(&event, ctx).await;
                serde_json::to_writer(&mut encoded, &response)?;
            }
            Err(e) => {
                tracing::error!(
                    request_id = %sanitize(&ctx.request_id),
                    error = %e,
                    "Error while parsing request object stream"
                );
                let error = ProxyError::InvalidRequest(e.to_string());
                self.exception_handler.handle_to_writer(&error, &mut encoded)?;
            }
        }
        output.write_all(&encoded).await?;
        output.flush().await
    }

    async fn exchange(
        &self,
        event: &InboundEvent,
        ctx: &InvocationContext,
    ) -> Result<ProxyResponse, ProxyError> {
        let security = SecurityContext::resolve(event, ctx);
        let (response, pending) = ContainerResponse::new(event.source());
        let request = self
            .reader
            .read_request(event, security, ctx, &self.config)?;

        self.wait_until_ready().await?;

        let logged_request = self.log_formatter.as_ref().map(|_| request.clone());
        self.container.dispatch(request, ctx, response)?;
        let parts = pending.completed().await?;

        if let (Some(formatter), Some(request)) = (&self.log_formatter, &logged_request) {
            tracing::info!(target: "access_log", "{}", sanitize(&formatter.format(request, &parts)));
        }

        self.writer.write_response(parts, ctx)
    }

    /// Block on the ready gate while bootstrap may still be running.
    async fn wait_until_ready(&self) -> Result<(), InitializationError> {
        let Some(gate) = self.initializer.as_ref().and_then(Initializer::ready_gate) else {
            return Ok(());
        };
        if gate.is_open() {
            return Ok(());
        }

        let timeout = Duration::from_millis(self.config.initialization_timeout_ms);
        tracing::debug!(timeout_ms = self.config.initialization_timeout_ms, "Waiting for initialization");
        match gate.wait_timeout(timeout).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(InitializationError::Timeout(timeout)),
            Err(GateError::Abandoned) => Err(InitializationError::Interrupted),
        }
    }

    fn log_failure(&self, error: &ProxyError, ctx: &InvocationContext) {
        tracing::error!(
            request_id = %sanitize(&ctx.request_id),
            error = %cause_chain(error),
            "Error while handling request"
        );
    }
}

impl<C: Container> Drop for ContainerHandler<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::dispatch::TowerContainer;
    use crate::model::ProxyRequest;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use serde_json::json;

    fn gateway_event(path: &str) -> InboundEvent {
        serde_json::from_value(json!({
            "path": path,
            "httpMethod": "GET",
            "requestContext": {"requestId": "gw-1"}
        }))
        .unwrap()
    }

    fn handler() -> ContainerHandler<TowerContainer<Router>> {
        let app = Router::new().route("/ping", get(|| async { "pong" }));
        ContainerHandler::new(TowerContainer::from_service(app), ContainerConfig::default())
    }

    struct FailingContainer;

    #[async_trait]
    impl Container for FailingContainer {
        async fn initialize(&self) -> Result<(), InitializationError> {
            Ok(())
        }

        fn dispatch(
            &self,
            _request: ProxyRequest,
            _ctx: &InvocationContext,
            _response: ContainerResponse,
        ) -> Result<(), ProxyError> {
            Err(ProxyError::InternalServerError("handler blew up".into()))
        }
    }

    #[tokio::test]
    async fn test_proxy_round_trip() {
        let response = handler()
            .proxy(&gateway_event("/ping"), &InvocationContext::new("ctx"))
            .await;
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body.as_deref(), Some("pong"));
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_mapped() {
        let handler = ContainerHandler::new(FailingContainer, ContainerConfig::default());
        let response = handler
            .proxy(&gateway_event("/ping"), &InvocationContext::new("ctx"))
            .await;
        assert_eq!(response.status_code, 500);
        assert_eq!(response.body.as_deref(), Some(r#"{"message":"Internal Server Error"}"#));
    }

    #[tokio::test]
    async fn test_try_proxy_returns_error() {
        let handler = ContainerHandler::new(FailingContainer, ContainerConfig::default());
        let err = handler
            .try_proxy(&gateway_event("/ping"), &InvocationContext::new("ctx"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::InternalServerError(_)));
    }

    #[tokio::test]
    async fn test_proxy_stream_bad_json() {
        let mut out = Vec::new();
        handler()
            .proxy_stream(&b"{not json"[..], &mut out, &InvocationContext::new("ctx"))
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["statusCode"], 500);
    }

    #[tokio::test]
    async fn test_proxy_stream_round_trip() {
        let input = serde_json::to_vec(&json!({"path": "/ping", "httpMethod": "GET"})).unwrap();
        let mut out = Vec::new();
        handler()
            .proxy_stream(&input[..], &mut out, &InvocationContext::new("ctx"))
            .await
            .unwrap();
        let response: ProxyResponse = serde_json::from_slice(&out).unwrap();
        assert_eq!(response.status_code, StatusCode::OK.as_u16());
        assert_eq!(response.body.as_deref(), Some("pong"));
    }
}
