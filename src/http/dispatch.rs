//! Dispatch contract between the bridge and a downstream framework.
//!
//! # Responsibilities
//! - Define what a framework must provide: a one-time bootstrap and a
//!   non-blocking dispatch that eventually commits the response
//! - Adapt any tower `Service` (an axum `Router`) to that contract
//! - Expose `SecurityContext`, `InvocationContext` and `RequestMetadata` as
//!   request extensions
//!
//! # Design Decisions
//! - `dispatch` is synchronous and returns as soon as the exchange is handed
//!   off; the work runs on a spawned task
//! - The tower adapter always commits, on success and on failure

use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, OnceLock, PoisonError};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request, Response, StatusCode};
use tower::{BoxError, Service, ServiceExt};

use crate::error::{cause_chain, InitializationError, ProxyError};
use crate::http::container::ContainerResponse;
use crate::model::{InvocationContext, ProxyRequest};

/// A downstream framework the bridge can drive.
#[async_trait]
pub trait Container: Send + Sync + 'static {
    /// One-time framework bootstrap.
    async fn initialize(&self) -> Result<(), InitializationError>;

    /// Hand one exchange to the framework.
    ///
    /// Must return quickly. Whatever happens afterwards, the framework commits
    /// `response` exactly once or drops every clone of it.
    fn dispatch(
        &self,
        request: ProxyRequest,
        ctx: &InvocationContext,
        response: ContainerResponse,
    ) -> Result<(), ProxyError>;
}

type BuildFuture<S> = Pin<Box<dyn Future<Output = Result<S, BoxError>> + Send>>;
type Builder<S> = Box<dyn FnOnce() -> BuildFuture<S> + Send>;

/// Drives a tower `Service` such as an axum `Router`.
pub struct TowerContainer<S> {
    service: OnceLock<S>,
    builder: Mutex<Option<Builder<S>>>,
}

impl<S> TowerContainer<S> {
    /// Wrap a service that needs no bootstrap.
    pub fn from_service(service: S) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(service);
        Self {
            service: cell,
            builder: Mutex::new(None),
        }
    }

    /// Build the service lazily, during [`Container::initialize`].
    pub fn new<F, Fut, E>(build: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<S, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        let builder: Builder<S> = Box::new(move || {
            let fut = build();
            Box::pin(async move { fut.await.map_err(Into::into) })
        });
        Self {
            service: OnceLock::new(),
            builder: Mutex::new(Some(builder)),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.service.get().is_some()
    }
}

#[async_trait]
impl<S> Container for TowerContainer<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
{
    async fn initialize(&self) -> Result<(), InitializationError> {
        let builder = self
            .builder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(builder) = builder else {
            return Ok(());
        };

        let service = builder()
            .await
            .map_err(|e| InitializationError::Bootstrap(cause_chain(e.as_ref())))?;
        if self.service.set(service).is_err() {
            tracing::warn!("Service was already initialized, keeping the first instance");
        }
        Ok(())
    }

    fn dispatch(
        &self,
        request: ProxyRequest,
        ctx: &InvocationContext,
        response: ContainerResponse,
    ) -> Result<(), ProxyError> {
        let service = self
            .service
            .get()
            .cloned()
            .ok_or_else(|| ProxyError::Dispatch("framework is not initialized".to_string()))?;
        let http_request = to_http_request(request, ctx)?;

        tokio::spawn(async move {
            // S::Error need not be Send; box it before the next await.
            let result = service.oneshot(http_request).await.map_err(Into::<BoxError>::into);
            match result {
                Ok(http_response) => commit_response(http_response, &response).await,
                Err(e) => {
                    tracing::error!(error = %cause_chain(e.as_ref()), "Service call failed");
                    response.send_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
                }
            }
        });
        Ok(())
    }
}

fn to_http_request(request: ProxyRequest, ctx: &InvocationContext) -> Result<Request<Body>, ProxyError> {
    let uri = request
        .path_and_query()
        .map_err(|e| ProxyError::InvalidRequest(format!("bad request path: {}", e)))?;

    let mut builder = Request::builder().method(request.method.clone()).uri(uri);
    if let Some(headers) = builder.headers_mut() {
        for (name, values) in request.headers.iter() {
            let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
                tracing::warn!(request_id = %request.request_id, "Dropping invalid header name");
                continue;
            };
            for value in values {
                match HeaderValue::from_str(value) {
                    Ok(value) => {
                        headers.append(name.clone(), value);
                    }
                    Err(_) => {
                        tracing::warn!(request_id = %request.request_id, header = %name, "Dropping invalid header value");
                    }
                }
            }
        }
    }

    let mut http_request = builder
        .body(Body::from(request.body.clone()))
        .map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;
    let extensions = http_request.extensions_mut();
    extensions.insert(request.metadata());
    extensions.insert(request.security);
    extensions.insert(ctx.clone());
    Ok(http_request)
}

async fn commit_response(http_response: Response<Body>, response: &ContainerResponse) {
    let (parts, body) = http_response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "Failed to read response body");
            response.send_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
            return;
        }
    };

    response.set_status(parts.status);
    for (name, value) in parts.headers.iter() {
        match value.to_str() {
            Ok(value) => response.add_header(name.as_str(), value),
            Err(_) => tracing::warn!(header = %name, "Dropping non-text response header"),
        }
    }
    response.write_body(&bytes);
    response.commit();
}
