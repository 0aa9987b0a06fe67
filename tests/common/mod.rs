//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Extension, RawQuery};
use axum::routing::{any, get};
use axum::{Json, Router};
use serde_json::{json, Value};

use serverless_bridge::config::ContainerConfig;
use serverless_bridge::http::{Container, ContainerResponse, TowerContainer};
use serverless_bridge::model::{ProxyRequest, RequestMetadata};
use serverless_bridge::{
    ContainerHandler, InboundEvent, InitializationError, InvocationContext, ProxyError,
    SecurityContext,
};

/// Demo app: `/ping`, `/echo`, `/whoami`, `/cookie`, `/query` and `/stage`.
pub fn app() -> Router {
    Router::new()
        .route("/ping", get(|| async { "pong" }))
        .route("/echo", any(|body: String| async move { body }))
        .route(
            "/whoami",
            get(|Extension(security): Extension<SecurityContext>| async move {
                Json(json!({
                    "scheme": security.authentication_scheme().map(|s| s.as_str()),
                    "principal": security.user_principal(),
                    "secure": security.is_secure(),
                    "admin": security.is_user_in_role("admin"),
                }))
            }),
        )
        .route(
            "/query",
            get(|RawQuery(query): RawQuery| async move { query.unwrap_or_default() }),
        )
        .route(
            "/stage",
            get(|Extension(meta): Extension<RequestMetadata>| async move {
                meta.stage_variables
                    .get_first("env")
                    .cloned()
                    .unwrap_or_default()
            }),
        )
        .route(
            "/cookie",
            get(|| async {
                (
                    [("set-cookie", "session=abc"), ("x-app", "demo")],
                    "with cookie",
                )
            }),
        )
}

pub fn handler() -> ContainerHandler<TowerContainer<Router>> {
    ContainerHandler::new(TowerContainer::from_service(app()), ContainerConfig::default())
}

pub fn ctx() -> InvocationContext {
    InvocationContext::new("platform-req")
}

pub fn event(value: Value) -> InboundEvent {
    serde_json::from_value(value).expect("event JSON should deserialize")
}

pub fn gateway_event(method: &str, path: &str) -> Value {
    json!({
        "resource": "/{proxy+}",
        "path": path,
        "httpMethod": method,
        "headers": {"Accept": "*/*"},
        "requestContext": {"requestId": "gw-req", "identity": {"sourceIp": "192.0.2.1"}},
        "isBase64Encoded": false
    })
}

pub fn http_api_event(path: &str, authorizer: Value, headers: Value) -> Value {
    json!({
        "version": "2.0",
        "routeKey": "$default",
        "rawPath": path,
        "rawQueryString": "",
        "headers": headers,
        "requestContext": {
            "requestId": "v2-req",
            "http": {"method": "GET", "path": path, "sourceIp": "192.0.2.2"},
            "authorizer": authorizer
        }
    })
}

pub fn alb_event(path: &str) -> Value {
    json!({
        "httpMethod": "GET",
        "path": path,
        "multiValueHeaders": {"host": ["lb.example.com"]},
        "requestContext": {"elb": {"targetGroupArn": "arn:aws:elasticloadbalancing:tg"}},
        "isBase64Encoded": false
    })
}

pub fn lattice_event(path: &str, identity: Value) -> Value {
    json!({
        "version": "2.0",
        "path": path,
        "method": "GET",
        "headers": {"host": ["svc.lattice"]},
        "requestContext": {"serviceArn": "arn:aws:vpc-lattice:svc", "identity": identity}
    })
}

pub fn body_json(body: Option<&str>) -> Value {
    serde_json::from_str(body.expect("response should have a body")).expect("body should be JSON")
}

/// Demo app whose bootstrap takes `delay`, or fails when `fail` is set.
pub struct SlowContainer {
    inner: TowerContainer<Router>,
    delay: Duration,
    fail: bool,
    pub initialized: AtomicUsize,
}

impl SlowContainer {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: TowerContainer::from_service(app()),
            delay,
            fail: false,
            initialized: AtomicUsize::new(0),
        }
    }

    pub fn failing(delay: Duration) -> Self {
        Self {
            fail: true,
            ..Self::new(delay)
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst) > 0
    }
}

#[async_trait]
impl Container for SlowContainer {
    async fn initialize(&self) -> Result<(), InitializationError> {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(InitializationError::Bootstrap("database unreachable".into()));
        }
        self.initialized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn dispatch(
        &self,
        request: ProxyRequest,
        ctx: &InvocationContext,
        response: ContainerResponse,
    ) -> Result<(), ProxyError> {
        self.inner.dispatch(request, ctx, response)
    }
}

/// Container that accepts every request and never answers.
pub struct DroppingContainer;

#[async_trait]
impl Container for DroppingContainer {
    async fn initialize(&self) -> Result<(), InitializationError> {
        Ok(())
    }

    fn dispatch(
        &self,
        _request: ProxyRequest,
        _ctx: &InvocationContext,
        response: ContainerResponse,
    ) -> Result<(), ProxyError> {
        tokio::spawn(async move {
            response.write_body(b"half");
            drop(response);
        });
        Ok(())
    }
}

/// Fatal handler that counts its calls instead of exiting.
pub fn fatal_counter() -> (Arc<AtomicUsize>, impl Fn(&InitializationError) + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let handle = Arc::clone(&count);
    (count, move |_: &InitializationError| {
        handle.fetch_add(1, Ordering::SeqCst);
    })
}
