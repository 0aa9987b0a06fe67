//! Response accumulator shared between the framework and the handler.
//!
//! # Responsibilities
//! - Collect status, headers and body written by framework tasks
//! - Open the per-exchange completion gate exactly once, on commit
//! - Report an abandoned exchange when every writer goes away uncommitted
//!
//! # Design Decisions
//! - Writer handles are cheap clones; the gate signal lives behind a
//!   `Mutex<Option<_>>` and is taken by the first commit
//! - Writes after commit are ignored

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::http::StatusCode;
use serde_json::json;

use crate::error::ProxyError;
use crate::model::event::RequestSource;
use crate::model::multi_map::Headers;
use crate::sync::gate::{gate, Gate, GateSignal};

pub const CONTENT_TYPE: &str = "Content-Type";
pub const APPLICATION_JSON: &str = "application/json";

/// Snapshot of what the framework wrote.
#[derive(Debug, Clone)]
pub struct ResponseParts {
    pub status: StatusCode,
    pub headers: Headers,
    pub body: Vec<u8>,
    /// Event shape of the exchange, which picks the outbound layout.
    pub source: RequestSource,
}

impl ResponseParts {
    fn new(source: RequestSource) -> Self {
        Self {
            status: StatusCode::OK,
            headers: Headers::new(),
            body: Vec::new(),
            source,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get_first(CONTENT_TYPE).map(String::as_str)
    }
}

#[derive(Debug)]
struct ResponseState {
    parts: ResponseParts,
    committed: bool,
}

/// Writer handle given to the framework.
#[derive(Debug, Clone)]
pub struct ContainerResponse {
    state: Arc<Mutex<ResponseState>>,
    signal: Arc<Mutex<Option<GateSignal>>>,
}

/// Reader half kept by the handler.
#[derive(Debug)]
pub struct PendingResponse {
    state: Arc<Mutex<ResponseState>>,
    completed: Gate,
}

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ContainerResponse {
    /// A fresh accumulator and the reader that waits for its commit.
    pub fn new(source: RequestSource) -> (ContainerResponse, PendingResponse) {
        let (signal, completed) = gate();
        let state = Arc::new(Mutex::new(ResponseState {
            parts: ResponseParts::new(source),
            committed: false,
        }));
        let writer = ContainerResponse {
            state: Arc::clone(&state),
            signal: Arc::new(Mutex::new(Some(signal))),
        };
        (writer, PendingResponse { state, completed })
    }

    fn update(&self, f: impl FnOnce(&mut ResponseParts)) {
        let mut state = locked(&self.state);
        if state.committed {
            tracing::debug!("Ignoring write to a committed response");
            return;
        }
        f(&mut state.parts);
    }

    pub fn set_status(&self, status: StatusCode) {
        self.update(|p| p.status = status);
    }

    /// Replace every value of `name`.
    pub fn set_header(&self, name: &str, value: impl Into<String>) {
        let value = value.into();
        self.update(|p| p.headers.put_single(name, value));
    }

    /// Append a value to `name`.
    pub fn add_header(&self, name: &str, value: impl Into<String>) {
        let value = value.into();
        self.update(|p| p.headers.add(name, value));
    }

    pub fn set_content_type(&self, content_type: &str) {
        self.set_header(CONTENT_TYPE, content_type);
    }

    /// Append bytes to the body.
    pub fn write_body(&self, bytes: &[u8]) {
        self.update(|p| p.body.extend_from_slice(bytes));
    }

    pub fn is_committed(&self) -> bool {
        locked(&self.state).committed
    }

    /// Freeze the response and release the waiting handler.
    ///
    /// Returns `false` if an earlier call already committed.
    pub fn commit(&self) -> bool {
        {
            let mut state = locked(&self.state);
            if state.committed {
                return false;
            }
            state.committed = true;
        }
        if let Some(signal) = locked(&self.signal).take() {
            signal.open();
        }
        true
    }

    /// Replace anything written so far with a JSON error body, then commit.
    pub fn send_error(&self, status: StatusCode, message: &str) -> bool {
        let body = json!({ "message": message }).to_string();
        self.update(|p| {
            p.status = status;
            p.headers.clear();
            p.headers.put_single(CONTENT_TYPE, APPLICATION_JSON.to_string());
            p.body = body.into_bytes();
        });
        self.commit()
    }
}

impl PendingResponse {
    /// Wait for the commit, with no timeout.
    pub async fn completed(self) -> Result<ResponseParts, ProxyError> {
        self.completed
            .wait()
            .await
            .map_err(|_| ProxyError::NoResponse)?;
        let state = locked(&self.state);
        Ok(state.parts.clone())
    }
}
