//! Serverless bridge library.
//!
//! Runs an async web framework (any tower `Service`, such as an axum
//! `Router`) behind a per-event invocation model: one inbound event in, one
//! response object out, with hard budgets on startup and on each invocation.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod model;
pub mod observability;
pub mod security;
pub mod sync;

pub use config::ContainerConfig;
pub use error::{InitializationError, ProxyError};
pub use http::{Container, ContainerHandler, TowerContainer};
pub use lifecycle::{AsyncInitializer, Initializer};
pub use model::{InboundEvent, InvocationContext, ProxyResponse};
pub use security::SecurityContext;
