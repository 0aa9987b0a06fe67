//! Data model shared by every subsystem.
//!
//! # Data Flow
//! ```text
//! event JSON
//!     → event.rs (InboundEvent, one variant per wire shape)
//!     → request.rs (ProxyRequest, normalized)
//!     → [framework writes a ContainerResponse]
//!     → response.rs (ProxyResponse, serialized back)
//! ```
//!
//! `multi_map.rs` backs headers and stage variables, `query.rs` the
//! case-sensitive query parameters;
//! `context.rs` carries the platform's invocation metadata.

pub mod context;
pub mod event;
pub mod multi_map;
pub mod query;
pub mod request;
pub mod response;

pub use context::InvocationContext;
pub use event::{InboundEvent, RequestSource};
pub use multi_map::{Headers, MultiValueMap};
pub use query::QueryParams;
pub use request::{ProxyRequest, RequestMetadata};
pub use response::{ErrorModel, ProxyResponse};
