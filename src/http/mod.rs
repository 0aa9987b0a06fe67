//! Exchange handling subsystem.
//!
//! # Data Flow
//! ```text
//! InboundEvent + InvocationContext
//!     → handler.rs (resolve security, orchestrate one exchange)
//!     → reader.rs (event → ProxyRequest)
//!     → [wait on ready gate while bootstrap runs]
//!     → dispatch.rs (Container::dispatch, framework tasks write)
//!     → container.rs (accumulate, commit opens the completion gate)
//!     → writer.rs (ResponseParts → ProxyResponse)
//!     → exception.rs (any ProxyError → mapped response)
//! ```

pub mod container;
pub mod dispatch;
pub mod exception;
pub mod handler;
pub mod reader;
pub mod writer;

pub use container::{ContainerResponse, PendingResponse, ResponseParts};
pub use dispatch::{Container, TowerContainer};
pub use exception::{ExceptionHandler, ProxyExceptionHandler};
pub use handler::ContainerHandler;
pub use reader::{EventRequestReader, RequestReader};
pub use writer::{ProxyResponseWriter, ResponseWriter};
