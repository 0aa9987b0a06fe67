//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Initializer::from_environment (init_type.rs decides sync vs async)
//!     → Synchronous: bootstrap inline, fail fast
//!     → Asynchronous: spawn bootstrap worker → bounded wait on ready gate
//!         → ready in time: serve
//!         → overrun: swap in a fresh gate, serve; invocations wait on it
//!
//! Shutdown:
//!     AsyncInitializer::shutdown aborts the worker; waiters are released
//!     with an error instead of hanging
//! ```
//!
//! # Design Decisions
//! - Bootstrap failure in the worker is fatal: no framework, no service
//! - The gate swap and the worker's release share one lock, so the worker
//!   always opens the gate that is currently published

pub mod init_type;
pub mod startup;

pub use init_type::{initialization_type, is_async_initialization_disabled};
pub use startup::{process_start_time, AsyncInitializer, Initializer};
