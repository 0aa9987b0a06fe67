//! Synchronization primitives.
//!
//! # Design Decisions
//! - Completion and readiness are expressed as one single-use gate type
//! - A gate remembers its signal, so late waiters are never stranded

pub mod gate;

pub use gate::{gate, Gate, GateError, GateSignal};
