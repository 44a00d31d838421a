//! Core types, traits, and error definitions for toolpass.
//!
//! This crate provides the building blocks shared by the sandbox engine and
//! the convergence driver: the pass data model (call records, result entries,
//! run envelopes), the error type, engine configuration, and the trait seams
//! (`ScriptRuntime`, `ToolExecutor`) that the other crates plug into.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{EngineConfig, TimeoutPolicy};
pub use error::{Error, Result};
pub use types::{
    CallRecord, FaultRecord, JsonMap, PassRequest, ResolutionCache, ResultEntry, RunEnvelope,
    ToolOutcome,
};
