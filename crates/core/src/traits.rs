//! Trait seams between the engine, the driver, and the real integrations.

use async_trait::async_trait;

use crate::types::{JsonMap, PassRequest, RunEnvelope, ToolOutcome};
use crate::Result;

/// A backend that can execute one pass of a submitted script.
///
/// A pass is strictly single-threaded and synchronous: the implementation
/// runs the script to completion (or fault) before returning, with no
/// internal parallelism. Drivers that need to stay responsive should offload
/// the call onto a blocking task.
pub trait ScriptRuntime: Send + Sync {
    /// Execute one pass and produce its envelope.
    ///
    /// An `Err` here is a top-level harness fault (workdir setup, audit
    /// persistence); faults raised by the script itself are reported inside
    /// the envelope with `success = false`.
    fn run_pass(&self, request: PassRequest) -> Result<RunEnvelope>;
}

/// The real tool integrations, owned by the driver and never called by the
/// engine. Given a discovered call, performs the actual side-effecting
/// operation and yields its observation.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute the named tool with the given arguments.
    ///
    /// A tool-level failure is data (`ToolOutcome::error`), cached and
    /// replayed like any other observation; an `Err` aborts convergence.
    async fn execute(&self, tool_name: &str, arguments: &JsonMap) -> Result<ToolOutcome>;
}
