//! Convergence driver for the toolpass pass orchestration contract.
//!
//! The engine only discovers tool calls; it never executes them. This crate
//! supplies the other half of the protocol: run a pass, execute every newly
//! discovered call for real, merge the observations into the accumulated
//! resolution cache, and resubmit the identical script until the envelope
//! reports no pending placeholders or the pass ceiling is hit.
//!
//! Provisional envelopes (those with `needs_more_passes = true`) are never
//! surfaced to callers: a branch taken on a placeholder value may differ from
//! the converged run, so acting on their `return_value` or `stdout` would be
//! a correctness hazard. `PassDriver::resolve` returns only the first
//! authoritative envelope, or an explicit `NonConvergence` error.

pub mod driver;
pub mod mock;

pub use driver::{PassDriver, DEFAULT_MAX_PASSES};
pub use mock::MockExecutor;
