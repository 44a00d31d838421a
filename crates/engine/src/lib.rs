//! Deferred tool-call execution engine for toolpass.
//!
//! This crate lets a dynamically supplied script invoke external,
//! side-effecting tools as ordinary in-language calls, even though the real
//! execution happens outside the script's trust boundary. No tool ever runs
//! here: every call is recorded, answered from the driver-supplied resolution
//! cache when possible, and answered with a pending placeholder otherwise.
//! The suspend/resume illusion is pure replay: the driver resubmits the
//! identical script with an enriched cache until no placeholders remain.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  Driver (convergence loop, real tools)   │
//! │    ↓ run_pass(script, cache)             │
//! ├──────────────────────────────────────────┤
//! │  RhaiSandbox (fresh namespace per pass)  │
//! │    tools.invoke(name, #{..})             │
//! │    ↓ intercepted by                      │
//! ├──────────────────────────────────────────┤
//! │  ToolProxy (identity, cache lookup,      │
//! │             placeholder, call log)       │
//! └──────────────────────────────────────────┘
//! ```
//!
//! Because the whole script restarts from its first statement on every pass,
//! non-tool side effects (prints, file writes) repeat once per pass. Script
//! bodies must keep such effects idempotent, or only meaningful once the
//! envelope reports `needs_more_passes = false`.

pub mod proxy;
pub mod sandbox;

pub use proxy::{call_identity, is_placeholder, placeholder_for, CallLog, ToolProxy};
pub use sandbox::RhaiSandbox;
