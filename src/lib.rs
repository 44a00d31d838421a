//! toolpass - deferred tool-call execution engine.
//!
//! Lets a dynamically supplied script invoke external, side-effecting tools
//! as ordinary in-language calls while the real execution happens outside the
//! script's trust boundary. A pass runs the script against a sandbox with a
//! recording proxy in place of the tools; unresolved calls come back as
//! placeholders, the driver executes them for real, and the identical script
//! is replayed with the enriched cache until it converges.
//!
//! This crate is the public facade: it re-exports the engine, the driver, and
//! the shared core types.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use toolpass::{MockExecutor, PassDriver, PassRequest, RhaiSandbox, ToolOutcome};
//!
//! toolpass::configure_tracing()?;
//!
//! let executor = MockExecutor::new()
//!     .with_tool("add", |args| ToolOutcome::ok("3"));
//! let driver = PassDriver::new(Arc::new(RhaiSandbox::default()), Arc::new(executor));
//!
//! let envelope = driver
//!     .resolve(PassRequest::new(r#"let result = tools.invoke("add", #{a: 1, b: 2});"#))
//!     .await?;
//! assert_eq!(envelope.return_value.as_deref(), Some("3"));
//! ```

pub use toolpass_core::{
    config, error, traits, types, CallRecord, EngineConfig, Error, FaultRecord, JsonMap,
    PassRequest, ResolutionCache, Result, ResultEntry, RunEnvelope, TimeoutPolicy, ToolOutcome,
};
pub use toolpass_driver::{MockExecutor, PassDriver, DEFAULT_MAX_PASSES};
pub use toolpass_engine::{call_identity, is_placeholder, placeholder_for, RhaiSandbox, ToolProxy};

/// Initialize tracing with an env-filter and stdout formatting layer.
pub fn configure_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,toolpass=debug".into()),
    );
    let fmt_layer = tracing_subscriber::fmt::layer();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;
    Ok(())
}
