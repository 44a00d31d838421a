//! In-memory tool executor for testing without real integrations.

use std::collections::HashMap;

use async_trait::async_trait;

use toolpass_core::traits::ToolExecutor;
use toolpass_core::types::{JsonMap, ToolOutcome};
use toolpass_core::{Error, Result};

type ToolFn = Box<dyn Fn(&JsonMap) -> ToolOutcome + Send + Sync>;

/// Executor backed by a closure table keyed by tool name.
///
/// Unknown tools yield `Error::ToolNotFound`, which aborts convergence the
/// same way a missing real integration would.
#[derive(Default)]
pub struct MockExecutor {
    tools: HashMap<String, ToolFn>,
}

impl MockExecutor {
    /// Create an empty executor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool implementation.
    pub fn with_tool(
        mut self,
        name: impl Into<String>,
        tool: impl Fn(&JsonMap) -> ToolOutcome + Send + Sync + 'static,
    ) -> Self {
        self.tools.insert(name.into(), Box::new(tool));
        self
    }
}

#[async_trait]
impl ToolExecutor for MockExecutor {
    async fn execute(&self, tool_name: &str, arguments: &JsonMap) -> Result<ToolOutcome> {
        match self.tools.get(tool_name) {
            Some(tool) => Ok(tool(arguments)),
            None => Err(Error::tool_not_found(tool_name)),
        }
    }
}
