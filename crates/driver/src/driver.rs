//! Pass loop: execute, resolve, resubmit.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;

use toolpass_core::traits::{ScriptRuntime, ToolExecutor};
use toolpass_core::types::{CallRecord, PassRequest, ResolutionCache, RunEnvelope, ToolOutcome};
use toolpass_core::{Error, Result};

/// Pass ceiling applied when none is configured. A script whose tool
/// arguments derive from a still-unresolved placeholder can never converge
/// (its call identities change every pass), and the engine cannot detect
/// that; the ceiling turns the loop into an explicit error instead.
pub const DEFAULT_MAX_PASSES: usize = 8;

/// Drives a script to convergence against a runtime and a tool executor.
///
/// Owns the accumulated resolution cache for the duration of one `resolve`
/// call; the engine only ever reads it, once per pass.
pub struct PassDriver {
    runtime: Arc<dyn ScriptRuntime>,
    executor: Arc<dyn ToolExecutor>,
    max_passes: usize,
}

impl PassDriver {
    /// Create a driver with the default pass ceiling.
    pub fn new(runtime: Arc<dyn ScriptRuntime>, executor: Arc<dyn ToolExecutor>) -> Self {
        Self {
            runtime,
            executor,
            max_passes: DEFAULT_MAX_PASSES,
        }
    }

    /// Override the pass ceiling.
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// Converge the request to its authoritative envelope.
    ///
    /// Returns the first envelope with `needs_more_passes = false`, or
    /// `Error::NonConvergence` once the pass ceiling is exhausted. A cache
    /// supplied on the request seeds the accumulated cache.
    pub async fn resolve(&self, request: PassRequest) -> Result<RunEnvelope> {
        if self.max_passes == 0 {
            return Err(Error::invalid_request("pass ceiling must be at least 1"));
        }

        let mut cache = request.resolution_cache.clone();
        for pass in 1..=self.max_passes {
            let envelope = self
                .run_single_pass(request.clone().with_cache(cache.clone()))
                .await?;

            if !envelope.needs_more_passes {
                tracing::info!(pass, success = envelope.success, "script converged");
                return Ok(envelope);
            }

            // Provisional pass: log and discard the outputs, resolve the calls.
            tracing::debug!(
                pass,
                provisional_return = ?envelope.return_value,
                "provisional envelope discarded"
            );

            // The ceiling is spent: no pass remains that could replay freshly
            // resolved observations, so executing real tools now would only
            // discard their side effects.
            if pass == self.max_passes {
                break;
            }

            let pending = pending_calls(&envelope, &cache);
            tracing::info!(pass, pending = pending.len(), "executing newly discovered calls");
            self.execute_pending(pending, &mut cache).await?;
        }

        Err(Error::NonConvergence {
            passes: self.max_passes,
        })
    }

    /// Execute the newly discovered calls concurrently and merge their
    /// outcomes. The engine places no ordering constraint on them.
    async fn execute_pending(
        &self,
        pending: Vec<CallRecord>,
        cache: &mut ResolutionCache,
    ) -> Result<()> {
        let executions = pending.into_iter().map(|record| {
            let executor = self.executor.clone();
            async move {
                let outcome = executor
                    .execute(&record.tool_name, &record.arguments)
                    .await?;
                Ok::<(String, ToolOutcome), Error>((record.call_identity, outcome))
            }
        });

        for resolved in join_all(executions).await {
            let (identity, outcome) = resolved?;
            cache.insert(identity, outcome);
        }
        Ok(())
    }

    /// One pass is blocking and single-threaded by contract; keep it off the
    /// async workers.
    async fn run_single_pass(&self, request: PassRequest) -> Result<RunEnvelope> {
        let runtime = self.runtime.clone();
        tokio::task::spawn_blocking(move || runtime.run_pass(request))
            .await
            .map_err(|e| Error::internal(format!("pass task panicked: {}", e)))?
    }
}

/// Calls from this pass that the accumulated cache cannot answer yet,
/// deduplicated by identity in discovery order.
fn pending_calls(envelope: &RunEnvelope, cache: &ResolutionCache) -> Vec<CallRecord> {
    let mut seen = HashSet::new();
    envelope
        .call_records
        .iter()
        .filter(|record| {
            !cache.contains_key(&record.call_identity) && seen.insert(record.call_identity.clone())
        })
        .cloned()
        .collect()
}
