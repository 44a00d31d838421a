//! Call proxy: the stand-in for "the set of callable tools" inside a pass.
//!
//! The proxy never performs real work. It computes a deterministic identity
//! for each call, answers from the resolution cache when it can, hands back a
//! recognizable placeholder when it cannot, and records every invocation
//! either way. That bookkeeping turns "call an external operation" into
//! "look up or defer", which is what makes cross-boundary replay possible
//! without real suspension.

use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};

use toolpass_core::types::{CallRecord, JsonMap, ResolutionCache, ResultEntry};

/// Sentinel wrapping used for unresolved observations.
const PLACEHOLDER_PREFIX: &str = "__TOOL_CALL_PENDING_";
const PLACEHOLDER_SUFFIX: &str = "__";

/// Hex chars kept from the sha256 digest. Short identities keep envelopes
/// readable at the cost of a bounded collision risk (16^8 space); widen this
/// constant if that risk ever matters.
const IDENTITY_HEX_LEN: usize = 8;

/// Canonical serialization of an argument map. `JsonMap` is BTree-backed, so
/// keys serialize sorted and the result is independent of construction order.
pub fn canonical_json(arguments: &JsonMap) -> String {
    serde_json::Value::Object(arguments.clone()).to_string()
}

/// Deterministic identity for a call: `call_` plus a truncated sha256 of the
/// tool name and canonicalized arguments.
pub fn call_identity(tool_name: &str, arguments: &JsonMap) -> String {
    let payload = format!("{}:{}", tool_name, canonical_json(arguments));
    let hex = format!("{:x}", Sha256::digest(payload.as_bytes()));
    format!("call_{}", &hex[..IDENTITY_HEX_LEN])
}

/// The placeholder observation for a still-unresolved call.
pub fn placeholder_for(identity: &str) -> String {
    format!("{PLACEHOLDER_PREFIX}{identity}{PLACEHOLDER_SUFFIX}")
}

/// Whether an observation is a pending placeholder.
pub fn is_placeholder(observation: &str) -> bool {
    observation.starts_with(PLACEHOLDER_PREFIX) && observation.ends_with(PLACEHOLDER_SUFFIX)
}

/// Per-pass accumulator of discovered calls and their result entries.
///
/// One log per pass, owned by the proxy and drained when the envelope is
/// assembled. Never ambient, never shared across passes.
#[derive(Debug, Default)]
pub struct CallLog {
    /// Every call the script attempted, in discovery order.
    pub calls: Vec<CallRecord>,
    /// Exactly one entry per call.
    pub results: Vec<ResultEntry>,
}

/// Clonable handle the script holds as its `tools` binding.
///
/// Clones share the same cache view and the same call log; the sandbox clones
/// one into the script scope and keeps another to drain afterwards.
#[derive(Clone)]
pub struct ToolProxy {
    cache: Arc<ResolutionCache>,
    log: Arc<Mutex<CallLog>>,
}

impl ToolProxy {
    /// Create a proxy over the cache supplied for this pass.
    pub fn new(cache: ResolutionCache) -> Self {
        Self {
            cache: Arc::new(cache),
            log: Arc::new(Mutex::new(CallLog::default())),
        }
    }

    /// Intercept one tool call: compute its identity, decide what value to
    /// hand back, and record the invocation.
    ///
    /// Recording happens whether or not the returned value ever influences
    /// the script's final state, so the log is a complete trace of everything
    /// the script attempted during this pass.
    pub fn invoke(&self, tool_name: &str, arguments: JsonMap) -> String {
        let identity = call_identity(tool_name, &arguments);
        let (observation, has_error) = match self.cache.get(&identity) {
            Some(outcome) => {
                tracing::debug!(tool = tool_name, identity = %identity, "resolution cache hit");
                (outcome.observation.clone(), outcome.has_error)
            }
            None => {
                tracing::debug!(tool = tool_name, identity = %identity, "tool call deferred");
                (placeholder_for(&identity), false)
            }
        };

        let mut log = self.log.lock().expect("call log poisoned");
        log.calls.push(CallRecord {
            tool_name: tool_name.to_string(),
            arguments,
            call_identity: identity.clone(),
        });
        log.results.push(ResultEntry {
            call_identity: identity,
            observation: observation.clone(),
            has_error,
        });
        observation
    }

    /// Drain the accumulated log. Called once when the pass ends.
    pub fn take_log(&self) -> CallLog {
        std::mem::take(&mut *self.log.lock().expect("call log poisoned"))
    }
}
