//! Wire-visible data model for passes and their outcomes.
//!
//! Everything here is serde-serializable: the envelope and its parts cross a
//! process boundary between the engine and whatever driver owns the real tool
//! integrations.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// JSON object map used for tool arguments. `serde_json`'s map is
/// BTree-backed, so key order is canonical regardless of how the script
/// constructed the arguments.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

// =============================================================================
// Call Records & Results
// =============================================================================

/// One tool invocation discovered during a pass.
///
/// Created the moment the script references a tool, never mutated, and
/// discarded with the envelope at the end of the pass. Persistence across
/// passes is the driver's job via the resolution cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    /// Name of the tool the script invoked.
    pub tool_name: String,

    /// Canonicalized keyword arguments.
    pub arguments: JsonMap,

    /// Deterministic digest of `tool_name` + canonical arguments.
    pub call_identity: String,
}

/// The outcome of really executing a tool: what the driver stores in the
/// resolution cache and what a `ToolExecutor` yields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// Textual observation the tool produced.
    pub observation: String,

    /// Whether the tool reported a failure.
    pub has_error: bool,
}

impl ToolOutcome {
    /// A successful observation.
    pub fn ok(observation: impl Into<String>) -> Self {
        Self {
            observation: observation.into(),
            has_error: false,
        }
    }

    /// A failed observation.
    pub fn error(observation: impl Into<String>) -> Self {
        Self {
            observation: observation.into(),
            has_error: true,
        }
    }
}

/// Accumulated map from call identity to real outcome. Owned by the driver;
/// the engine reads it once at the start of a pass and never writes it.
pub type ResolutionCache = HashMap<String, ToolOutcome>;

/// The value handed back to the script for one call record: either the cached
/// real observation or a pending placeholder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEntry {
    /// Identity of the call this entry answers.
    pub call_identity: String,

    /// Cached observation, or the placeholder sentinel when unresolved.
    pub observation: String,

    /// Failure flag carried over from the cache (always false for
    /// placeholders).
    pub has_error: bool,
}

// =============================================================================
// Run Envelope
// =============================================================================

/// Structured record of a fault raised inside (or while compiling) the
/// script body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultRecord {
    /// Short type name of the fault, e.g. `RuntimeError` or `SyntaxError`.
    #[serde(rename = "type")]
    pub error_type: String,

    /// Human-readable message.
    pub message: String,

    /// Source position trace.
    pub trace: String,
}

/// The complete, self-contained output of one pass.
///
/// Constructed fresh per pass and immutable once returned. Envelopes are
/// never merged inside the engine; aggregation across passes is a driver
/// concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEnvelope {
    /// False iff the pass raised.
    pub success: bool,

    /// Wall-clock seconds spent executing the script body (compilation and
    /// namespace setup excluded).
    pub execution_time: f64,

    /// The clamped timeout that was actually applied, in seconds. Always the
    /// clamped value, never the requested one.
    pub timeout_limit: u64,

    /// Captured standard output, if any was produced.
    pub stdout: Option<String>,

    /// Captured standard error, if any was produced.
    pub stderr: Option<String>,

    /// Every tool call the script attempted during this pass, in discovery
    /// order, whether or not its value influenced the final state.
    pub call_records: Vec<CallRecord>,

    /// Exactly one entry per call record, from the same pass.
    pub result_entries: Vec<ResultEntry>,

    /// True iff any result entry's observation is still a placeholder. While
    /// true, `return_value` and `stdout` are provisional and must not be
    /// acted on.
    pub needs_more_passes: bool,

    /// Stringified value of the script's `result` variable, if it set one.
    pub return_value: Option<String>,

    /// Fault record when the pass raised.
    pub error: Option<FaultRecord>,
}

impl RunEnvelope {
    /// Whether this envelope's outputs may be acted on. Envelopes from passes
    /// with unresolved placeholders are provisional: branches taken on a
    /// placeholder value may differ from the converged run.
    pub fn is_authoritative(&self) -> bool {
        !self.needs_more_passes
    }
}

// =============================================================================
// Pass Request
// =============================================================================

/// Input to a single pass: the script body plus optional run metadata and the
/// driver's accumulated resolution cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassRequest {
    /// Script source text. Resubmitted byte-identical on every pass.
    pub script: String,

    /// Identifying name for the run, used for the working directory and
    /// audit trail. Defaults deterministically from the script digest.
    pub name: Option<String>,

    /// Requested timeout in seconds. Clamped by the engine; the clamped value
    /// is what the envelope reports.
    pub timeout_secs: Option<u64>,

    /// Identity-to-outcome cache accumulated by the driver.
    #[serde(default)]
    pub resolution_cache: ResolutionCache,
}

impl PassRequest {
    /// Create a request for the given script with defaults everywhere else.
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            name: None,
            timeout_secs: None,
            resolution_cache: ResolutionCache::new(),
        }
    }

    /// Set the run name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the requested timeout in seconds.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Replace the resolution cache.
    pub fn with_cache(mut self, cache: ResolutionCache) -> Self {
        self.resolution_cache = cache;
        self
    }
}
