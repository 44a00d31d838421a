//! Engine configuration.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

/// How the clamped timeout is applied to a running pass.
///
/// Whether the engine should preempt a runaway script at all is a policy
/// decision, so enforcement is pluggable rather than assumed.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutPolicy {
    /// Terminate the script cooperatively once the wall-clock deadline
    /// passes. The pass ends with a `Terminated` fault.
    #[default]
    Enforced,
    /// Record the clamped limit in the envelope without preempting. An outer
    /// supervisory layer is expected to police the budget.
    Advisory,
}

/// Configuration for the sandbox engine.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineConfig {
    /// Root under which per-run working directories are created. Defaults to
    /// the OS temp dir.
    pub workdir_root: Option<PathBuf>,

    /// Timeout applied when the request does not specify one, in seconds.
    pub default_timeout_secs: u64,

    /// Hard ceiling on the requested timeout, in seconds.
    pub max_timeout_secs: u64,

    /// Whether the clamped timeout is enforced or only reported.
    pub timeout_policy: TimeoutPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workdir_root: None,
            default_timeout_secs: 30,
            max_timeout_secs: 120,
            timeout_policy: TimeoutPolicy::Enforced,
        }
    }
}

impl EngineConfig {
    /// Load configuration from an optional `toolpass.toml` file plus
    /// `TOOLPASS_*` environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("toolpass").required(false))
            .add_source(Environment::with_prefix("TOOLPASS"))
            .build()?;
        s.try_deserialize()
    }

    /// Clamp a requested timeout: default floor when unspecified, hard
    /// ceiling always. The return value is what gets reported back in the
    /// envelope, never the requested value.
    pub fn clamp_timeout(&self, requested_secs: Option<u64>) -> u64 {
        requested_secs
            .unwrap_or(self.default_timeout_secs)
            .min(self.max_timeout_secs)
    }
}
