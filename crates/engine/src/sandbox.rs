//! Sandboxed execution of one pass.
//!
//! Each pass compiles and runs the submitted script body inside a fresh rhai
//! engine and scope: the `tools` proxy, a `WORKDIR` path, and a `RUN_NAME`
//! marker are the only ambient state. Output is captured, wall-clock time is
//! measured around execution only, and any fault raised by the script is
//! converted into a structured record instead of propagating.

use rhai::{Dynamic, Engine, EvalAltResult, Scope};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use toolpass_core::config::{EngineConfig, TimeoutPolicy};
use toolpass_core::traits::ScriptRuntime;
use toolpass_core::types::{FaultRecord, JsonMap, PassRequest, RunEnvelope};
use toolpass_core::{Error, Result};

use crate::proxy::{is_placeholder, CallLog, ToolProxy};

/// File name under the run's working directory where the script body is
/// persisted for audit.
const AUDIT_FILE: &str = "script.rhai";

/// Variable the script sets to surface a return value.
const RETURN_VARIABLE: &str = "result";

/// Rhai-hosted sandbox implementing the pass contract.
///
/// Strictly single-threaded and non-reentrant within one pass; the apparent
/// suspension around tool calls is achieved purely by replay, driven from
/// outside via the resolution cache.
pub struct RhaiSandbox {
    config: EngineConfig,
}

impl RhaiSandbox {
    /// Create a sandbox with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Deterministic default run name derived from the script body, so the
    /// identical script resubmitted across passes lands in the same workdir.
    fn default_run_name(script: &str) -> String {
        let hex = format!("{:x}", Sha256::digest(script.as_bytes()));
        format!("run_{}", &hex[..8])
    }

    /// Create the per-run working directory and persist the script body for
    /// audit. Failures here are top-level harness faults, reported distinctly
    /// from anything the script does.
    fn prepare_workdir(&self, run_name: &str, script: &str) -> Result<PathBuf> {
        let root = self
            .config
            .workdir_root
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let workdir = root.join(run_name);
        std::fs::create_dir_all(&workdir).map_err(|e| {
            Error::harness(format!(
                "cannot create workdir {}: {}",
                workdir.display(),
                e
            ))
        })?;
        std::fs::write(workdir.join(AUDIT_FILE), script)
            .map_err(|e| Error::harness(format!("cannot persist script body: {}", e)))?;
        Ok(workdir)
    }

    fn build_engine(
        &self,
        stdout: &Arc<Mutex<String>>,
        stderr: &Arc<Mutex<String>>,
        timeout_limit: Duration,
    ) -> Engine {
        let mut engine = Engine::new();

        engine.register_type_with_name::<ToolProxy>("ToolProxy");
        engine.register_fn(
            "invoke",
            |proxy: &mut ToolProxy,
             tool_name: &str,
             arguments: rhai::Map|
             -> std::result::Result<String, Box<EvalAltResult>> {
                Ok(proxy.invoke(tool_name, map_to_json(arguments)?))
            },
        );
        engine.register_fn("invoke", |proxy: &mut ToolProxy, tool_name: &str| -> String {
            proxy.invoke(tool_name, JsonMap::new())
        });

        {
            let stdout = stdout.clone();
            engine.on_print(move |text| {
                let mut buf = stdout.lock().expect("stdout buffer poisoned");
                buf.push_str(text);
                buf.push('\n');
            });
        }
        {
            let stderr = stderr.clone();
            engine.on_debug(move |text, _source, _pos| {
                let mut buf = stderr.lock().expect("stderr buffer poisoned");
                buf.push_str(text);
                buf.push('\n');
            });
        }

        if self.config.timeout_policy == TimeoutPolicy::Enforced {
            let deadline = Instant::now() + timeout_limit;
            engine.on_progress(move |_operations| {
                if Instant::now() >= deadline {
                    Some("timeout".into())
                } else {
                    None
                }
            });
        }

        engine
    }

    fn faulted_envelope(&self, timeout_limit: u64, fault: FaultRecord) -> RunEnvelope {
        RunEnvelope {
            success: false,
            execution_time: 0.0,
            timeout_limit,
            stdout: None,
            stderr: None,
            call_records: Vec::new(),
            result_entries: Vec::new(),
            needs_more_passes: false,
            return_value: None,
            error: Some(fault),
        }
    }
}

impl Default for RhaiSandbox {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl ScriptRuntime for RhaiSandbox {
    fn run_pass(&self, request: PassRequest) -> Result<RunEnvelope> {
        let run_name = request
            .name
            .clone()
            .unwrap_or_else(|| Self::default_run_name(&request.script));
        let timeout_limit = self.config.clamp_timeout(request.timeout_secs);
        let workdir = self.prepare_workdir(&run_name, &request.script)?;

        tracing::info!(
            run = %run_name,
            timeout_limit,
            cached = request.resolution_cache.len(),
            "starting pass"
        );

        let proxy = ToolProxy::new(request.resolution_cache);
        let stdout = Arc::new(Mutex::new(String::new()));
        let stderr = Arc::new(Mutex::new(String::new()));

        let engine = self.build_engine(&stdout, &stderr, Duration::from_secs(timeout_limit));

        // Fresh scope per pass: two passes of the same script with different
        // caches cannot observe each other's state.
        let mut scope = Scope::new();
        scope.push("tools", proxy.clone());
        scope.push_constant("WORKDIR", workdir.display().to_string());
        scope.push_constant("RUN_NAME", run_name.clone());

        // Compilation happens outside the timed window.
        let ast = match engine.compile(&request.script) {
            Ok(ast) => ast,
            Err(parse_error) => {
                tracing::warn!(run = %run_name, error = %parse_error, "script failed to compile");
                return Ok(self.faulted_envelope(
                    timeout_limit,
                    FaultRecord {
                        error_type: "SyntaxError".to_string(),
                        message: parse_error.to_string(),
                        trace: format!("{} @ {}", AUDIT_FILE, parse_error.1),
                    },
                ));
            }
        };

        let started = Instant::now();
        let outcome = engine.run_ast_with_scope(&mut scope, &ast);
        let execution_time = started.elapsed().as_secs_f64();

        let (success, error) = match outcome {
            Ok(()) => (true, None),
            Err(fault) => {
                tracing::warn!(run = %run_name, error = %fault, "script raised during pass");
                (false, Some(fault_record(&fault)))
            }
        };

        // Everything accumulated before a fault point stays visible.
        let CallLog { calls, results } = proxy.take_log();
        let needs_more_passes = results
            .iter()
            .any(|entry| is_placeholder(&entry.observation));
        let return_value = scope
            .get_value::<Dynamic>(RETURN_VARIABLE)
            .map(|value| value.to_string());

        let envelope = RunEnvelope {
            success,
            execution_time,
            timeout_limit,
            stdout: take_buffer(&stdout),
            stderr: take_buffer(&stderr),
            call_records: calls,
            result_entries: results,
            needs_more_passes,
            return_value,
            error,
        };

        tracing::info!(
            run = %run_name,
            success = envelope.success,
            needs_more_passes = envelope.needs_more_passes,
            discovered = envelope.call_records.len(),
            "pass finished"
        );
        Ok(envelope)
    }
}

/// Convert a rhai object map into the canonical JSON argument map.
fn map_to_json(map: rhai::Map) -> std::result::Result<JsonMap, Box<EvalAltResult>> {
    let mut arguments = JsonMap::new();
    for (key, value) in map {
        let json: serde_json::Value = rhai::serde::from_dynamic(&value)?;
        arguments.insert(key.to_string(), json);
    }
    Ok(arguments)
}

fn take_buffer(buffer: &Arc<Mutex<String>>) -> Option<String> {
    let captured = buffer.lock().expect("capture buffer poisoned");
    if captured.is_empty() {
        None
    } else {
        Some(captured.clone())
    }
}

/// Map an eval fault into the envelope's structured record. Faults raised
/// inside nested function calls unwrap to the innermost cause.
fn fault_record(fault: &EvalAltResult) -> FaultRecord {
    if let EvalAltResult::ErrorInFunctionCall(_, _, inner, _) = fault {
        return fault_record(inner);
    }
    let error_type = match fault {
        EvalAltResult::ErrorSystem(..) => "SystemError",
        EvalAltResult::ErrorParsing(..) => "SyntaxError",
        EvalAltResult::ErrorFunctionNotFound(..) => "FunctionNotFound",
        EvalAltResult::ErrorVariableNotFound(..) => "VariableNotFound",
        EvalAltResult::ErrorMismatchDataType(..) => "TypeMismatch",
        EvalAltResult::ErrorArithmetic(..) => "ArithmeticError",
        EvalAltResult::ErrorArrayBounds(..) => "IndexOutOfBounds",
        EvalAltResult::ErrorStackOverflow(..) => "StackOverflow",
        EvalAltResult::ErrorTooManyOperations(..) => "OperationBudgetExceeded",
        EvalAltResult::ErrorTerminated(..) => "Terminated",
        EvalAltResult::ErrorRuntime(..) => "RuntimeError",
        _ => "EvalError",
    };
    FaultRecord {
        error_type: error_type.to_string(),
        message: fault.to_string(),
        trace: format!("{} @ {}", AUDIT_FILE, fault.position()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_run_name_is_deterministic() {
        let a = RhaiSandbox::default_run_name("let result = 1;");
        let b = RhaiSandbox::default_run_name("let result = 1;");
        let c = RhaiSandbox::default_run_name("let result = 2;");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("run_"));
    }

    #[test]
    fn requested_timeout_is_reported_clamped() {
        let sandbox = RhaiSandbox::default();
        let envelope = sandbox
            .run_pass(PassRequest::new("let result = 1;").with_timeout(500))
            .unwrap();
        assert_eq!(envelope.timeout_limit, 120);
        assert!(envelope.success);
    }

    #[test]
    fn unspecified_timeout_gets_default_floor() {
        let sandbox = RhaiSandbox::default();
        let envelope = sandbox
            .run_pass(PassRequest::new("let result = 1;"))
            .unwrap();
        assert_eq!(envelope.timeout_limit, 30);
    }

    #[test]
    fn compile_error_becomes_syntax_fault() {
        let sandbox = RhaiSandbox::default();
        let envelope = sandbox
            .run_pass(PassRequest::new("let result = ;"))
            .unwrap();
        assert!(!envelope.success);
        let fault = envelope.error.unwrap();
        assert_eq!(fault.error_type, "SyntaxError");
        assert!(envelope.call_records.is_empty());
    }

    #[test]
    fn missing_return_variable_yields_none() {
        let sandbox = RhaiSandbox::default();
        let envelope = sandbox.run_pass(PassRequest::new("let x = 41 + 1;")).unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.return_value, None);
    }

    #[test]
    fn workdir_is_exposed_to_the_script() {
        let sandbox = RhaiSandbox::default();
        let envelope = sandbox
            .run_pass(PassRequest::new("let result = WORKDIR;").with_name("workdir_probe"))
            .unwrap();
        let value = envelope.return_value.unwrap();
        assert!(value.contains("workdir_probe"));
    }
}
