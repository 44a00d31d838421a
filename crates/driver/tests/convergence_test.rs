//! End-to-end convergence behavior against the real rhai sandbox.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use toolpass_core::traits::ScriptRuntime;
use toolpass_core::types::{PassRequest, RunEnvelope, ToolOutcome};
use toolpass_core::{Error, Result};
use toolpass_driver::{MockExecutor, PassDriver};
use toolpass_engine::RhaiSandbox;

/// Runtime decorator that counts passes, so tests can assert how many
/// resubmissions convergence took.
struct CountingRuntime {
    inner: RhaiSandbox,
    passes: AtomicUsize,
}

impl CountingRuntime {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: RhaiSandbox::default(),
            passes: AtomicUsize::new(0),
        })
    }

    fn passes(&self) -> usize {
        self.passes.load(Ordering::SeqCst)
    }
}

impl ScriptRuntime for CountingRuntime {
    fn run_pass(&self, request: PassRequest) -> Result<RunEnvelope> {
        self.passes.fetch_add(1, Ordering::SeqCst);
        self.inner.run_pass(request)
    }
}

/// Executor that counts how many real tool executions it was asked for.
#[derive(Default)]
struct CountingExecutor {
    calls: AtomicUsize,
}

impl CountingExecutor {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl toolpass_core::traits::ToolExecutor for CountingExecutor {
    async fn execute(
        &self,
        _tool_name: &str,
        _arguments: &toolpass_core::types::JsonMap,
    ) -> Result<ToolOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ToolOutcome::ok("resolved"))
    }
}

fn adder() -> MockExecutor {
    MockExecutor::new().with_tool("add", |args| {
        let a = args["a"].as_i64().unwrap_or_default();
        let b = args["b"].as_i64().unwrap_or_default();
        ToolOutcome::ok((a + b).to_string())
    })
}

#[tokio::test]
async fn single_call_script_resolves_to_the_real_sum() {
    let driver = PassDriver::new(CountingRuntime::new(), Arc::new(adder()));
    let envelope = driver
        .resolve(PassRequest::new(
            r#"let result = tools.invoke("add", #{a: 1, b: 2});"#,
        ))
        .await
        .unwrap();

    assert!(envelope.success);
    assert!(!envelope.needs_more_passes);
    assert_eq!(envelope.return_value.as_deref(), Some("3"));
}

#[tokio::test]
async fn loop_over_three_items_converges_in_exactly_two_passes() {
    let runtime = CountingRuntime::new();
    let executor = MockExecutor::new().with_tool("read", |args| {
        ToolOutcome::ok(format!("<{}>", args["key"].as_str().unwrap_or_default()))
    });
    let driver = PassDriver::new(runtime.clone(), Arc::new(executor));

    let envelope = driver
        .resolve(PassRequest::new(
            r#"
            let items = ["a", "b", "c"];
            let result = "";
            for item in items {
                result += tools.invoke("read", #{key: item});
            }
            "#,
        ))
        .await
        .unwrap();

    assert_eq!(runtime.passes(), 2);
    assert_eq!(envelope.return_value.as_deref(), Some("<a><b><c>"));
}

#[tokio::test]
async fn provisional_branch_result_is_never_surfaced() {
    let runtime = CountingRuntime::new();
    let executor = MockExecutor::new().with_tool("check", |_| ToolOutcome::ok("ready"));
    let driver = PassDriver::new(runtime.clone(), Arc::new(executor));

    let envelope = driver
        .resolve(PassRequest::new(
            r#"
            let x = tools.invoke("check");
            let result = if x == "ready" { "go" } else { "wait" };
            "#,
        ))
        .await
        .unwrap();

    // Pass 1 necessarily computed "wait" against the placeholder; only the
    // converged "go" ever leaves the driver.
    assert_eq!(runtime.passes(), 2);
    assert_eq!(envelope.return_value.as_deref(), Some("go"));
}

#[tokio::test]
async fn dependent_call_chain_deeper_than_the_ceiling_is_non_convergence() {
    // Each call's argument derives from the previous call's observation, so
    // one new identity appears per pass: a 3-deep chain cannot converge
    // within a 2-pass ceiling.
    let executor = MockExecutor::new().with_tool("step", |args| {
        ToolOutcome::ok(format!("{}+", args["prev"].as_str().unwrap_or_default()))
    });
    let driver = PassDriver::new(
        Arc::new(RhaiSandbox::default()),
        Arc::new(executor),
    )
    .with_max_passes(2);

    let outcome = driver
        .resolve(PassRequest::new(
            r#"
            let a = tools.invoke("step", #{prev: "seed"});
            let b = tools.invoke("step", #{prev: a});
            let result = tools.invoke("step", #{prev: b});
            "#,
        ))
        .await;

    assert!(matches!(outcome, Err(Error::NonConvergence { passes: 2 })));
}

#[tokio::test]
async fn deeper_ceiling_lets_the_same_chain_converge() {
    let executor = MockExecutor::new().with_tool("step", |args| {
        ToolOutcome::ok(format!("{}+", args["prev"].as_str().unwrap_or_default()))
    });
    let runtime = CountingRuntime::new();
    let driver = PassDriver::new(runtime.clone(), Arc::new(executor)).with_max_passes(8);

    let envelope = driver
        .resolve(PassRequest::new(
            r#"
            let a = tools.invoke("step", #{prev: "seed"});
            let b = tools.invoke("step", #{prev: a});
            let result = tools.invoke("step", #{prev: b});
            "#,
        ))
        .await
        .unwrap();

    // One new layer resolves per pass, plus the final fully-cached pass.
    assert_eq!(runtime.passes(), 4);
    assert_eq!(envelope.return_value.as_deref(), Some("seed+++"));
}

#[tokio::test]
async fn exhausted_ceiling_executes_no_tools_it_cannot_replay() {
    // With a ceiling of 1 there is no later pass that could consume a real
    // observation, so the driver must report non-convergence without ever
    // invoking the executor.
    let executor = Arc::new(CountingExecutor::default());
    let driver = PassDriver::new(Arc::new(RhaiSandbox::default()), executor.clone())
        .with_max_passes(1);

    let outcome = driver
        .resolve(PassRequest::new(r#"let result = tools.invoke("step");"#))
        .await;

    assert!(matches!(outcome, Err(Error::NonConvergence { passes: 1 })));
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn final_pass_of_a_larger_ceiling_skips_resolution_too() {
    // A 3-deep dependent chain needs 4 passes; with a ceiling of 2 only the
    // calls discovered on pass 1 may be executed, since pass 2's discoveries
    // could never be replayed.
    let executor = Arc::new(CountingExecutor::default());
    let driver = PassDriver::new(Arc::new(RhaiSandbox::default()), executor.clone())
        .with_max_passes(2);

    let outcome = driver
        .resolve(PassRequest::new(
            r#"
            let a = tools.invoke("step", #{prev: "seed"});
            let result = tools.invoke("step", #{prev: a});
            "#,
        ))
        .await;

    assert!(matches!(outcome, Err(Error::NonConvergence { passes: 2 })));
    // Pass 1 discovered two calls (the second with a placeholder argument);
    // nothing from pass 2 was executed.
    assert_eq!(executor.calls(), 2);
}

#[tokio::test]
async fn tool_level_failures_are_cached_observations_not_errors() {
    let executor =
        MockExecutor::new().with_tool("fragile", |_| ToolOutcome::error("backend unavailable"));
    let driver = PassDriver::new(Arc::new(RhaiSandbox::default()), Arc::new(executor));

    let envelope = driver
        .resolve(PassRequest::new(
            r#"let result = tools.invoke("fragile");"#,
        ))
        .await
        .unwrap();

    assert!(!envelope.needs_more_passes);
    assert_eq!(envelope.return_value.as_deref(), Some("backend unavailable"));
    assert!(envelope.result_entries[0].has_error);
}

#[tokio::test]
async fn missing_tool_aborts_convergence() {
    let driver = PassDriver::new(
        Arc::new(RhaiSandbox::default()),
        Arc::new(MockExecutor::new()),
    );
    let outcome = driver
        .resolve(PassRequest::new(r#"let result = tools.invoke("ghost");"#))
        .await;
    assert!(matches!(outcome, Err(Error::ToolNotFound(_))));
}
