//! Class resolution and the aggregate exit code.

mod common;

use std::sync::Arc;

use common::{run_context, text, MemoryStore};
use valkey_conformance::context::{Deployment, TestContext};
use valkey_conformance::driver::{run_classes, EXIT_FAILURE, EXIT_SUCCESS};
use valkey_conformance::error::{HarnessError, Result};
use valkey_conformance::suite::runner::SuiteRunner;
use valkey_conformance::suite::{parse_class_list, Suite, SuiteRegistry, TestCase};
use valkey_conformance::case;

async fn drive(store: &Arc<MemoryStore>, registry: &SuiteRegistry, classes: &[&str], filter: Option<&str>) -> (i32, String) {
    let runner = SuiteRunner::new(run_context(store));
    let ids = parse_class_list(classes);
    let mut out = Vec::new();
    let code = run_classes(registry, &runner, &ids, filter, &mut out)
        .await
        .expect("report sink accepts writes");
    (code, text(out))
}

struct Plugin {
    fail: bool,
}

async fn plugin_passes(ctx: &TestContext) -> Result<()> {
    ctx.assert_true(true);
    Ok(())
}

async fn plugin_fails(ctx: &TestContext) -> Result<()> {
    ctx.assert_eq(&1, &2);
    Ok(())
}

impl Suite for Plugin {
    fn name(&self) -> &str {
        "PluginTest"
    }

    fn deployment(&self) -> Deployment {
        Deployment::Offline
    }

    fn cases(&self) -> Vec<TestCase> {
        if self.fail {
            vec![case!("testBroken", plugin_fails)]
        } else {
            vec![case!("testFine", plugin_passes)]
        }
    }
}

#[tokio::test]
async fn all_passing_classes_exit_zero() {
    let store = MemoryStore::new().shared();
    let (code, output) = drive(&store, &SuiteRegistry::new(), &["ConnectionRequest,ValkeyGlide"], None).await;

    assert_eq!(code, EXIT_SUCCESS, "{output}");
    assert!(output.contains("Running tests for class 'ConnectionRequestTest'..."));
    assert!(output.contains("Running tests for class 'ValkeyGlideTest'..."));
}

#[tokio::test]
async fn unknown_class_exits_one_but_others_still_run() {
    let store = MemoryStore::new().shared();
    let (code, output) = drive(&store, &SuiteRegistry::new(), &["nosuchclass", "connectionrequest"], None).await;

    assert_eq!(code, EXIT_FAILURE);
    assert!(output.contains("Fatal: couldn't find test class 'nosuchclass'"));
    assert!(output.contains("Running tests for class 'ConnectionRequestTest'..."));
}

#[tokio::test]
async fn registered_plugin_is_resolved() {
    let store = MemoryStore::new().shared();
    let mut registry = SuiteRegistry::new();
    registry.register("MyPlugin", Arc::new(Plugin { fail: false }));

    let (code, output) = drive(&store, &registry, &["myplugin"], None).await;
    assert_eq!(code, EXIT_SUCCESS);
    assert!(output.contains("testFine [PASSED]"));
}

#[tokio::test]
async fn one_failing_class_sets_the_bit() {
    let store = MemoryStore::new().shared();
    let mut registry = SuiteRegistry::new();
    registry.register("broken", Arc::new(Plugin { fail: true }));

    let (code, output) = drive(&store, &registry, &["broken", "connectionrequest"], None).await;
    assert_eq!(code, EXIT_FAILURE);
    assert!(output.contains("testBroken [FAILED]"));
    assert!(output.contains("All tests passed. \\o/"));
}

#[tokio::test]
async fn fatal_cluster_error_stops_the_run() {
    let store = MemoryStore::new().without_cluster().shared();
    let (code, output) = drive(
        &store,
        &SuiteRegistry::new(),
        &["valkeyglidecluster", "connectionrequest"],
        None,
    )
    .await;

    assert_eq!(code, EXIT_FAILURE);
    assert!(output.contains("Fatal error:"));
    assert!(!output.contains("ConnectionRequestTest"));
}

#[tokio::test]
async fn silent_server_fails_the_class_but_not_the_run() {
    let store = MemoryStore::new().shared();
    store.silence_info(true);
    let (code, output) = drive(&store, &SuiteRegistry::new(), &["valkeyglide", "connectionrequest"], Some("testPing")).await;

    assert_eq!(code, EXIT_FAILURE);
    assert!(output.contains("testPing [FAILED]"));
    assert!(output.contains("Uncaught error 'Failed to connect to Valkey/Redis server."));
    assert!(!output.contains("Fatal error:"));
    assert!(output.contains("Running tests for class 'ConnectionRequestTest'..."));
}

/// A sink whose reader has gone away.
struct ClosedSink;

impl std::io::Write for ClosedSink {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::ErrorKind::BrokenPipe.into())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn write_errors_reach_the_caller() {
    let store = MemoryStore::new().shared();
    let runner = SuiteRunner::new(run_context(&store));
    let registry = SuiteRegistry::new();

    for classes in [&["nosuchclass"][..], &["connectionrequest"][..]] {
        let ids = parse_class_list(classes);
        let err = run_classes(&registry, &runner, &ids, None, &mut ClosedSink)
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::Io(ref e) if e.kind() == std::io::ErrorKind::BrokenPipe), "{err:?}");
    }
}

#[tokio::test]
async fn builtin_ids_cannot_be_shadowed() {
    let store = MemoryStore::new().shared();
    let mut registry = SuiteRegistry::new();
    registry.register("connectionrequest", Arc::new(Plugin { fail: true }));

    let (code, output) = drive(&store, &registry, &["connectionrequest"], None).await;
    assert_eq!(code, EXIT_SUCCESS);
    assert!(!output.contains("testBroken"));
}
