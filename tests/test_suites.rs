//! Every built-in suite run end to end over the in-memory store.

mod common;

use common::{run_context, run_context_with, target_with, text, MemoryStore};
use valkey_conformance::config::Credential;
use valkey_conformance::error::HarnessError;
use valkey_conformance::seeds::SeedSources;
use valkey_conformance::suite::cluster::NOT_IN_CLUSTER;
use valkey_conformance::suite::runner::{Outcome, SuiteReport, SuiteRunner};
use valkey_conformance::suite::{BuiltinSuite, Suite};

async fn run(store: &std::sync::Arc<MemoryStore>, suite: BuiltinSuite, filter: Option<&str>) -> (SuiteReport, String) {
    let runner = SuiteRunner::new(run_context(store));
    let mut out = Vec::new();
    let report = runner
        .run_suite(&suite, filter, &mut out)
        .await
        .expect("suite ran");
    (report, text(out))
}

fn failures(report: &SuiteReport) -> Vec<String> {
    report
        .results
        .iter()
        .flat_map(|r| r.failures.iter().cloned())
        .collect()
}

#[tokio::test]
async fn standalone_suite_passes() {
    let store = MemoryStore::new().shared();
    let (report, output) = run(&store, BuiltinSuite::Standalone, None).await;

    assert!(report.is_success(), "{:?}", failures(&report));
    assert!(output.starts_with("Running tests for class 'ValkeyGlideTest'...\n"));
    assert!(output.ends_with("All tests passed. \\o/\n"));
    assert_eq!(report.outcome_of("testMultiExec"), Some(Outcome::Skipped));
    assert_eq!(report.outcome_of("testPipeline"), Some(Outcome::Skipped));
    assert_eq!(report.count(Outcome::Skipped), 2);
    assert_eq!(report.outcome_of("testDifferentTypeHash"), Some(Outcome::Passed));
    assert_eq!(report.outcome_of("testGeoDist"), Some(Outcome::Passed));
}

#[tokio::test]
async fn standalone_key_fixtures_use_the_ledger_check() {
    let store = MemoryStore::new().shared();
    let (report, output) = run(&store, BuiltinSuite::Standalone, Some("testKeyFixtures")).await;

    assert_eq!(report.outcome_of("testKeyFixtures"), Some(Outcome::Passed), "{output}");
    for key in ["string-1", "set-1", "list-1", "hash-1", "zset-1", "stream-1"] {
        assert!(store.contains_key(0, key), "{key}");
    }
}

#[tokio::test]
async fn every_connection_is_released() {
    let store = MemoryStore::new().shared();
    run(&store, BuiltinSuite::Standalone, None).await;
    assert_eq!(store.live_clients(), 0);
    assert!(store.connects() >= BuiltinSuite::Standalone.cases().len());
}

#[tokio::test]
async fn old_server_skips_version_gated_cases() {
    let store = MemoryStore::new().with_version("3.0.7").as_redis().shared();
    let (report, _) = run(&store, BuiltinSuite::Standalone, None).await;

    assert!(report.is_success(), "{:?}", failures(&report));
    for name in ["testUnlink", "testXAdd", "testXRange", "testXLen", "testGeoAdd"] {
        assert_eq!(report.outcome_of(name), Some(Outcome::Skipped), "{name}");
    }
    assert_eq!(report.outcome_of("testType"), Some(Outcome::Passed));
}

#[tokio::test]
async fn filter_runs_one_case() {
    let store = MemoryStore::new().shared();
    let (report, output) = run(&store, BuiltinSuite::Standalone, Some("testping")).await;

    assert_eq!(report.results.len(), 1);
    assert!(output.contains("testPing [PASSED]\n"));
}

#[tokio::test]
async fn authenticated_server() {
    let credential = Credential::from_parts(Some("alice"), Some("s3cret"));
    let store = MemoryStore::new().with_password(credential.clone()).shared();
    let sources = SeedSources::default();
    let runner = SuiteRunner::new(run_context_with(&store, target_with(credential), sources));

    let mut out = Vec::new();
    let report = runner
        .run_suite(&BuiltinSuite::Standalone, Some("testSet"), &mut out)
        .await
        .unwrap();
    assert!(report.is_success(), "{}", text(out));
}

#[tokio::test]
async fn rejected_credential_fails_cases() {
    let store = MemoryStore::new()
        .with_password(Credential::Password("right".into()))
        .shared();
    let target = target_with(Credential::Password("wrong".into()));
    let runner = SuiteRunner::new(run_context_with(&store, target, SeedSources::default()));

    let mut out = Vec::new();
    let report = runner
        .run_suite(&BuiltinSuite::Standalone, Some("testEcho"), &mut out)
        .await
        .unwrap();
    assert_eq!(report.outcome_of("testEcho"), Some(Outcome::Failed));
    let output = text(out);
    assert!(output.contains("Uncaught error"), "{output}");
}

#[tokio::test]
async fn cluster_suite_passes_and_skips_unsupported_cases() {
    let store = MemoryStore::new().shared();
    let (report, output) = run(&store, BuiltinSuite::Cluster, None).await;

    assert!(report.is_success(), "{:?}", failures(&report));
    assert!(output.starts_with("Running tests for class 'ValkeyGlideClusterTest'...\n"));
    for name in NOT_IN_CLUSTER {
        assert_eq!(report.outcome_of(name), Some(Outcome::Skipped), "{name}");
    }
    for name in ["testMasters", "testSessionSavePath", "testSeedSource", "testKeyTypeFixtures"] {
        assert_eq!(report.outcome_of(name), Some(Outcome::Passed), "{name}");
    }
}

#[tokio::test]
async fn cluster_suite_is_fatal_without_a_cluster() {
    let store = MemoryStore::new().without_cluster().shared();
    let runner = SuiteRunner::new(run_context(&store));
    let mut out = Vec::new();

    let err = runner
        .run_suite(&BuiltinSuite::Cluster, None, &mut out)
        .await
        .unwrap_err();
    assert!(err.is_fatal());
    let HarnessError::Fatal { seed_source, .. } = err else {
        unreachable!();
    };
    assert_eq!(seed_source, "");
}

#[tokio::test]
async fn features_suite_passes() {
    let store = MemoryStore::new().shared();
    let (report, _) = run(&store, BuiltinSuite::Features, None).await;

    assert!(report.is_success(), "{:?}", failures(&report));
    assert_eq!(report.outcome_of("testConstructorWithLazyConnect"), Some(Outcome::Passed));
    assert_eq!(report.outcome_of("testConstructorInvalidAuth"), Some(Outcome::Passed));
    assert_eq!(report.outcome_of("testConstructorWithTlsEnabled"), Some(Outcome::Skipped));
    assert_eq!(report.outcome_of("testConstructorWithCredentials"), Some(Outcome::Skipped));
}

#[tokio::test]
async fn cluster_features_suite_passes() {
    let store = MemoryStore::new().shared();
    let (report, _) = run(&store, BuiltinSuite::ClusterFeatures, None).await;

    assert!(report.is_success(), "{:?}", failures(&report));
    assert_eq!(
        report.outcome_of("testConstructorWithRequestTimeoutExceeded"),
        Some(Outcome::Passed)
    );
    assert_eq!(report.outcome_of("testClusterClientCreateDeleteLoop"), Some(Outcome::Passed));
    assert_eq!(store.live_clients(), 0);
}

#[tokio::test]
async fn connection_request_suite_passes_offline() {
    let store = MemoryStore::new().shared();
    let (report, _) = run(&store, BuiltinSuite::ConnectionRequest, None).await;

    assert!(report.is_success(), "{:?}", failures(&report));
    assert_eq!(report.count(Outcome::Skipped), 0);
    assert_eq!(store.connects(), 0);
}

#[tokio::test]
#[ignore = "needs a live server at CONFORMANCE_HOST:CONFORMANCE_PORT"]
async fn live_standalone_suite() {
    use std::sync::Arc;
    use valkey_conformance::connect::ConnectionFactory;
    use valkey_conformance::context::RunContext;
    use valkey_conformance::seeds::SeedResolver;

    let run = RunContext::new(
        ConnectionFactory::live(common::live_target()),
        SeedResolver::new(SeedSources::default()),
    );
    let runner = SuiteRunner::new(Arc::new(run));

    let client = runner.run_context().factory().standalone().await.unwrap();
    let key = common::test_prefix();
    assert!(client.set(&key, "ok").await.unwrap());
    client.del(&[key.as_str()]).await.unwrap();
    client.close().await.unwrap();

    let mut out = Vec::new();
    let report = runner
        .run_suite(&BuiltinSuite::Standalone, None, &mut out)
        .await
        .unwrap();
    assert!(report.is_success(), "{}", text(out));
}
