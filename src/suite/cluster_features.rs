//! `ValkeyGlideClusterFeaturesTest`: cluster client constructor options.

use std::time::Duration;

use tracing::{info, warn};

use crate::case;
use crate::client::Topology;
use crate::config::{Credential, Endpoint, PeriodicChecks, ReadFrom, ReconnectStrategy};
use crate::context::TestContext;
use crate::error::Result;
use crate::suite::features::{all_parameters, base_options, connect, invalid_auth, lazy_connect, ping_with, probe_route};
use crate::suite::TestCase;

const MODE: Topology = Topology::Cluster;

/// Iterations of the create/delete loop.
pub const CREATE_DELETE_LOOPS: usize = 500;

/// Server-side sleep used to trip a short request timeout.
const DEBUG_SLEEP_SECS: u64 = 1;

pub fn cases() -> Vec<TestCase> {
    vec![
        case!("testBasicClusterConstructor", test_basic_constructor),
        case!("testConstructorWithMultipleAddresses", test_multiple_addresses),
        case!("testConstructorWithTlsDisabled", test_tls_disabled),
        case!("testConstructorWithTlsEnabled", test_tls_enabled),
        case!("testConstructorWithNullCredentials", test_null_credentials),
        case!("testConstructorWithPasswordCredentials", test_password_credentials),
        case!("testConstructorInvalidAuth", test_invalid_auth),
        case!("testConstructorWithReadFromPrimary", test_read_from_primary),
        case!("testConstructorWithReadFromPreferReplica", test_read_from_prefer_replica),
        case!("testConstructorWithReadFromAzAffinity", test_read_from_az_affinity),
        case!(
            "testConstructorWithReadFromAzAffinityReplicasAndPrimary",
            test_read_from_az_affinity_replicas
        ),
        case!("testConstructorWithRequestTimeout", test_request_timeout),
        case!("testConstructorWithRequestTimeoutExceeded", test_request_timeout_exceeded),
        case!("testConstructorWithLongTimeout", test_long_timeout),
        case!("testConstructorWithSimpleReconnectStrategy", test_simple_reconnect),
        case!("testConstructorWithComplexReconnectStrategy", test_complex_reconnect),
        case!("testConstructorWithClientName", test_client_name),
        case!("testConstructorWithPeriodicChecksEnabled", test_periodic_checks_enabled),
        case!("testConstructorWithPeriodicChecksDisabled", test_periodic_checks_disabled),
        case!("testConstructorWithClientAz", test_client_az),
        case!("testConstructorWithDifferentClientAz", test_different_client_az),
        case!("testConstructorWithAdvancedConfig", test_advanced_config),
        case!("testConstructorWithLazyConnectEnabled", test_lazy_connect_enabled),
        case!("testConstructorWithLazyConnectDisabled", test_lazy_connect_disabled),
        case!("testConstructorWithAllParameters", test_all_parameters),
        case!("testConstructorWithCommonConfiguration", test_common_configuration),
        case!("testClusterClientCreateDeleteLoop", test_create_delete_loop),
    ]
}

async fn test_basic_constructor(ctx: &TestContext) -> Result<()> {
    ping_with(ctx, MODE, &base_options(ctx, MODE)).await
}

async fn test_multiple_addresses(ctx: &TestContext) -> Result<()> {
    let seed = &ctx.target().cluster_seed;
    let mut options = base_options(ctx, MODE);
    options
        .addresses
        .push(Endpoint::new(seed.host.clone(), seed.port.wrapping_add(1)));
    ping_with(ctx, MODE, &options).await
}

async fn test_tls_disabled(ctx: &TestContext) -> Result<()> {
    if ctx.target().tls {
        return ctx.skip("cluster requires TLS");
    }
    ping_with(ctx, MODE, &base_options(ctx, MODE)).await
}

async fn test_tls_enabled(ctx: &TestContext) -> Result<()> {
    if !ctx.target().tls {
        return ctx.skip("run with --tls to test TLS connections");
    }
    ping_with(ctx, MODE, &base_options(ctx, MODE)).await
}

async fn test_null_credentials(ctx: &TestContext) -> Result<()> {
    if !ctx.target().credential.is_none() {
        return ctx.skip("cluster requires authentication");
    }
    let mut options = base_options(ctx, MODE);
    options.credential = Credential::None;
    ping_with(ctx, MODE, &options).await
}

async fn test_password_credentials(ctx: &TestContext) -> Result<()> {
    if ctx.target().credential.password().is_none() {
        return ctx.skip("no password configured");
    }
    ping_with(ctx, MODE, &base_options(ctx, MODE)).await
}

async fn test_invalid_auth(ctx: &TestContext) -> Result<()> {
    invalid_auth(ctx, MODE).await
}

async fn with_read_from(ctx: &TestContext, read_from: ReadFrom, az: Option<&str>) -> Result<()> {
    let mut options = base_options(ctx, MODE);
    options.read_from = read_from;
    options.client_az = az.map(str::to_string);
    ping_with(ctx, MODE, &options).await
}

async fn test_read_from_primary(ctx: &TestContext) -> Result<()> {
    with_read_from(ctx, ReadFrom::Primary, None).await
}

async fn test_read_from_prefer_replica(ctx: &TestContext) -> Result<()> {
    with_read_from(ctx, ReadFrom::PreferReplica, None).await
}

async fn test_read_from_az_affinity(ctx: &TestContext) -> Result<()> {
    with_read_from(ctx, ReadFrom::AzAffinity, Some("us-east-1a")).await
}

async fn test_read_from_az_affinity_replicas(ctx: &TestContext) -> Result<()> {
    with_read_from(ctx, ReadFrom::AzAffinityReplicasAndPrimary, Some("us-east-1a")).await
}

async fn with_request_timeout(ctx: &TestContext, ms: u32) -> Result<()> {
    let mut options = base_options(ctx, MODE);
    options.request_timeout_ms = Some(ms);
    ping_with(ctx, MODE, &options).await
}

async fn test_request_timeout(ctx: &TestContext) -> Result<()> {
    with_request_timeout(ctx, 5000).await
}

async fn test_long_timeout(ctx: &TestContext) -> Result<()> {
    with_request_timeout(ctx, 10_000).await
}

async fn test_request_timeout_exceeded(ctx: &TestContext) -> Result<()> {
    let mut options = base_options(ctx, MODE);
    options.request_timeout_ms = Some(10);
    let client = connect(ctx, MODE, &options).await?;

    let seconds = DEBUG_SLEEP_SECS.to_string();
    let result = client
        .execute_routed(&["DEBUG", "SLEEP", &seconds], probe_route(MODE))
        .await;

    // Let the server finish sleeping before the next case talks to it.
    tokio::time::sleep(Duration::from_secs(DEBUG_SLEEP_SECS)).await;
    client.close().await?;

    ctx.assert_err(result);
    Ok(())
}

async fn with_reconnect(ctx: &TestContext, strategy: ReconnectStrategy) -> Result<()> {
    let mut options = base_options(ctx, MODE);
    options.reconnect_strategy = Some(strategy);
    ping_with(ctx, MODE, &options).await
}

async fn test_simple_reconnect(ctx: &TestContext) -> Result<()> {
    with_reconnect(ctx, ReconnectStrategy::new(3, 100, 2)).await
}

async fn test_complex_reconnect(ctx: &TestContext) -> Result<()> {
    with_reconnect(ctx, ReconnectStrategy::new(10, 500, 3).with_jitter(20)).await
}

async fn test_client_name(ctx: &TestContext) -> Result<()> {
    let mut options = base_options(ctx, MODE);
    options.client_name = Some("test-cluster-client".into());
    ping_with(ctx, MODE, &options).await
}

async fn with_periodic_checks(ctx: &TestContext, checks: PeriodicChecks) -> Result<()> {
    let mut options = base_options(ctx, MODE);
    options.periodic_checks = Some(checks);
    ping_with(ctx, MODE, &options).await
}

async fn test_periodic_checks_enabled(ctx: &TestContext) -> Result<()> {
    with_periodic_checks(ctx, PeriodicChecks::EnabledDefaultConfigs).await
}

async fn test_periodic_checks_disabled(ctx: &TestContext) -> Result<()> {
    with_periodic_checks(ctx, PeriodicChecks::Disabled).await
}

async fn with_client_az(ctx: &TestContext, az: &str) -> Result<()> {
    let mut options = base_options(ctx, MODE);
    options.client_az = Some(az.to_string());
    ping_with(ctx, MODE, &options).await
}

async fn test_client_az(ctx: &TestContext) -> Result<()> {
    with_client_az(ctx, "us-east-1a").await
}

async fn test_different_client_az(ctx: &TestContext) -> Result<()> {
    with_client_az(ctx, "eu-west-1b").await
}

async fn test_advanced_config(ctx: &TestContext) -> Result<()> {
    let mut options = base_options(ctx, MODE);
    options.connection_timeout_ms = Some(5000);
    ping_with(ctx, MODE, &options).await
}

async fn test_lazy_connect_enabled(ctx: &TestContext) -> Result<()> {
    lazy_connect(ctx, MODE).await
}

async fn test_lazy_connect_disabled(ctx: &TestContext) -> Result<()> {
    let mut options = base_options(ctx, MODE);
    options.lazy_connect = false;
    ping_with(ctx, MODE, &options).await
}

async fn test_all_parameters(ctx: &TestContext) -> Result<()> {
    let mut options = all_parameters(ctx, MODE);
    options.periodic_checks = Some(PeriodicChecks::EnabledDefaultConfigs);
    ping_with(ctx, MODE, &options).await
}

async fn test_common_configuration(ctx: &TestContext) -> Result<()> {
    let mut options = base_options(ctx, MODE);
    options.read_from = ReadFrom::PreferReplica;
    options.request_timeout_ms = Some(5000);
    options.reconnect_strategy = Some(ReconnectStrategy::new(5, 100, 2));
    options.client_name = Some("common-config-client".into());
    ping_with(ctx, MODE, &options).await
}

async fn test_create_delete_loop(ctx: &TestContext) -> Result<()> {
    let mut succeeded = 0usize;
    for iteration in 1..=CREATE_DELETE_LOOPS {
        let attempt = async {
            let client = ctx.new_cluster_instance().await?;
            let pong = client.ping_routed(probe_route(MODE)).await;
            client.close().await?;
            pong
        };
        match attempt.await {
            Ok(true) => succeeded += 1,
            Ok(false) => warn!(iteration, "cluster ping returned no PONG"),
            Err(e) => warn!(iteration, error = %e, "create/delete iteration failed"),
        }
        if iteration % 100 == 0 {
            info!(iteration, total = CREATE_DELETE_LOOPS, "create/delete progress");
        }
    }

    let rate = succeeded as f64 / CREATE_DELETE_LOOPS as f64;
    info!(succeeded, total = CREATE_DELETE_LOOPS, "create/delete loop finished");
    if rate <= 0.9 {
        ctx.fail(format!(
            "Success rate should be > 90%, got {:.1}%",
            rate * 100.0
        ));
    }
    Ok(())
}
