//! `ValkeyGlideFeaturesTest`: client constructor options against a live
//! standalone server.
//!
//! Every case builds its own client from explicit options, exercises it and
//! closes it. The helpers here are shared with the cluster flavour.

use crate::case;
use crate::client::{ClientHandle, Route, Topology};
use crate::config::{ClientOptions, ConnectionRequest, Credential, Endpoint, ReadFrom, ReconnectStrategy};
use crate::context::TestContext;
use crate::error::{HarnessError, Result};
use crate::suite::TestCase;

pub fn cases() -> Vec<TestCase> {
    vec![
        case!("testBasicConstructor", test_basic_constructor),
        case!("testConstructorWithSingleAddress", test_single_address),
        case!("testConstructorWithMultipleAddresses", test_multiple_addresses),
        case!("testConstructorWithTlsDisabled", test_tls_disabled),
        case!("testConstructorWithTlsEnabled", test_tls_enabled),
        case!("testConstructorWithCredentials", test_credentials),
        case!("testConstructorInvalidAuth", test_invalid_auth),
        case!("testConstructorWithReadFromPrimary", test_read_from_primary),
        case!("testConstructorWithReadFromPreferReplica", test_read_from_prefer_replica),
        case!("testConstructorWithRequestTimeout", test_request_timeout),
        case!("testConstructorWithReconnectStrategy", test_reconnect_strategy),
        case!("testConstructorWithDatabaseId", test_database_id),
        case!("testConstructorWithClientName", test_client_name),
        case!("testConstructorWithClientAz", test_client_az),
        case!("testConstructorWithAdvancedConfig", test_advanced_config),
        case!("testConstructorWithLazyConnect", test_lazy_connect),
        case!("testConstructorWithAllParameters", test_all_parameters),
        case!("testConstructorWithAzAffinityReadStrategy", test_az_affinity),
        case!("testConstructorWithComplexReconnectStrategies", test_complex_reconnect),
        case!("testConstructorBasicFunctionality", test_basic_functionality),
        case!("testConstructorParameterValidation", test_parameter_validation),
    ]
}

// ── Shared helpers ───────────────────────────────────────────────

/// Options aimed at the run's target (cluster: its seed), with the run's
/// TLS setting and credential.
pub(crate) fn base_options(ctx: &TestContext, topology: Topology) -> ClientOptions {
    let target = ctx.target();
    let address = match topology {
        Topology::Standalone => target.endpoint(),
        Topology::Cluster => target.cluster_seed.clone(),
    };
    let mut options = target.options_for(vec![address]);
    options.credential = target.credential.clone();
    options
}

pub(crate) async fn connect(ctx: &TestContext, topology: Topology, options: &ClientOptions) -> Result<ClientHandle> {
    let request = match topology {
        Topology::Standalone => ConnectionRequest::standalone(options)?,
        Topology::Cluster => ConnectionRequest::cluster(options)?,
    };
    ctx.factory().connect(&request).await
}

/// Route used for probes: the default for standalone, a keyed primary in a cluster.
pub(crate) fn probe_route(topology: Topology) -> Route {
    match topology {
        Topology::Standalone => Route::Default,
        Topology::Cluster => Route::PrimaryForKey("test".into()),
    }
}

/// Connect with `options`, assert that PING succeeds, close.
pub(crate) async fn ping_with(ctx: &TestContext, topology: Topology, options: &ClientOptions) -> Result<()> {
    let client = connect(ctx, topology, options).await?;
    let pong = client.ping_routed(probe_route(topology)).await;
    client.close().await?;
    ctx.assert_true(pong?);
    Ok(())
}

/// Number of connections `CLIENT LIST` reports on the probe route.
pub(crate) async fn client_count(client: &ClientHandle, topology: Topology) -> Result<usize> {
    let reply = client
        .execute_routed(&["CLIENT", "LIST"], probe_route(topology))
        .await?;
    let listing = reply
        .into_opt_string()?
        .ok_or_else(|| HarnessError::Type("CLIENT LIST returned nil".into()))?;
    Ok(listing.lines().filter(|line| !line.trim().is_empty()).count())
}

pub(crate) async fn invalid_auth(ctx: &TestContext, topology: Topology) -> Result<()> {
    let mut options = base_options(ctx, topology);
    options.credential = Credential::from_parts(Some("invalid_user"), Some("invalid_password"));

    let error = match connect(ctx, topology, &options).await {
        Err(e) => e,
        Ok(client) => {
            let result = client.ping_routed(probe_route(topology)).await;
            client.close().await?;
            match result {
                Err(e) => e,
                Ok(_) => {
                    ctx.fail("Should fail when running commands with invalid authentication");
                    return Ok(());
                }
            }
        }
    };
    ctx.assert_true(error.is_auth_failure());
    Ok(())
}

pub(crate) async fn lazy_connect(ctx: &TestContext, topology: Topology) -> Result<()> {
    let monitor = connect(ctx, topology, &base_options(ctx, topology)).await?;
    let before = client_count(&monitor, topology).await?;

    let mut options = base_options(ctx, topology);
    options.lazy_connect = true;
    let lazy = connect(ctx, topology, &options).await?;

    let outcome = async {
        ctx.assert_eq(&before, &client_count(&monitor, topology).await?);
        ctx.assert_true(lazy.ping_routed(probe_route(topology)).await?);
        let after = client_count(&monitor, topology).await?;
        ctx.assert_true(after > before);
        Ok::<(), HarnessError>(())
    }
    .await;

    lazy.close().await?;
    monitor.close().await?;
    outcome
}

pub(crate) fn all_parameters(ctx: &TestContext, topology: Topology) -> ClientOptions {
    let mut options = base_options(ctx, topology);
    options.read_from = ReadFrom::Primary;
    options.request_timeout_ms = Some(5000);
    options.reconnect_strategy = Some(ReconnectStrategy::new(5, 100, 2).with_jitter(10));
    options.client_name = Some("all-params-client".into());
    options.client_az = Some("us-east-1a".into());
    options.connection_timeout_ms = Some(5000);
    options.lazy_connect = false;
    options
}

// ── Cases ────────────────────────────────────────────────────────

const MODE: Topology = Topology::Standalone;

async fn test_basic_constructor(ctx: &TestContext) -> Result<()> {
    if ctx.target().tls {
        return ctx.skip("basic constructor cannot reach a TLS server");
    }
    let mut options = ClientOptions::new(vec![ctx.target().endpoint()]);
    options.credential = ctx.target().credential.clone();
    ping_with(ctx, MODE, &options).await
}

async fn test_single_address(ctx: &TestContext) -> Result<()> {
    ping_with(ctx, MODE, &base_options(ctx, MODE)).await
}

async fn test_multiple_addresses(ctx: &TestContext) -> Result<()> {
    let mut options = base_options(ctx, MODE);
    let target = ctx.target();
    options
        .addresses
        .push(Endpoint::new(target.host.clone(), target.port.wrapping_add(1)));
    ping_with(ctx, MODE, &options).await
}

async fn test_tls_disabled(ctx: &TestContext) -> Result<()> {
    if ctx.target().tls {
        return ctx.skip("server requires TLS");
    }
    let mut options = base_options(ctx, MODE);
    options.use_tls = false;
    options.use_insecure_tls = false;
    ping_with(ctx, MODE, &options).await
}

async fn test_tls_enabled(ctx: &TestContext) -> Result<()> {
    if !ctx.target().tls {
        return ctx.skip("run with --tls to test TLS connections");
    }
    ping_with(ctx, MODE, &base_options(ctx, MODE)).await
}

async fn test_credentials(ctx: &TestContext) -> Result<()> {
    if ctx.target().credential.is_none() {
        return ctx.skip("no credentials configured");
    }
    ping_with(ctx, MODE, &base_options(ctx, MODE)).await
}

async fn test_invalid_auth(ctx: &TestContext) -> Result<()> {
    invalid_auth(ctx, MODE).await
}

async fn test_read_from_primary(ctx: &TestContext) -> Result<()> {
    let mut options = base_options(ctx, MODE);
    options.read_from = ReadFrom::Primary;
    ping_with(ctx, MODE, &options).await
}

async fn test_read_from_prefer_replica(ctx: &TestContext) -> Result<()> {
    let mut options = base_options(ctx, MODE);
    options.read_from = ReadFrom::PreferReplica;
    ping_with(ctx, MODE, &options).await
}

async fn test_request_timeout(ctx: &TestContext) -> Result<()> {
    let mut options = base_options(ctx, MODE);
    options.request_timeout_ms = Some(5000);
    ping_with(ctx, MODE, &options).await
}

async fn test_reconnect_strategy(ctx: &TestContext) -> Result<()> {
    let mut options = base_options(ctx, MODE);
    options.reconnect_strategy = Some(ReconnectStrategy::new(5, 100, 2));
    ping_with(ctx, MODE, &options).await
}

async fn test_database_id(ctx: &TestContext) -> Result<()> {
    let key = "features:database-id";
    let mut options = base_options(ctx, MODE);
    options.database_id = Some(1);
    let db1 = connect(ctx, MODE, &options).await?;
    let db0 = ctx.client()?;

    db0.del(&[key]).await?;
    ctx.assert_true(db1.set(key, "db1").await?);
    ctx.assert_eq(&Some("db1".to_string()), &db1.get(key).await?);
    ctx.assert_eq(&None, &db0.get(key).await?);

    db1.del(&[key]).await?;
    db1.close().await
}

async fn test_client_name(ctx: &TestContext) -> Result<()> {
    let mut options = base_options(ctx, MODE);
    options.client_name = Some("foobar".into());
    let client = connect(ctx, MODE, &options).await?;
    let name = client.raw_command(&["CLIENT", "GETNAME"]).await;
    client.close().await?;
    ctx.assert_eq(&Some("foobar".to_string()), &name?.into_opt_string()?);
    Ok(())
}

async fn test_client_az(ctx: &TestContext) -> Result<()> {
    let mut options = base_options(ctx, MODE);
    options.client_az = Some("us-east-1a".into());
    ping_with(ctx, MODE, &options).await
}

async fn test_advanced_config(ctx: &TestContext) -> Result<()> {
    let mut options = base_options(ctx, MODE);
    options.connection_timeout_ms = Some(5000);
    ping_with(ctx, MODE, &options).await
}

async fn test_lazy_connect(ctx: &TestContext) -> Result<()> {
    lazy_connect(ctx, MODE).await
}

async fn test_all_parameters(ctx: &TestContext) -> Result<()> {
    let mut options = all_parameters(ctx, MODE);
    options.database_id = Some(0);
    ping_with(ctx, MODE, &options).await
}

async fn test_az_affinity(ctx: &TestContext) -> Result<()> {
    let mut options = base_options(ctx, MODE);
    options.read_from = ReadFrom::AzAffinity;
    options.client_az = Some("us-east-1a".into());
    ping_with(ctx, MODE, &options).await
}

async fn test_complex_reconnect(ctx: &TestContext) -> Result<()> {
    for strategy in [
        ReconnectStrategy::new(1, 10, 2),
        ReconnectStrategy::new(10, 500, 3),
        ReconnectStrategy::new(3, 100, 2).with_jitter(50),
    ] {
        let mut options = base_options(ctx, MODE);
        options.reconnect_strategy = Some(strategy);
        ping_with(ctx, MODE, &options).await?;
    }
    Ok(())
}

async fn test_basic_functionality(ctx: &TestContext) -> Result<()> {
    let mut options = base_options(ctx, MODE);
    options.request_timeout_ms = Some(5000);
    let client = connect(ctx, MODE, &options).await?;

    let key = format!("constructor_test_{}", std::process::id());
    ctx.assert_true(client.ping().await?);
    ctx.assert_true(client.set(&key, "test_value").await?);
    ctx.assert_eq(&Some("test_value".to_string()), &client.get(&key).await?);
    ctx.assert_eq(&1, &client.exists(&[&key]).await?);
    ctx.assert_eq(&1, &client.del(&[&key]).await?);
    client.close().await
}

async fn test_parameter_validation(ctx: &TestContext) -> Result<()> {
    ping_with(ctx, MODE, &base_options(ctx, MODE)).await?;

    let mut defaults = base_options(ctx, MODE);
    defaults.read_from = ReadFrom::Primary;
    defaults.lazy_connect = false;
    ping_with(ctx, MODE, &defaults).await?;

    let mut rejected = base_options(ctx, MODE);
    rejected.addresses.clear();
    if let Some(e) = ctx.assert_err(connect(ctx, MODE, &rejected).await) {
        ctx.assert_true(matches!(e, HarnessError::Config(_)));
    }
    Ok(())
}
