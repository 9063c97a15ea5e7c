//! `ConnectionRequestTest`: constructor options mapped onto the connection
//! request, checked without a server.

use std::time::Duration;

use crate::case;
use crate::config::{
    ClientOptions, ConnectionRequest, Credential, Endpoint, PeriodicChecks, ReadFrom,
    ReconnectStrategy, TlsMode,
};
use crate::context::TestContext;
use crate::error::{HarnessError, Result};
use crate::suite::TestCase;

pub fn cases() -> Vec<TestCase> {
    vec![
        case!("testStandaloneBasicConstructor", test_standalone_basic_constructor),
        case!("testStandaloneMultipleAddresses", test_standalone_multiple_addresses),
        case!("testClusterBasicConstructor", test_cluster_basic_constructor),
        case!("testClusterMultipleAddresses", test_cluster_multiple_addresses),
        case!("testStandaloneUseTlsOn", test_standalone_use_tls_on),
        case!("testClusterUseTlsOn", test_cluster_use_tls_on),
        case!("testStandaloneUseTlsOff", test_standalone_use_tls_off),
        case!("testClusterUseTlsOff", test_cluster_use_tls_off),
        case!("testStandaloneCredentials", test_standalone_credentials),
        case!("testClusterCredentials", test_cluster_credentials),
        case!("testStandaloneReadFrom", test_standalone_read_from),
        case!("testClusterReadFrom", test_cluster_read_from),
        case!("testStandaloneRequestTimeout", test_standalone_request_timeout),
        case!("testClusterRequestTimeout", test_cluster_request_timeout),
        case!("testStandaloneReconnectStrategy", test_standalone_reconnect_strategy),
        case!("testClusterReconnectStrategy", test_cluster_reconnect_strategy),
        case!("testReconnectStrategyWithoutJitter", test_reconnect_strategy_without_jitter),
        case!("testStandaloneClientName", test_standalone_client_name),
        case!("testClusterClientName", test_cluster_client_name),
        case!("testStandaloneClientAz", test_standalone_client_az),
        case!("testClusterClientAz", test_cluster_client_az),
        case!("testStandaloneAdvancedConfig", test_standalone_advanced_config),
        case!("testClusterAdvancedConfig", test_cluster_advanced_config),
        case!("testStandaloneInsecureTls", test_standalone_insecure_tls),
        case!("testClusterInsecureTls", test_cluster_insecure_tls),
        case!("testStandaloneLazyConnect", test_standalone_lazy_connect),
        case!("testClusterLazyConnect", test_cluster_lazy_connect),
        case!("testStandaloneDatabaseId", test_standalone_database_id),
        case!("testClusterPeriodicChecksDisabled", test_cluster_periodic_checks_disabled),
        case!("testClusterPeriodicChecksDefault", test_cluster_periodic_checks_default),
        case!("testOptionValidation", test_option_validation),
    ]
}

fn localhost() -> ClientOptions {
    ClientOptions::single("localhost", 8080)
}

fn with(f: impl FnOnce(&mut ClientOptions)) -> ClientOptions {
    let mut options = localhost();
    f(&mut options);
    options
}

fn both(options: &ClientOptions) -> Result<[ConnectionRequest; 2]> {
    Ok([
        ConnectionRequest::standalone(options)?,
        ConnectionRequest::cluster(options)?,
    ])
}

async fn test_standalone_basic_constructor(ctx: &TestContext) -> Result<()> {
    let request = ConnectionRequest::standalone(&localhost())?;
    ctx.assert_false(request.cluster_mode_enabled);
    ctx.assert_eq(&vec![Endpoint::new("localhost", 8080)], &request.addresses);
    Ok(())
}

async fn test_standalone_multiple_addresses(ctx: &TestContext) -> Result<()> {
    let addresses = vec![Endpoint::new("localhost", 8080), Endpoint::new("localhost", 8081)];
    let request = ConnectionRequest::standalone(&ClientOptions::new(addresses.clone()))?;
    ctx.assert_eq(&addresses, &request.addresses);
    Ok(())
}

async fn test_cluster_basic_constructor(ctx: &TestContext) -> Result<()> {
    let request = ConnectionRequest::cluster(&localhost())?;
    ctx.assert_true(request.cluster_mode_enabled);
    ctx.assert_eq(&vec![Endpoint::new("localhost", 8080)], &request.addresses);
    Ok(())
}

async fn test_cluster_multiple_addresses(ctx: &TestContext) -> Result<()> {
    let addresses = vec![Endpoint::new("localhost", 8080), Endpoint::new("localhost", 8081)];
    let request = ConnectionRequest::cluster(&ClientOptions::new(addresses.clone()))?;
    ctx.assert_eq(&addresses, &request.addresses);
    Ok(())
}

async fn test_standalone_use_tls_on(ctx: &TestContext) -> Result<()> {
    let request = ConnectionRequest::standalone(&with(|o| o.use_tls = true))?;
    ctx.assert_eq(&TlsMode::SecureTls, &request.tls_mode);
    Ok(())
}

async fn test_cluster_use_tls_on(ctx: &TestContext) -> Result<()> {
    let request = ConnectionRequest::cluster(&with(|o| o.use_tls = true))?;
    ctx.assert_eq(&TlsMode::SecureTls, &request.tls_mode);
    Ok(())
}

async fn test_standalone_use_tls_off(ctx: &TestContext) -> Result<()> {
    let request = ConnectionRequest::standalone(&with(|o| o.use_tls = false))?;
    ctx.assert_eq(&TlsMode::NoTls, &request.tls_mode);
    Ok(())
}

async fn test_cluster_use_tls_off(ctx: &TestContext) -> Result<()> {
    let request = ConnectionRequest::cluster(&with(|o| o.use_tls = false))?;
    ctx.assert_eq(&TlsMode::NoTls, &request.tls_mode);
    Ok(())
}

fn check_credentials(ctx: &TestContext, request: &ConnectionRequest) {
    match &request.authentication {
        Some(auth) => {
            ctx.assert_eq(&Some("foobar".to_string()), &auth.username);
            ctx.assert_eq("anything", auth.password.as_str());
        }
        None => {
            ctx.fail("credentials were dropped");
        }
    }
}

async fn test_standalone_credentials(ctx: &TestContext) -> Result<()> {
    let options = with(|o| o.credential = Credential::from_parts(Some("foobar"), Some("anything")));
    check_credentials(ctx, &ConnectionRequest::standalone(&options)?);

    let password_only = with(|o| o.credential = Credential::Password("anything".into()));
    let request = ConnectionRequest::standalone(&password_only)?;
    ctx.assert_eq(&None, &request.authentication.as_ref().and_then(|a| a.username.clone()));
    Ok(())
}

async fn test_cluster_credentials(ctx: &TestContext) -> Result<()> {
    let options = with(|o| o.credential = Credential::from_parts(Some("foobar"), Some("anything")));
    check_credentials(ctx, &ConnectionRequest::cluster(&options)?);

    let request = ConnectionRequest::cluster(&localhost())?;
    ctx.assert_true(request.authentication.is_none());
    Ok(())
}

async fn test_standalone_read_from(ctx: &TestContext) -> Result<()> {
    for read_from in [ReadFrom::Primary, ReadFrom::PreferReplica] {
        let request = ConnectionRequest::standalone(&with(|o| o.read_from = read_from))?;
        ctx.assert_eq(&read_from, &request.read_from);
    }
    Ok(())
}

async fn test_cluster_read_from(ctx: &TestContext) -> Result<()> {
    for read_from in [
        ReadFrom::Primary,
        ReadFrom::PreferReplica,
        ReadFrom::AzAffinity,
        ReadFrom::AzAffinityReplicasAndPrimary,
    ] {
        let request = ConnectionRequest::cluster(&with(|o| o.read_from = read_from))?;
        ctx.assert_eq(&read_from, &request.read_from);
        ctx.assert_eq(&(read_from != ReadFrom::Primary), &request.read_from.reads_replicas());
    }
    Ok(())
}

async fn test_standalone_request_timeout(ctx: &TestContext) -> Result<()> {
    let request = ConnectionRequest::standalone(&with(|o| o.request_timeout_ms = Some(999)))?;
    ctx.assert_eq(&Some(Duration::from_millis(999)), &request.request_timeout);
    Ok(())
}

async fn test_cluster_request_timeout(ctx: &TestContext) -> Result<()> {
    let request = ConnectionRequest::cluster(&with(|o| o.request_timeout_ms = Some(999)))?;
    ctx.assert_eq(&Some(Duration::from_millis(999)), &request.request_timeout);
    Ok(())
}

fn check_strategy(ctx: &TestContext, request: &ConnectionRequest) {
    let Some(strategy) = request.connection_retry_strategy else {
        ctx.fail("reconnect strategy was dropped");
        return;
    };
    ctx.assert_eq(&2, &strategy.num_of_retries);
    ctx.assert_eq(&3, &strategy.factor);
    ctx.assert_eq(&7, &strategy.exponent_base);
    ctx.assert_eq(&Some(15), &strategy.jitter_percent);
}

async fn test_standalone_reconnect_strategy(ctx: &TestContext) -> Result<()> {
    let options = with(|o| o.reconnect_strategy = Some(ReconnectStrategy::new(2, 3, 7).with_jitter(15)));
    check_strategy(ctx, &ConnectionRequest::standalone(&options)?);
    Ok(())
}

async fn test_cluster_reconnect_strategy(ctx: &TestContext) -> Result<()> {
    let options = with(|o| o.reconnect_strategy = Some(ReconnectStrategy::new(2, 3, 7).with_jitter(15)));
    check_strategy(ctx, &ConnectionRequest::cluster(&options)?);
    Ok(())
}

async fn test_reconnect_strategy_without_jitter(ctx: &TestContext) -> Result<()> {
    let options = with(|o| o.reconnect_strategy = Some(ReconnectStrategy::new(5, 100, 2)));
    for request in both(&options)? {
        let strategy = request.connection_retry_strategy;
        ctx.assert_eq(&None, &strategy.and_then(|s| s.jitter_percent));
        ctx.assert_eq(
            &Some(Duration::from_millis(400)),
            &strategy.map(|s| s.backoff(2)),
        );
    }
    Ok(())
}

async fn test_standalone_client_name(ctx: &TestContext) -> Result<()> {
    let request = ConnectionRequest::standalone(&with(|o| o.client_name = Some("foobar".into())))?;
    ctx.assert_eq(&Some("foobar".to_string()), &request.client_name);
    Ok(())
}

async fn test_cluster_client_name(ctx: &TestContext) -> Result<()> {
    let request = ConnectionRequest::cluster(&with(|o| o.client_name = Some("foobar".into())))?;
    ctx.assert_eq(&Some("foobar".to_string()), &request.client_name);
    Ok(())
}

async fn test_standalone_client_az(ctx: &TestContext) -> Result<()> {
    let request = ConnectionRequest::standalone(&with(|o| o.client_az = Some("us-east-1a".into())))?;
    ctx.assert_eq(&Some("us-east-1a".to_string()), &request.client_az);
    Ok(())
}

async fn test_cluster_client_az(ctx: &TestContext) -> Result<()> {
    let request = ConnectionRequest::cluster(&with(|o| o.client_az = Some("us-east-1a".into())))?;
    ctx.assert_eq(&Some("us-east-1a".to_string()), &request.client_az);
    Ok(())
}

async fn test_standalone_advanced_config(ctx: &TestContext) -> Result<()> {
    let request = ConnectionRequest::standalone(&with(|o| o.connection_timeout_ms = Some(999)))?;
    ctx.assert_eq(&Some(Duration::from_millis(999)), &request.connection_timeout);
    Ok(())
}

async fn test_cluster_advanced_config(ctx: &TestContext) -> Result<()> {
    let request = ConnectionRequest::cluster(&with(|o| o.connection_timeout_ms = Some(999)))?;
    ctx.assert_eq(&Some(Duration::from_millis(999)), &request.connection_timeout);
    Ok(())
}

fn insecure() -> ClientOptions {
    with(|o| {
        o.use_tls = true;
        o.use_insecure_tls = true;
    })
}

async fn test_standalone_insecure_tls(ctx: &TestContext) -> Result<()> {
    let request = ConnectionRequest::standalone(&insecure())?;
    ctx.assert_eq(&TlsMode::InsecureTls, &request.tls_mode);
    Ok(())
}

async fn test_cluster_insecure_tls(ctx: &TestContext) -> Result<()> {
    let request = ConnectionRequest::cluster(&insecure())?;
    ctx.assert_eq(&TlsMode::InsecureTls, &request.tls_mode);
    Ok(())
}

async fn test_standalone_lazy_connect(ctx: &TestContext) -> Result<()> {
    ctx.assert_false(ConnectionRequest::standalone(&localhost())?.lazy_connect);
    ctx.assert_true(ConnectionRequest::standalone(&with(|o| o.lazy_connect = true))?.lazy_connect);
    Ok(())
}

async fn test_cluster_lazy_connect(ctx: &TestContext) -> Result<()> {
    ctx.assert_false(ConnectionRequest::cluster(&localhost())?.lazy_connect);
    ctx.assert_true(ConnectionRequest::cluster(&with(|o| o.lazy_connect = true))?.lazy_connect);
    Ok(())
}

async fn test_standalone_database_id(ctx: &TestContext) -> Result<()> {
    ctx.assert_eq(&0, &ConnectionRequest::standalone(&localhost())?.database_id);
    let request = ConnectionRequest::standalone(&with(|o| o.database_id = Some(7)))?;
    ctx.assert_eq(&7, &request.database_id);
    Ok(())
}

async fn test_cluster_periodic_checks_disabled(ctx: &TestContext) -> Result<()> {
    let options = with(|o| o.periodic_checks = Some(PeriodicChecks::Disabled));
    let request = ConnectionRequest::cluster(&options)?;
    ctx.assert_eq(&Some(PeriodicChecks::Disabled), &request.periodic_checks);
    Ok(())
}

async fn test_cluster_periodic_checks_default(ctx: &TestContext) -> Result<()> {
    let explicit = with(|o| o.periodic_checks = Some(PeriodicChecks::EnabledDefaultConfigs));
    for options in [explicit, localhost()] {
        let request = ConnectionRequest::cluster(&options)?;
        ctx.assert_eq(&Some(PeriodicChecks::EnabledDefaultConfigs), &request.periodic_checks);
    }
    ctx.assert_eq(&None, &ConnectionRequest::standalone(&localhost())?.periodic_checks);
    Ok(())
}

#[track_caller]
fn expect_config_error(ctx: &TestContext, result: Result<ConnectionRequest>) {
    if let Some(e) = ctx.assert_err(result) {
        ctx.assert_true(matches!(e, HarnessError::Config(_)));
    }
}

async fn test_option_validation(ctx: &TestContext) -> Result<()> {
    let empty = ClientOptions::new(Vec::new());
    expect_config_error(ctx, ConnectionRequest::standalone(&empty));
    expect_config_error(ctx, ConnectionRequest::cluster(&empty));

    let insecure_only = with(|o| o.use_insecure_tls = true);
    expect_config_error(ctx, ConnectionRequest::standalone(&insecure_only));

    expect_config_error(ctx, ConnectionRequest::cluster(&with(|o| o.database_id = Some(1))));
    ctx.assert_ok(ConnectionRequest::cluster(&with(|o| o.database_id = Some(0))));

    let periodic = with(|o| o.periodic_checks = Some(PeriodicChecks::Disabled));
    expect_config_error(ctx, ConnectionRequest::standalone(&periodic));

    let jitter = with(|o| o.reconnect_strategy = Some(ReconnectStrategy::new(1, 1, 2).with_jitter(101)));
    expect_config_error(ctx, ConnectionRequest::standalone(&jitter));
    Ok(())
}
