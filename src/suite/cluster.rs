//! `ValkeyGlideClusterTest`: the standalone scenarios through a cluster
//! client, with routed overrides and cluster-only checks.

use std::collections::BTreeMap;

use crate::case;
use crate::client::Route;
use crate::cluster::{SESSION_PREFIX, SESSION_SAVE_HANDLER};
use crate::context::TestContext;
use crate::error::Result;
use crate::fixtures::KeyType;
use crate::suite::{standalone, TestCase};

/// Cases a cluster cannot run; they report SKIPPED.
pub const NOT_IN_CLUSTER: [&str; 15] = [
    "testSortAsc",
    "testSortDesc",
    "testWait",
    "testSelect",
    "testReconnectSelect",
    "testDoublePipeNoOp",
    "testSwapDB",
    "testConnectException",
    "testTlsConnect",
    "testConnectDatabaseSelect",
    "testMove",
    "testConfig",
    "testFlushDB",
    "testFunction",
    "testPipelinePublish",
];

pub fn cases() -> Vec<TestCase> {
    let overrides = [
        case!("testPing", test_ping),
        case!("testEcho", test_echo),
        case!("testInfo", test_info),
        case!("testRawCommand", test_raw_command),
    ];
    let additions = [
        case!("testMasters", test_masters),
        case!("testSessionSavePath", test_session_save_path),
        case!("testSeedSource", test_seed_source),
        case!("testKeyTypeFixtures", test_key_type_fixtures),
    ];

    let mut cases = standalone::cases();
    for replacement in overrides {
        match cases.iter_mut().find(|c| c.name == replacement.name) {
            Some(slot) => *slot = replacement,
            None => cases.push(replacement),
        }
    }
    cases.extend(additions);

    let skipped = case!("testNotInCluster", not_in_cluster).run;
    for name in NOT_IN_CLUSTER {
        match cases.iter_mut().find(|c| c.name == name) {
            Some(slot) => slot.run = skipped,
            None => cases.push(TestCase::new(name, skipped)),
        }
    }
    cases
}

async fn not_in_cluster(ctx: &TestContext) -> Result<()> {
    ctx.skip("not supported in cluster mode")
}

async fn test_ping(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    for i in 0..20 {
        let route = Route::PrimaryForKey(format!("key:{i}"));
        ctx.assert_true(c.ping_routed(route.clone()).await?);
        let beep = c.execute_routed(&["PING", "BEEP"], route).await?;
        ctx.assert_eq(&Some("BEEP"), &beep.as_str());
    }
    ctx.assert_true(c.ping_routed(Route::RandomNode).await?);
    Ok(())
}

async fn test_echo(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    for (key, message) in [("echo1", "hello"), ("echo2", "world"), ("echo3", " 0123 ")] {
        let reply = c
            .execute_routed(&["ECHO", message], Route::PrimaryForKey(key.into()))
            .await?;
        ctx.assert_eq(&Some(message), &reply.as_str());
    }
    Ok(())
}

async fn test_info(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    let mut routes: Vec<Route> = (0..3).map(|i| Route::PrimaryForKey(i.to_string())).collect();
    routes.push(Route::RandomNode);

    for route in routes {
        let Some(info) = c.info(route.clone()).await? else {
            ctx.fail(format!("no INFO from {route:?}"));
            continue;
        };
        for field in standalone::INFO_FIELDS {
            if !info.contains(field) {
                ctx.fail(format!("INFO from {route:?} is missing '{field}'"));
            }
        }
    }
    Ok(())
}

async fn test_raw_command(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    ctx.raw_command_array("mykey", &["set", "mykey", "my-value"]).await?;
    ctx.assert_eq(&Some("my-value".to_string()), &c.get("mykey").await?);

    c.del(&["mylist"]).await?;
    c.rpush("mylist", &["A", "B", "C", "D"]).await?;
    let expected: Vec<String> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
    ctx.assert_eq(&expected, &c.lrange("mylist", 0, -1).await?);
    Ok(())
}

async fn test_masters(ctx: &TestContext) -> Result<()> {
    let masters = ctx.client()?.masters().await?;
    ctx.assert_false(masters.is_empty());
    for master in &masters {
        ctx.assert_true(master.rsplit_once(':').is_some_and(|(_, port)| port.parse::<u16>().is_ok()));
    }
    let mut unique = masters.clone();
    unique.sort();
    unique.dedup();
    ctx.assert_eq(&masters.len(), &unique.len());
    Ok(())
}

async fn test_session_save_path(ctx: &TestContext) -> Result<()> {
    let seeds = ctx.cluster_seeds().await?;
    let path = ctx.cluster_session_save_path().await?;
    for seed in &seeds.seeds {
        ctx.assert_string_contains(&format!("seed[]={seed}"), &path);
    }
    ctx.assert_true(path.ends_with(&format!("&{}", ctx.auth_fragment())));
    ctx.assert_eq("VALKEY_GLIDE_PHP_CLUSTER_SESSION:", SESSION_PREFIX);
    ctx.assert_eq("rediscluster", SESSION_SAVE_HANDLER);
    Ok(())
}

async fn test_seed_source(ctx: &TestContext) -> Result<()> {
    let seeds = ctx.cluster_seeds().await?;
    ctx.assert_false(seeds.seeds.is_empty());
    ctx.assert_eq(&Some(seeds.source.clone()), &ctx.run().seeds().source());
    ctx.assert_eq(
        seeds.source.to_string().as_str(),
        ctx.run().seeds().source_description().as_str(),
    );
    Ok(())
}

async fn test_key_type_fixtures(ctx: &TestContext) -> Result<()> {
    let mut ledger = BTreeMap::new();
    for kind in KeyType::ALL {
        if kind == KeyType::Stream && !ctx.min_version_check("5.0") {
            continue;
        }
        for index in 0..5 {
            ctx.set_key_vals(index, kind, &mut ledger).await?;
        }
    }
    for (key, expected) in &ledger {
        ctx.check_key_value(key, expected.kind(), expected).await?;
    }
    Ok(())
}
