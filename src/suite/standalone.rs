//! `ValkeyGlideTest`: data-command scenarios against a single node.
//!
//! The cases are `pub(crate)` because the cluster suite runs most of them
//! unchanged through a cluster client.

use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::case;
use crate::client::{ClientHandle, Route};
use crate::context::TestContext;
use crate::error::Result;
use crate::fixtures::{KeyType, CITIES};
use crate::suite::TestCase;

pub fn cases() -> Vec<TestCase> {
    vec![
        case!("testMinimumVersion", test_minimum_version),
        case!("testPing", test_ping),
        case!("testEcho", test_echo),
        case!("testSet", test_set),
        case!("testGetDel", test_get_del),
        case!("testIncr", test_incr),
        case!("testDecr", test_decr),
        case!("testExists", test_exists),
        case!("testDelete", test_delete),
        case!("testUnlink", test_unlink),
        case!("testType", test_type),
        case!("testStr", test_str),
        case!("testlPop", test_lpop),
        case!("testrPop", test_rpop),
        case!("testLLen", test_llen),
        case!("testLindex", test_lindex),
        case!("testLRange", test_lrange),
        case!("testSAdd", test_sadd),
        case!("testSCard", test_scard),
        case!("testSRem", test_srem),
        case!("testSIsMember", test_sismember),
        case!("testSMembers", test_smembers),
        case!("testHashes", test_hashes),
        case!("testZAddFirstArg", test_zadd_first_arg),
        case!("testDifferentTypeString", test_different_type_string),
        case!("testDifferentTypeList", test_different_type_list),
        case!("testDifferentTypeSet", test_different_type_set),
        case!("testDifferentTypeSortedSet", test_different_type_sorted_set),
        case!("testDifferentTypeHash", test_different_type_hash),
        case!("testInfo", test_info),
        case!("testMultiExec", test_multi_exec),
        case!("testPipeline", test_pipeline),
        case!("testRawCommand", test_raw_command),
        case!("testXAdd", test_xadd),
        case!("testXRange", test_xrange),
        case!("testXLen", test_xlen),
        case!("testGeoAdd", test_geo_add),
        case!("testGeoDist", test_geo_dist),
        case!("testGeoPos", test_geo_pos),
        case!("testKeyFixtures", test_key_fixtures),
    ]
}

/// Fields every INFO reply is expected to carry.
pub(crate) const INFO_FIELDS: [&str; 10] = [
    "redis_version",
    "arch_bits",
    "uptime_in_seconds",
    "uptime_in_days",
    "connected_clients",
    "connected_slaves",
    "used_memory",
    "total_connections_received",
    "total_commands_processed",
    "role",
];

#[track_caller]
fn expect_wrong_type<T: Debug>(ctx: &TestContext, result: Result<T>) -> bool {
    match ctx.assert_err(result) {
        Some(e) => ctx.assert_true(e.is_wrong_type()),
        None => false,
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ── Connection ───────────────────────────────────────────────────

pub(crate) async fn test_minimum_version(ctx: &TestContext) -> Result<()> {
    ctx.assert_true(ctx.min_version_check("2.4.0"));
    Ok(())
}

pub(crate) async fn test_ping(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    ctx.assert_true(c.ping().await?);
    let beep = c.execute_routed(&["PING", "BEEP"], Route::Default).await?;
    ctx.assert_eq(&Some("BEEP"), &beep.as_str());
    Ok(())
}

pub(crate) async fn test_echo(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    for message in ["hello", "", " 0123 "] {
        ctx.assert_eq(&Some(message.to_string()), &c.echo(message).await?);
    }
    Ok(())
}

// ── Strings & keys ───────────────────────────────────────────────

async fn test_set(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    ctx.assert_true(c.set("key", "nil").await?);
    ctx.assert_eq(&Some("nil".to_string()), &c.get("key").await?);

    ctx.assert_true(c.set("key", "val").await?);
    ctx.assert_eq(&Some("val".to_string()), &c.get("key").await?);

    let long = "x".repeat(1 << 16);
    ctx.assert_true(c.set("key", &long).await?);
    ctx.assert_eq(&Some(long), &c.get("key").await?);

    c.del(&["keyNotExist"]).await?;
    ctx.assert_eq(&None, &c.get("keyNotExist").await?);
    Ok(())
}

async fn test_get_del(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    c.del(&["key"]).await?;
    ctx.assert_true(c.set("key", "iexist").await?);
    ctx.assert_eq(&Some("iexist".to_string()), &c.getdel("key").await?);
    ctx.assert_eq(&0, &c.exists(&["key"]).await?);
    ctx.assert_eq(&None, &c.getdel("key").await?);
    Ok(())
}

async fn test_incr(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    c.set("key", "0").await?;
    ctx.assert_eq(&1, &c.incr("key").await?);
    ctx.assert_eq(&2, &c.incr("key").await?);
    ctx.assert_eq(&5, &c.incr_by("key", 3).await?);
    ctx.assert_eq(&4, &c.incr_by("key", -1).await?);
    ctx.assert_eq(&Some("4".to_string()), &c.get("key").await?);

    c.del(&["key"]).await?;
    c.set("key", "abc").await?;
    ctx.assert_err(c.incr("key").await);
    ctx.assert_eq(&Some("abc".to_string()), &c.get("key").await?);
    Ok(())
}

async fn test_decr(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    c.set("key", "5").await?;
    ctx.assert_eq(&4, &c.decr("key").await?);
    ctx.assert_eq(&3, &c.decr("key").await?);
    ctx.assert_eq(&1, &c.decr_by("key", 2).await?);
    ctx.assert_eq(&0, &c.decr_by("key", 1).await?);
    ctx.assert_eq(&10, &c.decr_by("key", -10).await?);
    ctx.assert_eq(&Some("10".to_string()), &c.get("key").await?);
    Ok(())
}

async fn test_exists(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    c.del(&["key"]).await?;
    ctx.assert_eq(&0, &c.exists(&["key"]).await?);
    c.set("key", "val").await?;
    ctx.assert_eq(&1, &c.exists(&["key"]).await?);

    let keys = ["{exists}key:0", "{exists}key:1", "{exists}key:2"];
    c.del(&keys).await?;
    for (i, key) in keys.iter().enumerate().take(2) {
        c.set(key, &i.to_string()).await?;
    }
    ctx.assert_eq(&2, &c.exists(&keys).await?);
    Ok(())
}

async fn remove(c: &ClientHandle, keys: &[&str], unlink: bool) -> Result<i64> {
    if unlink {
        c.unlink(keys).await
    } else {
        c.del(keys).await
    }
}

async fn del_unlink(ctx: &TestContext, unlink: bool) -> Result<()> {
    let c = ctx.client()?;
    c.set("key", "val").await?;
    ctx.assert_eq(&Some("val".to_string()), &c.get("key").await?);
    ctx.assert_eq(&1, &remove(c, &["key"], unlink).await?);
    ctx.assert_eq(&None, &c.get("key").await?);

    let keys = ["{key}1", "{key}2", "{key}3"];
    for key in keys {
        c.set(key, "val").await?;
    }
    ctx.assert_eq(&3, &remove(c, &keys, unlink).await?);
    ctx.assert_eq(&0, &remove(c, &["{key}1"], unlink).await?);
    Ok(())
}

async fn test_delete(ctx: &TestContext) -> Result<()> {
    del_unlink(ctx, false).await
}

async fn test_unlink(ctx: &TestContext) -> Result<()> {
    if !ctx.min_version_check("4.0.0") {
        return ctx.skip("UNLINK needs 4.0.0");
    }
    del_unlink(ctx, true).await
}

async fn test_type(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    c.del(&["key", "keyList", "keySet", "keyZSet", "keyHash", "keyStream", "keyNotExists"])
        .await?;

    c.set("key", "val").await?;
    ctx.assert_eq("string", c.key_type("key").await?.as_str());

    c.lpush("keyList", &["val0", "val1"]).await?;
    ctx.assert_eq("list", c.key_type("keyList").await?.as_str());

    c.sadd("keySet", &["val0", "val1"]).await?;
    ctx.assert_eq("set", c.key_type("keySet").await?.as_str());

    c.zadd("keyZSet", &[(0.0, "val0"), (1.0, "val1")]).await?;
    ctx.assert_eq("zset", c.key_type("keyZSet").await?.as_str());

    c.hset("keyHash", "key0", "val0").await?;
    ctx.assert_eq("hash", c.key_type("keyHash").await?.as_str());

    if ctx.min_version_check("5.0") {
        c.xadd("keyStream", "*", &[("foo", "bar")]).await?;
        ctx.assert_eq("stream", c.key_type("keyStream").await?.as_str());
    }

    ctx.assert_eq("none", c.key_type("keyNotExists").await?.as_str());
    Ok(())
}

async fn test_str(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    c.set("key", "val1").await?;
    ctx.assert_eq(&8, &c.append("key", "val2").await?);
    ctx.assert_eq(&Some("val1val2".to_string()), &c.get("key").await?);

    c.del(&["keyNotExist"]).await?;
    ctx.assert_eq(&5, &c.append("keyNotExist", "value").await?);
    ctx.assert_eq(&Some("value".to_string()), &c.get("keyNotExist").await?);

    for (value, len) in [("This is a string", 16), ("10", 2), ("", 0), ("000", 3)] {
        c.set("key", value).await?;
        ctx.assert_eq(&len, &c.strlen("key").await?);
    }
    Ok(())
}

// ── Lists ────────────────────────────────────────────────────────

async fn test_lpop(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    c.del(&["list"]).await?;
    c.lpush("list", &["val"]).await?;
    c.lpush("list", &["val2"]).await?;
    c.rpush("list", &["val3"]).await?;

    for expected in ["val2", "val", "val3"] {
        ctx.assert_eq(&Some(expected.to_string()), &c.lpop("list").await?);
    }
    ctx.assert_eq(&None, &c.lpop("list").await?);
    Ok(())
}

async fn test_rpop(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    c.del(&["list"]).await?;
    c.rpush("list", &["val"]).await?;
    c.rpush("list", &["val2"]).await?;
    c.lpush("list", &["val3"]).await?;

    for expected in ["val2", "val", "val3"] {
        ctx.assert_eq(&Some(expected.to_string()), &c.rpop("list").await?);
    }
    ctx.assert_eq(&None, &c.rpop("list").await?);
    Ok(())
}

async fn test_llen(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    c.del(&["list"]).await?;
    c.lpush("list", &["val"]).await?;
    ctx.assert_eq(&1, &c.llen("list").await?);
    c.lpush("list", &["val2"]).await?;
    ctx.assert_eq(&2, &c.llen("list").await?);

    ctx.assert_eq(&Some("val2".to_string()), &c.lpop("list").await?);
    ctx.assert_eq(&1, &c.llen("list").await?);
    ctx.assert_eq(&Some("val".to_string()), &c.lpop("list").await?);
    ctx.assert_eq(&0, &c.llen("list").await?);
    ctx.assert_eq(&None, &c.lpop("list").await?);

    c.del(&["list"]).await?;
    ctx.assert_eq(&0, &c.llen("list").await?);

    c.set("list", "actually not a list").await?;
    expect_wrong_type(ctx, c.llen("list").await);
    Ok(())
}

async fn test_lindex(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    c.del(&["list"]).await?;
    c.lpush("list", &["val"]).await?;
    c.lpush("list", &["val2"]).await?;
    c.lpush("list", &["val3"]).await?;

    for (index, expected) in [(0, "val3"), (1, "val2"), (2, "val"), (-1, "val"), (-2, "val2"), (-3, "val3")] {
        ctx.assert_eq(&Some(expected.to_string()), &c.lindex("list", index).await?);
    }
    ctx.assert_eq(&None, &c.lindex("list", -4).await?);

    c.rpush("list", &["val4"]).await?;
    ctx.assert_eq(&Some("val4".to_string()), &c.lindex("list", 3).await?);
    ctx.assert_eq(&Some("val4".to_string()), &c.lindex("list", -1).await?);
    Ok(())
}

async fn test_lrange(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    c.del(&["list"]).await?;
    for v in ["val", "val2", "val3"] {
        c.lpush("list", &[v]).await?;
    }

    let ranges: [(i64, i64, &[&str]); 7] = [
        (0, 0, &["val3"]),
        (0, 1, &["val3", "val2"]),
        (0, 2, &["val3", "val2", "val"]),
        (0, 3, &["val3", "val2", "val"]),
        (0, -1, &["val3", "val2", "val"]),
        (0, -2, &["val3", "val2"]),
        (-2, -1, &["val2", "val"]),
    ];
    for (start, stop, expected) in ranges {
        ctx.assert_eq(&owned(expected), &c.lrange("list", start, stop).await?);
    }

    c.del(&["list"]).await?;
    ctx.assert_eq(&Vec::<String>::new(), &c.lrange("list", 0, -1).await?);
    Ok(())
}

// ── Sets ─────────────────────────────────────────────────────────

async fn test_sadd(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    c.del(&["set"]).await?;
    ctx.assert_eq(&1, &c.sadd("set", &["val"]).await?);
    ctx.assert_eq(&0, &c.sadd("set", &["val"]).await?);
    ctx.assert_true(c.sismember("set", "val").await?);
    ctx.assert_false(c.sismember("set", "val2").await?);

    ctx.assert_eq(&1, &c.sadd("set", &["val2"]).await?);
    ctx.assert_true(c.sismember("set", "val2").await?);

    ctx.assert_eq(&2, &c.sadd("set", &["val3", "val4", "val"]).await?);
    ctx.assert_eq(&4, &c.scard("set").await?);
    Ok(())
}

async fn test_scard(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    c.del(&["set"]).await?;
    ctx.assert_eq(&1, &c.sadd("set", &["val"]).await?);
    ctx.assert_eq(&1, &c.scard("set").await?);
    ctx.assert_eq(&1, &c.sadd("set", &["val2"]).await?);
    ctx.assert_eq(&2, &c.scard("set").await?);
    Ok(())
}

async fn test_srem(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    c.del(&["set"]).await?;
    c.sadd("set", &["val"]).await?;
    c.sadd("set", &["val2"]).await?;
    c.srem("set", &["val"]).await?;
    ctx.assert_eq(&1, &c.scard("set").await?);
    c.srem("set", &["val2"]).await?;
    ctx.assert_eq(&0, &c.scard("set").await?);
    Ok(())
}

async fn test_sismember(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    c.del(&["set"]).await?;
    c.sadd("set", &["val"]).await?;
    ctx.assert_true(c.sismember("set", "val").await?);
    ctx.assert_false(c.sismember("set", "val2").await?);
    Ok(())
}

async fn test_smembers(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    c.del(&["set"]).await?;
    let data = ["val", "val2", "val3"];
    for member in data {
        c.sadd("set", &[member]).await?;
    }
    ctx.assert_unordered_eq(&owned(&data), &c.smembers("set").await?);
    Ok(())
}

// ── Hashes & sorted sets ─────────────────────────────────────────

async fn test_hashes(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    c.del(&["h", "key"]).await?;

    ctx.assert_eq(&0, &c.hlen("h").await?);
    ctx.assert_eq(&1, &c.hset("h", "a", "a-value").await?);
    ctx.assert_eq(&1, &c.hlen("h").await?);
    ctx.assert_eq(&1, &c.hset("h", "b", "b-value").await?);
    ctx.assert_eq(&2, &c.hlen("h").await?);

    ctx.assert_eq(&Some("a-value".to_string()), &c.hget("h", "a").await?);
    ctx.assert_eq(&Some("b-value".to_string()), &c.hget("h", "b").await?);

    ctx.assert_eq(&0, &c.hset("h", "a", "another-value").await?);
    ctx.assert_eq(&Some("another-value".to_string()), &c.hget("h", "a").await?);
    ctx.assert_eq(&None, &c.hget("h", "c").await?);

    ctx.assert_true(c.hmset("h", &[("c", "c-value"), ("d", "d-value")]).await?);
    let all = c.hgetall("h").await?;
    ctx.assert_eq(&4, &all.len());
    ctx.assert_eq(&Some(&"d-value".to_string()), &all.get("d"));

    ctx.assert_eq(&2, &c.hdel("h", &["c", "d", "missing"]).await?);
    ctx.assert_eq(&2, &c.hlen("h").await?);
    ctx.assert_eq(&0, &c.hdel("h", &["c"]).await?);
    Ok(())
}

async fn test_zadd_first_arg(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    c.del(&["100"]).await?;
    ctx.assert_eq(&1, &c.zadd("100", &[(0.0, "val0")]).await?);
    ctx.assert_eq(&1, &c.zadd("100", &[(1.0, "val1")]).await?);

    let members: Vec<String> = c
        .zrange_withscores("100", 0, -1)
        .await?
        .into_iter()
        .map(|(member, _)| member)
        .collect();
    ctx.assert_eq(&owned(&["val0", "val1"]), &members);
    ctx.assert_eq(&2, &c.zcard("100").await?);
    ctx.assert_eq(&Some(1.0), &c.zscore("100", "val1").await?);
    ctx.assert_eq(&None, &c.zscore("100", "val2").await?);
    Ok(())
}

// ── Type mismatches ──────────────────────────────────────────────

async fn wrong_type_strings(ctx: &TestContext, key: &str) -> Result<()> {
    let c = ctx.client()?;
    expect_wrong_type(ctx, c.get(key).await);
    expect_wrong_type(ctx, c.append(key, "append").await);
    expect_wrong_type(ctx, c.incr(key).await);
    expect_wrong_type(ctx, c.incr_by(key, 1).await);
    expect_wrong_type(ctx, c.decr(key).await);
    expect_wrong_type(ctx, c.decr_by(key, 1).await);
    Ok(())
}

async fn wrong_type_lists(ctx: &TestContext, key: &str) -> Result<()> {
    let c = ctx.client()?;
    expect_wrong_type(ctx, c.rpush(key, &["lvalue"]).await);
    expect_wrong_type(ctx, c.lpush(key, &["lvalue"]).await);
    expect_wrong_type(ctx, c.llen(key).await);
    expect_wrong_type(ctx, c.lpop(key).await);
    expect_wrong_type(ctx, c.rpop(key).await);
    expect_wrong_type(ctx, c.lrange(key, 0, -1).await);
    expect_wrong_type(ctx, c.lindex(key, 0).await);
    Ok(())
}

async fn wrong_type_sets(ctx: &TestContext, key: &str) -> Result<()> {
    let c = ctx.client()?;
    expect_wrong_type(ctx, c.sadd(key, &["sValue1"]).await);
    expect_wrong_type(ctx, c.srem(key, &["sValue1"]).await);
    expect_wrong_type(ctx, c.scard(key).await);
    expect_wrong_type(ctx, c.sismember(key, "sValue1").await);
    expect_wrong_type(ctx, c.smembers(key).await);
    Ok(())
}

async fn wrong_type_sorted_sets(ctx: &TestContext, key: &str) -> Result<()> {
    let c = ctx.client()?;
    expect_wrong_type(ctx, c.zadd(key, &[(1.0, "zValue1")]).await);
    expect_wrong_type(ctx, c.zcard(key).await);
    expect_wrong_type(ctx, c.zscore(key, "zValue1").await);
    expect_wrong_type(ctx, c.zrange_withscores(key, 0, -1).await);
    Ok(())
}

async fn wrong_type_hashes(ctx: &TestContext, key: &str) -> Result<()> {
    let c = ctx.client()?;
    expect_wrong_type(ctx, c.hset(key, "key1", "value1").await);
    expect_wrong_type(ctx, c.hget(key, "key1").await);
    expect_wrong_type(ctx, c.hlen(key).await);
    expect_wrong_type(ctx, c.hdel(key, &["key1"]).await);
    expect_wrong_type(ctx, c.hgetall(key).await);
    Ok(())
}

async fn test_different_type_string(ctx: &TestContext) -> Result<()> {
    let key = "{hash}string";
    let c = ctx.client()?;
    c.del(&[key]).await?;
    ctx.assert_true(c.set(key, "value").await?);

    wrong_type_lists(ctx, key).await?;
    wrong_type_sets(ctx, key).await?;
    wrong_type_sorted_sets(ctx, key).await?;
    wrong_type_hashes(ctx, key).await
}

async fn test_different_type_list(ctx: &TestContext) -> Result<()> {
    let key = "{hash}list";
    let c = ctx.client()?;
    c.del(&[key]).await?;
    ctx.assert_eq(&1, &c.lpush(key, &["value"]).await?);

    wrong_type_strings(ctx, key).await?;
    wrong_type_sets(ctx, key).await?;
    wrong_type_sorted_sets(ctx, key).await?;
    wrong_type_hashes(ctx, key).await
}

async fn test_different_type_set(ctx: &TestContext) -> Result<()> {
    let key = "{hash}set";
    let c = ctx.client()?;
    c.del(&[key]).await?;
    ctx.assert_eq(&1, &c.sadd(key, &["value"]).await?);

    wrong_type_strings(ctx, key).await?;
    wrong_type_lists(ctx, key).await?;
    wrong_type_sorted_sets(ctx, key).await?;
    wrong_type_hashes(ctx, key).await
}

async fn test_different_type_sorted_set(ctx: &TestContext) -> Result<()> {
    let key = "{hash}sortedset";
    let c = ctx.client()?;
    c.del(&[key]).await?;
    ctx.assert_eq(&1, &c.zadd(key, &[(0.0, "value")]).await?);

    wrong_type_strings(ctx, key).await?;
    wrong_type_lists(ctx, key).await?;
    wrong_type_sets(ctx, key).await?;
    wrong_type_hashes(ctx, key).await
}

async fn test_different_type_hash(ctx: &TestContext) -> Result<()> {
    let key = "{hash}hash";
    let c = ctx.client()?;
    c.del(&[key]).await?;
    ctx.assert_eq(&1, &c.hset(key, "key", "value").await?);

    wrong_type_strings(ctx, key).await?;
    wrong_type_lists(ctx, key).await?;
    wrong_type_sets(ctx, key).await?;
    wrong_type_sorted_sets(ctx, key).await
}

// ── Server ───────────────────────────────────────────────────────

pub(crate) async fn test_info(ctx: &TestContext) -> Result<()> {
    let Some(info) = ctx.client()?.info(Route::Default).await? else {
        ctx.fail("INFO returned nothing");
        return Ok(());
    };
    for field in INFO_FIELDS {
        if !info.contains(field) {
            ctx.fail(format!("INFO is missing '{field}'"));
        }
    }
    Ok(())
}

async fn test_multi_exec(ctx: &TestContext) -> Result<()> {
    if !ctx.have_multi() {
        return ctx.skip("MULTI/EXEC not supported");
    }
    Ok(())
}

async fn test_pipeline(ctx: &TestContext) -> Result<()> {
    if !ctx.have_pipeline() {
        return ctx.skip("pipelining not supported");
    }
    Ok(())
}

pub(crate) async fn test_raw_command(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    let key = format!("raw:{}", std::process::id());
    c.set(&key, "some-value").await?;
    let result = c.raw_command(&["get", &key]).await?;
    ctx.assert_eq(&Some("some-value"), &result.as_str());

    c.del(&["mylist"]).await?;
    c.rpush("mylist", &["A", "B", "C", "D"]).await?;
    ctx.assert_eq(&owned(&["A", "B", "C", "D"]), &c.lrange("mylist", 0, -1).await?);
    Ok(())
}

// ── Streams ──────────────────────────────────────────────────────

async fn test_xadd(ctx: &TestContext) -> Result<()> {
    if !ctx.min_version_check("5.0") {
        return ctx.skip("streams need 5.0");
    }
    let c = ctx.client()?;
    c.del(&["stream"]).await?;

    let mut last = String::new();
    for i in 0..5 {
        let value = format!("value:{i}");
        let id = c.xadd("stream", "*", &[("field", &value)]).await?;
        ctx.assert_true(id.contains('-'));
        ctx.assert_ne(&last, &id);
        last = id;
    }
    ctx.assert_eq(&5, &c.xlen("stream").await?);

    let explicit = c.xadd("stream", "99999999999999-0", &[("field", "last")]).await?;
    ctx.assert_eq("99999999999999-0", explicit.as_str());
    ctx.assert_err(c.xadd("stream", "1-0", &[("field", "too old")]).await);
    Ok(())
}

async fn test_xrange(ctx: &TestContext) -> Result<()> {
    if !ctx.min_version_check("5.0") {
        return ctx.skip("streams need 5.0");
    }
    let c = ctx.client()?;
    c.del(&["stream"]).await?;

    let mut ids = Vec::new();
    for i in 0..3 {
        let value = format!("value:{i}");
        ids.push(c.xadd("stream", "*", &[("field", &value)]).await?);
    }

    let entries = c.xrange("stream", "-", "+").await?;
    ctx.assert_eq(&ids, &entries.iter().map(|e| e.id.clone()).collect::<Vec<_>>());
    ctx.assert_eq(
        &vec![("field".to_string(), "value:1".to_string())],
        &entries.get(1).map(|e| e.fields.clone()).unwrap_or_default(),
    );

    let tail = c.xrange("stream", &ids[1], "+").await?;
    ctx.assert_eq(&2, &tail.len());
    Ok(())
}

async fn test_xlen(ctx: &TestContext) -> Result<()> {
    if !ctx.min_version_check("5.0") {
        return ctx.skip("streams need 5.0");
    }
    let c = ctx.client()?;
    c.del(&["{stream}"]).await?;
    for i in 0..5 {
        c.xadd("{stream}", "*", &[("foo", "bar")]).await?;
        ctx.assert_eq(&(i + 1), &c.xlen("{stream}").await?);
    }
    ctx.assert_eq(&0, &c.xlen("{stream}-missing").await?);
    Ok(())
}

// ── Geo ──────────────────────────────────────────────────────────

async fn add_cities(ctx: &TestContext, key: &str) -> Result<()> {
    let c = ctx.client()?;
    c.del(&[key]).await?;
    let points: Vec<(f64, f64, &str)> = CITIES.iter().map(|c| (c.longitude, c.latitude, c.name)).collect();
    c.geoadd(key, &points).await?;
    Ok(())
}

async fn test_geo_add(ctx: &TestContext) -> Result<()> {
    if !ctx.min_version_check("3.2") {
        return ctx.skip("geo commands need 3.2");
    }
    let c = ctx.client()?;
    c.del(&["geokey"]).await?;
    for city in CITIES {
        ctx.assert_eq(&1, &c.geoadd("geokey", &[(city.longitude, city.latitude, city.name)]).await?);
    }
    let all: Vec<(f64, f64, &str)> = CITIES.iter().map(|c| (c.longitude, c.latitude, c.name)).collect();
    ctx.assert_eq(&0, &c.geoadd("geokey", &all).await?);
    Ok(())
}

async fn test_geo_dist(ctx: &TestContext) -> Result<()> {
    if !ctx.min_version_check("3.2.0") {
        return ctx.skip("geo commands need 3.2");
    }
    add_cities(ctx, "gk").await?;
    let c = ctx.client()?;

    for unit in ["m", "km"] {
        let typed = c.geodist("gk", "Chico", "Cupertino", unit).await?;
        let raw = ctx
            .raw_command_array("gk", &["geodist", "gk", "Chico", "Cupertino", unit])
            .await?
            .as_f64();
        ctx.assert_true(typed.is_some());
        ctx.assert_eq(&typed.map(round8), &raw.map(round8));
    }
    ctx.assert_eq(&None, &c.geodist("gk", "Chico", "Atlantis", "m").await?);
    Ok(())
}

fn round8(v: f64) -> i64 {
    (v * 1e8).round() as i64
}

async fn test_geo_pos(ctx: &TestContext) -> Result<()> {
    if !ctx.min_version_check("3.2.0") {
        return ctx.skip("geo commands need 3.2");
    }
    add_cities(ctx, "gk").await?;
    let c = ctx.client()?;

    let positions = c.geopos("gk", &["Chico", "Sacramento", "Atlantis"]).await?;
    ctx.assert_eq(&3, &positions.len());
    ctx.assert_eq(&None, &positions.get(2).copied().flatten());
    for (city, pos) in CITIES.iter().zip(positions.iter().take(2)) {
        match pos {
            Some((lon, lat)) => {
                ctx.assert_true((lon - city.longitude).abs() < 1e-4);
                ctx.assert_true((lat - city.latitude).abs() < 1e-4);
            }
            None => {
                ctx.fail(format!("no position for {}", city.name));
            }
        }
    }

    let raw = ctx
        .raw_command_array("gk", &["geopos", "gk", "Cupertino"])
        .await?
        .into_array()
        .unwrap_or_default();
    ctx.assert_eq(&1, &raw.len());
    Ok(())
}

// ── Fixtures ─────────────────────────────────────────────────────

async fn test_key_fixtures(ctx: &TestContext) -> Result<()> {
    let c = ctx.client()?;
    let mut ledger = BTreeMap::new();
    for kind in KeyType::ALL {
        if kind == KeyType::Stream && !ctx.min_version_check("5.0") {
            continue;
        }
        let key = ctx.set_key_vals(1, kind, &mut ledger).await?;
        ctx.assert_eq(kind.tag(), c.key_type(&key).await?.as_str());
    }
    for (key, expected) in &ledger {
        ctx.check_key_value(key, expected.kind(), expected).await?;
    }
    Ok(())
}
