//! The client under test, seen through one narrow seam.
//!
//! [`StoreClient`] is what a client implementation must provide: raw command
//! execution with an optional node route, a masters listing and close.
//! [`ClientHandle`] layers the typed commands the suites call on top of it,
//! so the live clients and the in-memory test store share every command path.

pub mod cluster;
pub mod slot;
pub mod standalone;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::Credential;
use crate::error::{HarnessError, Result};
use crate::info::InfoMap;
use crate::reply::Reply;

/// Boxed future returned by [`StoreClient`] methods.
pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Deployment shape of a connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    Standalone,
    Cluster,
}

/// Where a command should run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Route {
    /// Let the client decide (key-based in a cluster).
    #[default]
    Default,
    /// Any one node.
    RandomNode,
    /// The primary owning this key's slot.
    PrimaryForKey(String),
}

/// Minimal contract a client implementation fulfils.
pub trait StoreClient: Send + Sync {
    fn topology(&self) -> Topology;

    /// Run one command; `args[0]` is the command name.
    fn execute(&self, args: Vec<String>, route: Route) -> ClientFuture<'_, Reply>;

    /// Primary nodes as `host:port`. Cluster clients only.
    fn masters(&self) -> ClientFuture<'_, Vec<String>>;

    /// Release the underlying transport. Later calls fail with a connection error.
    fn close(&self) -> ClientFuture<'_, ()>;
}

/// One stream entry as returned by XRANGE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    pub id: String,
    pub fields: Vec<(String, String)>,
}

/// Cloneable handle the suites hold.
#[derive(Clone)]
pub struct ClientHandle {
    inner: Arc<dyn StoreClient>,
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("topology", &self.inner.topology())
            .finish()
    }
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

fn with_key(cmd: &str, key: &str, rest: &[&str]) -> Vec<String> {
    let mut args = Vec::with_capacity(rest.len() + 2);
    args.push(cmd.to_string());
    args.push(key.to_string());
    args.extend(rest.iter().map(|a| a.to_string()));
    args
}

fn expect_int(reply: Reply) -> Result<i64> {
    reply
        .as_int()
        .ok_or_else(|| HarnessError::Type(format!("expected integer, got {}", reply.type_name())))
}

fn expect_ok(reply: Reply) -> Result<bool> {
    Ok(reply.is_ok())
}

impl ClientHandle {
    pub fn new(inner: Arc<dyn StoreClient>) -> Self {
        Self { inner }
    }

    pub fn from_client(client: impl StoreClient + 'static) -> Self {
        Self::new(Arc::new(client))
    }

    pub fn topology(&self) -> Topology {
        self.inner.topology()
    }

    async fn call(&self, args: Vec<String>) -> Result<Reply> {
        self.inner.execute(args, Route::Default).await
    }

    pub async fn execute_routed(&self, args: &[&str], route: Route) -> Result<Reply> {
        self.inner.execute(owned(args), route).await
    }

    pub async fn masters(&self) -> Result<Vec<String>> {
        self.inner.masters().await
    }

    pub async fn close(&self) -> Result<()> {
        self.inner.close().await
    }

    /// `INFO` from the given route. `None` when the server returned nothing usable.
    pub async fn info(&self, route: Route) -> Result<Option<InfoMap>> {
        let reply = self.inner.execute(owned(&["INFO"]), route).await?;
        // Fan-out INFO in a cluster comes back keyed by node address.
        let text = match reply {
            Reply::Map(pairs) => pairs.into_iter().next().and_then(|(_, v)| v.into_opt_string().ok().flatten()),
            other => other.into_opt_string()?,
        };
        Ok(text.map(|t| InfoMap::parse(&t)).filter(|info| !info.is_empty()))
    }

    // ── Connection ───────────────────────────────────────────────

    pub async fn ping(&self) -> Result<bool> {
        self.ping_routed(Route::Default).await
    }

    pub async fn ping_routed(&self, route: Route) -> Result<bool> {
        let reply = self.inner.execute(owned(&["PING"]), route).await?;
        Ok(reply.as_str() == Some("PONG"))
    }

    pub async fn echo(&self, message: &str) -> Result<Option<String>> {
        self.call(owned(&["ECHO", message])).await?.into_opt_string()
    }

    /// Explicit AUTH. A rejected credential is `Ok(false)`, not an error.
    pub async fn auth(&self, credential: &Credential) -> Result<bool> {
        let args = match credential {
            Credential::None => return Ok(true),
            Credential::Password(password) => owned(&["AUTH", password]),
            Credential::UserPassword { username, password } => owned(&["AUTH", username, password]),
        };
        match self.call(args).await {
            Ok(reply) => expect_ok(reply),
            Err(e) if e.is_auth_failure() => Ok(false),
            Err(e) => Err(e),
        }
    }

    // ── Keys & strings ───────────────────────────────────────────

    pub async fn set(&self, key: &str, value: &str) -> Result<bool> {
        expect_ok(self.call(with_key("SET", key, &[value])).await?)
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.call(with_key("GET", key, &[])).await?.into_opt_string()
    }

    pub async fn getdel(&self, key: &str) -> Result<Option<String>> {
        self.call(with_key("GETDEL", key, &[])).await?.into_opt_string()
    }

    pub async fn del(&self, keys: &[&str]) -> Result<i64> {
        let mut args = vec!["DEL"];
        args.extend_from_slice(keys);
        expect_int(self.call(owned(&args)).await?)
    }

    pub async fn unlink(&self, keys: &[&str]) -> Result<i64> {
        let mut args = vec!["UNLINK"];
        args.extend_from_slice(keys);
        expect_int(self.call(owned(&args)).await?)
    }

    pub async fn exists(&self, keys: &[&str]) -> Result<i64> {
        let mut args = vec!["EXISTS"];
        args.extend_from_slice(keys);
        expect_int(self.call(owned(&args)).await?)
    }

    /// `TYPE key`: "string", "list", "none", ...
    pub async fn key_type(&self, key: &str) -> Result<String> {
        Ok(self
            .call(with_key("TYPE", key, &[]))
            .await?
            .into_opt_string()?
            .unwrap_or_default())
    }

    pub async fn incr(&self, key: &str) -> Result<i64> {
        expect_int(self.call(with_key("INCR", key, &[])).await?)
    }

    pub async fn incr_by(&self, key: &str, by: i64) -> Result<i64> {
        expect_int(self.call(with_key("INCRBY", key, &[&by.to_string()])).await?)
    }

    pub async fn decr(&self, key: &str) -> Result<i64> {
        expect_int(self.call(with_key("DECR", key, &[])).await?)
    }

    pub async fn decr_by(&self, key: &str, by: i64) -> Result<i64> {
        expect_int(self.call(with_key("DECRBY", key, &[&by.to_string()])).await?)
    }

    pub async fn append(&self, key: &str, value: &str) -> Result<i64> {
        expect_int(self.call(with_key("APPEND", key, &[value])).await?)
    }

    pub async fn strlen(&self, key: &str) -> Result<i64> {
        expect_int(self.call(with_key("STRLEN", key, &[])).await?)
    }

    // ── Sets ─────────────────────────────────────────────────────

    pub async fn sadd(&self, key: &str, members: &[&str]) -> Result<i64> {
        expect_int(self.call(with_key("SADD", key, members)).await?)
    }

    pub async fn srem(&self, key: &str, members: &[&str]) -> Result<i64> {
        expect_int(self.call(with_key("SREM", key, members)).await?)
    }

    pub async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        self.call(with_key("SMEMBERS", key, &[])).await?.into_strings()
    }

    pub async fn scard(&self, key: &str) -> Result<i64> {
        expect_int(self.call(with_key("SCARD", key, &[])).await?)
    }

    pub async fn sismember(&self, key: &str, member: &str) -> Result<bool> {
        let reply = self.call(with_key("SISMEMBER", key, &[member])).await?;
        match reply {
            Reply::Boolean(b) => Ok(b),
            other => Ok(expect_int(other)? == 1),
        }
    }

    // ── Lists ────────────────────────────────────────────────────

    pub async fn rpush(&self, key: &str, elements: &[&str]) -> Result<i64> {
        expect_int(self.call(with_key("RPUSH", key, elements)).await?)
    }

    pub async fn lpush(&self, key: &str, elements: &[&str]) -> Result<i64> {
        expect_int(self.call(with_key("LPUSH", key, elements)).await?)
    }

    pub async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        self.call(with_key("LRANGE", key, &[&start.to_string(), &stop.to_string()]))
            .await?
            .into_strings()
    }

    pub async fn llen(&self, key: &str) -> Result<i64> {
        expect_int(self.call(with_key("LLEN", key, &[])).await?)
    }

    pub async fn lpop(&self, key: &str) -> Result<Option<String>> {
        self.call(with_key("LPOP", key, &[])).await?.into_opt_string()
    }

    pub async fn rpop(&self, key: &str) -> Result<Option<String>> {
        self.call(with_key("RPOP", key, &[])).await?.into_opt_string()
    }

    pub async fn lindex(&self, key: &str, index: i64) -> Result<Option<String>> {
        self.call(with_key("LINDEX", key, &[&index.to_string()]))
            .await?
            .into_opt_string()
    }

    // ── Hashes ───────────────────────────────────────────────────

    pub async fn hset(&self, key: &str, field: &str, value: &str) -> Result<i64> {
        expect_int(self.call(with_key("HSET", key, &[field, value])).await?)
    }

    pub async fn hmset(&self, key: &str, pairs: &[(&str, &str)]) -> Result<bool> {
        let flat: Vec<&str> = pairs.iter().flat_map(|(f, v)| [*f, *v]).collect();
        expect_ok(self.call(with_key("HMSET", key, &flat)).await?)
    }

    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.call(with_key("HGET", key, &[field])).await?.into_opt_string()
    }

    pub async fn hgetall(&self, key: &str) -> Result<BTreeMap<String, String>> {
        self.call(with_key("HGETALL", key, &[]))
            .await?
            .into_pairs()?
            .into_iter()
            .map(|(f, v)| match (f.as_str(), v.as_str()) {
                (Some(f), Some(v)) => Ok((f.to_string(), v.to_string())),
                _ => Err(HarnessError::Type("HGETALL: non-string field or value".into())),
            })
            .collect()
    }

    pub async fn hlen(&self, key: &str) -> Result<i64> {
        expect_int(self.call(with_key("HLEN", key, &[])).await?)
    }

    pub async fn hdel(&self, key: &str, fields: &[&str]) -> Result<i64> {
        expect_int(self.call(with_key("HDEL", key, fields)).await?)
    }

    // ── Sorted sets ──────────────────────────────────────────────

    pub async fn zadd(&self, key: &str, members: &[(f64, &str)]) -> Result<i64> {
        let scores: Vec<String> = members.iter().map(|(s, _)| s.to_string()).collect();
        let mut flat = Vec::with_capacity(members.len() * 2);
        for (score, (_, member)) in scores.iter().zip(members) {
            flat.push(score.as_str());
            flat.push(*member);
        }
        expect_int(self.call(with_key("ZADD", key, &flat)).await?)
    }

    pub async fn zrange_withscores(&self, key: &str, start: i64, stop: i64) -> Result<Vec<(String, f64)>> {
        self.call(with_key(
            "ZRANGE",
            key,
            &[&start.to_string(), &stop.to_string(), "WITHSCORES"],
        ))
        .await?
        .into_pairs()?
        .into_iter()
        .map(|(m, s)| match (m.as_str(), s.as_f64()) {
            (Some(m), Some(s)) => Ok((m.to_string(), s)),
            _ => Err(HarnessError::Type("ZRANGE: malformed member/score pair".into())),
        })
        .collect()
    }

    pub async fn zcard(&self, key: &str) -> Result<i64> {
        expect_int(self.call(with_key("ZCARD", key, &[])).await?)
    }

    pub async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>> {
        let reply = self.call(with_key("ZSCORE", key, &[member])).await?;
        if reply.is_nil() {
            return Ok(None);
        }
        reply
            .as_f64()
            .map(Some)
            .ok_or_else(|| HarnessError::Type(format!("ZSCORE: got {}", reply.type_name())))
    }

    // ── Streams ──────────────────────────────────────────────────

    pub async fn xadd(&self, key: &str, id: &str, fields: &[(&str, &str)]) -> Result<String> {
        let mut rest = vec![id];
        rest.extend(fields.iter().flat_map(|(f, v)| [*f, *v]));
        self.call(with_key("XADD", key, &rest))
            .await?
            .into_opt_string()?
            .ok_or_else(|| HarnessError::Type("XADD returned nil".into()))
    }

    pub async fn xrange(&self, key: &str, start: &str, end: &str) -> Result<Vec<StreamEntry>> {
        let entries = self
            .call(with_key("XRANGE", key, &[start, end]))
            .await?
            .into_array()
            .ok_or_else(|| HarnessError::Type("XRANGE: expected array".into()))?;
        entries
            .into_iter()
            .map(|entry| {
                let mut parts = entry
                    .into_array()
                    .ok_or_else(|| HarnessError::Type("XRANGE: entry is not an array".into()))?
                    .into_iter();
                let id = parts
                    .next()
                    .and_then(|id| id.as_str().map(str::to_string))
                    .ok_or_else(|| HarnessError::Type("XRANGE: missing entry id".into()))?;
                let fields = match parts.next() {
                    Some(body) => body.into_strings()?,
                    None => Vec::new(),
                };
                let fields = fields
                    .chunks(2)
                    .filter(|c| c.len() == 2)
                    .map(|c| (c[0].clone(), c[1].clone()))
                    .collect();
                Ok(StreamEntry { id, fields })
            })
            .collect()
    }

    pub async fn xlen(&self, key: &str) -> Result<i64> {
        expect_int(self.call(with_key("XLEN", key, &[])).await?)
    }

    // ── Geo ──────────────────────────────────────────────────────

    /// `GEOADD key lon lat member ...`.
    pub async fn geoadd(&self, key: &str, points: &[(f64, f64, &str)]) -> Result<i64> {
        let coords: Vec<(String, String)> = points
            .iter()
            .map(|(lon, lat, _)| (lon.to_string(), lat.to_string()))
            .collect();
        let mut rest = Vec::with_capacity(points.len() * 3);
        for ((lon, lat), (_, _, member)) in coords.iter().zip(points) {
            rest.push(lon.as_str());
            rest.push(lat.as_str());
            rest.push(*member);
        }
        expect_int(self.call(with_key("GEOADD", key, &rest)).await?)
    }

    /// Distance in `unit` (m, km, mi, ft); `None` if either member is missing.
    pub async fn geodist(&self, key: &str, from: &str, to: &str, unit: &str) -> Result<Option<f64>> {
        let reply = self.call(with_key("GEODIST", key, &[from, to, unit])).await?;
        if reply.is_nil() {
            return Ok(None);
        }
        reply
            .as_f64()
            .map(Some)
            .ok_or_else(|| HarnessError::Type(format!("GEODIST: got {}", reply.type_name())))
    }

    /// `(longitude, latitude)` per member, `None` for missing members.
    pub async fn geopos(&self, key: &str, members: &[&str]) -> Result<Vec<Option<(f64, f64)>>> {
        let positions = self
            .call(with_key("GEOPOS", key, members))
            .await?
            .into_array()
            .ok_or_else(|| HarnessError::Type("GEOPOS: expected array".into()))?;
        positions
            .into_iter()
            .map(|pos| match pos {
                Reply::Nil => Ok(None),
                other => {
                    let coords = other.into_array().unwrap_or_default();
                    match coords.as_slice() {
                        [lon, lat] => match (lon.as_f64(), lat.as_f64()) {
                            (Some(lon), Some(lat)) => Ok(Some((lon, lat))),
                            _ => Err(HarnessError::Type("GEOPOS: non-numeric coordinate".into())),
                        },
                        _ => Err(HarnessError::Type("GEOPOS: malformed position".into())),
                    }
                }
            })
            .collect()
    }

    // ── Generic ──────────────────────────────────────────────────

    /// Send arbitrary arguments, no reply shaping.
    pub async fn raw_command(&self, args: &[&str]) -> Result<Reply> {
        self.call(owned(args)).await
    }

    /// Send arbitrary arguments to the primary owning `key`.
    pub async fn raw_command_routed(&self, key: &str, args: &[&str]) -> Result<Reply> {
        self.execute_routed(args, Route::PrimaryForKey(key.to_string()))
            .await
    }
}
