//! Cluster-aware client over `redis::cluster_async`.
//!
//! Keyed commands are routed by the client library. Keyless commands can be
//! pinned to a random node or to the primary owning a key, which is how the
//! cluster suites target `PING`, `INFO` and raw commands.

use parking_lot::Mutex;
use redis::aio::ConnectionLike;
use redis::cluster::ClusterClientBuilder;
use redis::cluster_async::ClusterConnection;
use redis::cluster_routing::{Route as SlotRoute, RoutingInfo, SingleNodeRoutingInfo, SlotAddr};
use tracing::debug;

use super::slot::key_slot;
use super::{ClientFuture, Route, StoreClient, Topology};
use crate::config::{ConnectionRequest, PeriodicChecks, TlsMode};
use crate::error::{HarnessError, Result};
use crate::reply::Reply;

pub struct ClusterClient {
    request: ConnectionRequest,
    connection: Mutex<Option<ClusterConnection>>,
}

impl ClusterClient {
    pub async fn connect(request: ConnectionRequest) -> Result<Self> {
        let client = Self {
            request,
            connection: Mutex::new(None),
        };
        if !client.request.lazy_connect {
            client.connection().await?;
        }
        Ok(client)
    }

    async fn connection(&self) -> Result<ClusterConnection> {
        if let Some(conn) = self.connection.lock().as_ref() {
            return Ok(conn.clone());
        }
        let conn = self.establish().await?;
        *self.connection.lock() = Some(conn.clone());
        Ok(conn)
    }

    async fn establish(&self) -> Result<ClusterConnection> {
        let request = &self.request;
        let (scheme, fragment) = match request.tls_mode {
            TlsMode::NoTls => ("redis", ""),
            TlsMode::SecureTls => ("rediss", ""),
            TlsMode::InsecureTls => ("rediss", "/#insecure"),
        };
        let nodes: Vec<String> = request
            .addresses
            .iter()
            .map(|address| format!("{scheme}://{address}{fragment}"))
            .collect();

        let mut builder = ClusterClientBuilder::new(nodes);
        if let Some(auth) = &request.authentication {
            if let Some(username) = &auth.username {
                builder = builder.username(username.clone());
            }
            builder = builder.password(auth.password.clone());
        }
        if request.read_from.reads_replicas() {
            builder = builder.read_from_replicas();
        }
        if let Some(limit) = request.connection_timeout {
            builder = builder.connection_timeout(limit);
        }
        if let Some(limit) = request.request_timeout {
            builder = builder.response_timeout(limit);
        }
        if let Some(strategy) = request.connection_retry_strategy {
            builder = builder
                .retries(strategy.num_of_retries)
                .retry_wait_formula(u64::from(strategy.factor), u64::from(strategy.exponent_base))
                .max_retry_wait(u64::try_from(strategy.max_delay().as_millis()).unwrap_or(u64::MAX));
            if let Some(percent) = strategy.jitter_percent {
                // The cluster client applies its own jitter to retry waits.
                debug!(percent, "jitter_percent recorded; cluster retries use built-in jitter");
            }
        }
        if request.periodic_checks == Some(PeriodicChecks::Disabled) {
            debug!("periodic topology checks disabled");
        }

        let client = builder.build()?;
        let connect = client.get_async_connection();
        let conn = match request.connection_timeout {
            Some(limit) => tokio::time::timeout(limit, connect).await??,
            None => connect.await?,
        };
        debug!(seeds = ?request.addresses, "cluster connection established");
        Ok(conn)
    }

    async fn run(&self, args: Vec<String>, route: Route) -> Result<Reply> {
        let Some((name, rest)) = args.split_first() else {
            return Err(HarnessError::Config("empty command".into()));
        };
        let mut cmd = redis::cmd(name);
        for arg in rest {
            cmd.arg(arg);
        }
        let mut conn = self.connection().await?;
        let routing = match route {
            Route::Default => None,
            Route::RandomNode => Some(RoutingInfo::SingleNode(SingleNodeRoutingInfo::Random)),
            Route::PrimaryForKey(key) => Some(RoutingInfo::SingleNode(
                SingleNodeRoutingInfo::SpecificNode(SlotRoute::new(
                    key_slot(key.as_bytes()),
                    SlotAddr::Master,
                )),
            )),
        };
        let query = async {
            match routing {
                Some(routing) => conn.route_command(&cmd, routing).await,
                None => conn.req_packed_command(&cmd).await,
            }
        };
        let value = match self.request.request_timeout {
            Some(limit) => tokio::time::timeout(limit, query).await??,
            None => query.await?,
        };
        Ok(Reply::from(value))
    }
}

impl StoreClient for ClusterClient {
    fn topology(&self) -> Topology {
        Topology::Cluster
    }

    fn execute(&self, args: Vec<String>, route: Route) -> ClientFuture<'_, Reply> {
        Box::pin(self.run(args, route))
    }

    fn masters(&self) -> ClientFuture<'_, Vec<String>> {
        Box::pin(async move {
            let slots = self
                .run(vec!["CLUSTER".into(), "SLOTS".into()], Route::RandomNode)
                .await?;
            primaries_from_cluster_slots(&slots)
        })
    }

    fn close(&self) -> ClientFuture<'_, ()> {
        Box::pin(async move {
            if self.connection.lock().take().is_some() {
                debug!("cluster connection closed");
            }
            Ok(())
        })
    }
}

// ── CLUSTER SLOTS ────────────────────────────────────────────────

/// Distinct primary addresses from a `CLUSTER SLOTS` reply, in reply order.
///
/// Each entry is `[start, end, [host, port, id…], replicas…]`; only the
/// first node array (the primary) is read.
pub fn primaries_from_cluster_slots(reply: &Reply) -> Result<Vec<String>> {
    let Reply::Array(ranges) = reply else {
        return Err(HarnessError::Type(format!(
            "CLUSTER SLOTS: expected array, got {}",
            reply.type_name()
        )));
    };

    let mut primaries: Vec<String> = Vec::new();
    for range in ranges {
        let Reply::Array(items) = range else { continue };
        let Some(node) = items.get(2) else { continue };
        let addr = node_addr(node)?;
        if !primaries.contains(&addr) {
            primaries.push(addr);
        }
    }
    Ok(primaries)
}

fn node_addr(node: &Reply) -> Result<String> {
    let Reply::Array(items) = node else {
        return Err(HarnessError::Type("CLUSTER SLOTS: expected node array".into()));
    };
    let host = items
        .first()
        .and_then(Reply::as_str)
        .ok_or_else(|| HarnessError::Type("CLUSTER SLOTS: invalid host".into()))?;
    let port = items
        .get(1)
        .and_then(Reply::as_int)
        .ok_or_else(|| HarnessError::Type("CLUSTER SLOTS: invalid port".into()))?;
    Ok(format!("{host}:{port}"))
}

// ── Tests ──────────────────────────────────────────────────────────
