//! Single-node client over a multiplexed `redis` connection.

use parking_lot::Mutex;
use redis::aio::{ConnectionLike, MultiplexedConnection};
use redis::IntoConnectionInfo;
use tracing::debug;

use super::{ClientFuture, Route, StoreClient, Topology};
use crate::config::{ConnectionRequest, Endpoint, TlsMode};
use crate::error::{HarnessError, Result};
use crate::reply::Reply;

/// A standalone client built from a [`ConnectionRequest`].
///
/// The connection is opened at construction unless `lazy_connect` is set,
/// in which case the first command opens it.
pub struct StandaloneClient {
    request: ConnectionRequest,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl StandaloneClient {
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

    async fn connection(&self) -> Result<MultiplexedConnection> {
        if let Some(conn) = self.connection.lock().as_ref() {
            return Ok(conn.clone());
        }
        let conn = self.establish().await?;
        *self.connection.lock() = Some(conn.clone());
        Ok(conn)
    }

    /// Walk the address list, retrying the whole list per the reconnect strategy.
    async fn establish(&self) -> Result<MultiplexedConnection> {
        let strategy = self.request.connection_retry_strategy;
        let retries = strategy.map_or(0, |s| s.num_of_retries);
        let mut last_err = None;

        for attempt in 0..=retries {
            if let (Some(strategy), true) = (strategy, attempt > 0) {
                tokio::time::sleep(strategy.retry_delay(attempt - 1)).await;
            }
            for address in &self.request.addresses {
                match self.open(address).await {
                    Ok(conn) => {
                        debug!(%address, attempt, "standalone connection established");
                        return Ok(conn);
                    }
                    // Wrong credentials will not get better on the next node.
                    Err(e) if e.is_auth_failure() => return Err(e),
                    Err(e) => {
                        debug!(%address, attempt, error = %e, "connect attempt failed");
                        last_err = Some(e);
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| HarnessError::Connection("no address to connect to".into())))
    }

    async fn open(&self, address: &Endpoint) -> Result<MultiplexedConnection> {
        let client = redis::Client::open(connection_info(&self.request, address)?)?;
        let connect = client.get_multiplexed_async_connection();
        let mut conn = match self.request.connection_timeout {
            Some(limit) => tokio::time::timeout(limit, connect).await??,
            None => connect.await?,
        };
        if let Some(name) = &self.request.client_name {
            let _: () = redis::cmd("CLIENT")
                .arg("SETNAME")
                .arg(name)
                .query_async(&mut conn)
                .await?;
        }
        if let Some(az) = &self.request.client_az {
            debug!(client_az = %az, "availability zone recorded; standalone reads ignore it");
        }
        Ok(conn)
    }

    async fn run(&self, args: Vec<String>) -> Result<Reply> {
        let Some((name, rest)) = args.split_first() else {
            return Err(HarnessError::Config("empty command".into()));
        };
        let mut cmd = redis::cmd(name);
        for arg in rest {
            cmd.arg(arg);
        }
        let mut conn = self.connection().await?;
        let query = conn.req_packed_command(&cmd);
        let value = match self.request.request_timeout {
            Some(limit) => tokio::time::timeout(limit, query).await??,
            None => query.await?,
        };
        Ok(Reply::from(value))
    }
}

/// `redis://host:port/db`, `rediss://…` for TLS, `#insecure` to skip verification.
fn connection_info(request: &ConnectionRequest, address: &Endpoint) -> Result<redis::ConnectionInfo> {
    let (scheme, fragment) = match request.tls_mode {
        TlsMode::NoTls => ("redis", ""),
        TlsMode::SecureTls => ("rediss", ""),
        TlsMode::InsecureTls => ("rediss", "#insecure"),
    };
    let url = format!("{scheme}://{address}/{}{fragment}", request.database_id);
    let mut info = url.as_str().into_connection_info()?;
    if let Some(auth) = &request.authentication {
        info.redis.username = auth.username.clone();
        info.redis.password = Some(auth.password.clone());
    }
    Ok(info)
}

impl StoreClient for StandaloneClient {
    fn topology(&self) -> Topology {
        Topology::Standalone
    }

    fn execute(&self, args: Vec<String>, route: Route) -> ClientFuture<'_, Reply> {
        if route != Route::Default {
            debug!(?route, "route ignored by standalone client");
        }
        Box::pin(self.run(args))
    }

    fn masters(&self) -> ClientFuture<'_, Vec<String>> {
        Box::pin(async {
            Err(HarnessError::Type(
                "masters() is only available on cluster clients".into(),
            ))
        })
    }

    fn close(&self) -> ClientFuture<'_, ()> {
        Box::pin(async move {
            if self.connection.lock().take().is_some() {
                debug!("standalone connection closed");
            }
            Ok(())
        })
    }
}

// ── Tests ──────────────────────────────────────────────────────────
