//! Connection factory: run target plus a pluggable connector.
//!
//! Suites never build clients directly. They ask the [`ConnectionFactory`],
//! which derives the request from the run's [`Target`] and hands it to a
//! [`Connector`]. The live connector dials real servers; tests inject their own.

use std::sync::Arc;

use tracing::debug;

use crate::client::cluster::ClusterClient;
use crate::client::standalone::StandaloneClient;
use crate::client::{ClientFuture, ClientHandle};
use crate::config::{
    ClientOptions, ConnectionRequest, Credential, Endpoint, ReadFrom, DEFAULT_CLUSTER_SEED,
    DEFAULT_HOST, DEFAULT_PORT,
};
use crate::error::Result;

/// Turns a connection request into a connected client.
pub trait Connector: Send + Sync {
    fn connect<'a>(&'a self, request: &'a ConnectionRequest) -> ClientFuture<'a, ClientHandle>;
}

/// Connector backed by the `redis` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveConnector;

impl Connector for LiveConnector {
    fn connect<'a>(&'a self, request: &'a ConnectionRequest) -> ClientFuture<'a, ClientHandle> {
        Box::pin(async move {
            debug!(
                cluster = request.cluster_mode_enabled,
                addresses = ?request.addresses,
                "connecting"
            );
            if request.cluster_mode_enabled {
                Ok(ClientHandle::from_client(ClusterClient::connect(request.clone()).await?))
            } else {
                Ok(ClientHandle::from_client(StandaloneClient::connect(request.clone()).await?))
            }
        })
    }
}

/// The server a run is aimed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub credential: Credential,
    pub tls: bool,
    /// Seed the cluster factory dials.
    pub cluster_seed: Endpoint,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            credential: Credential::None,
            tls: false,
            cluster_seed: default_cluster_seed(),
        }
    }
}

impl Target {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    /// Options for a client aimed at `addresses`, with TLS as configured.
    ///
    /// TLS runs skip certificate checks, as the test servers use self-signed ones.
    pub fn options_for(&self, addresses: Vec<Endpoint>) -> ClientOptions {
        let mut options = ClientOptions::new(addresses);
        options.use_tls = self.tls;
        options.use_insecure_tls = self.tls;
        options
    }
}

/// Builds clients for test contexts.
#[derive(Clone)]
pub struct ConnectionFactory {
    target: Target,
    connector: Arc<dyn Connector>,
}

impl ConnectionFactory {
    pub fn new(target: Target, connector: Arc<dyn Connector>) -> Self {
        Self { target, connector }
    }

    pub fn live(target: Target) -> Self {
        Self::new(target, Arc::new(LiveConnector))
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    /// Connect with explicit options; used by the constructor-feature suites.
    pub async fn connect(&self, request: &ConnectionRequest) -> Result<ClientHandle> {
        self.connector.connect(request).await
    }

    /// Single-node client for the target host and port, without credentials.
    ///
    /// Authentication is the caller's job so that a rejected credential
    /// surfaces as an assertion rather than a connection error.
    pub async fn standalone(&self) -> Result<ClientHandle> {
        let request = ConnectionRequest::standalone(&self.target.options_for(vec![self.target.endpoint()]))?;
        self.connect(&request).await
    }

    /// Cluster client through the fixed seed, primary reads, target credential.
    pub async fn cluster(&self) -> Result<ClientHandle> {
        self.connect(&self.cluster_request(vec![self.target.cluster_seed.clone()])?)
            .await
    }

    /// Request for a temporary cluster connection through arbitrary seeds.
    pub fn cluster_request(&self, seeds: Vec<Endpoint>) -> Result<ConnectionRequest> {
        let mut options = self.target.options_for(seeds);
        options.credential = self.target.credential.clone();
        options.read_from = ReadFrom::Primary;
        ConnectionRequest::cluster(&options)
    }
}

/// `127.0.0.1:7001`.
pub fn default_cluster_seed() -> Endpoint {
    DEFAULT_CLUSTER_SEED
        .parse()
        .unwrap_or_else(|_| Endpoint::new(DEFAULT_HOST, 7001))
}

// ── Tests ──────────────────────────────────────────────────────────
