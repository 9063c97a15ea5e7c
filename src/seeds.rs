//! Cluster seed discovery.
//!
//! Seeds come from the first source that yields a non-empty list:
//!
//! 1. probing the run's `--host`/`--port` as a cluster node and listing its masters
//! 2. the `REDIS_CLUSTER_NODES` environment variable (whitespace separated)
//! 3. a `nodes/nodemap` file next to the running executable (one seed per line)
//!
//! A source that fails leaves a message behind and the next one is tried.
//! Resolution runs at most once per [`SeedResolver`]; the outcome, success
//! or the full list of failed attempts, is cached for the rest of the run.

use std::fmt;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::Endpoint;
use crate::connect::ConnectionFactory;
use crate::error::{HarnessError, Result};

/// Environment variable consulted as the second seed source.
pub const SEED_ENV_VAR: &str = "REDIS_CLUSTER_NODES";

/// Where a resolved seed list came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedSource {
    HostPort(Endpoint),
    Environment,
    NodeMap(PathBuf),
}

impl fmt::Display for SeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HostPort(ep) => write!(f, "Host: {}, Port: {}", ep.host, ep.port),
            Self::Environment => write!(f, "Environment variable {SEED_ENV_VAR}"),
            Self::NodeMap(path) => write!(f, "Nodemap file '{}'", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedSet {
    pub seeds: Vec<String>,
    pub source: SeedSource,
}

/// Every source failed; one message per attempt, in priority order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedError {
    pub attempts: Vec<String>,
}

impl fmt::Display for SeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Couldn't load cluster seeds from any source")?;
        for attempt in &self.attempts {
            write!(f, "\n  tried {attempt}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SeedError {}

/// Inputs for seed discovery.
#[derive(Debug, Clone, Default)]
pub struct SeedSources {
    pub host_port: Option<Endpoint>,
    pub env_value: Option<String>,
    pub nodemap: Option<PathBuf>,
}

impl SeedSources {
    /// Sources for a real run: the target endpoint, the live environment and
    /// the nodemap beside the executable.
    pub fn from_environment(host_port: Endpoint) -> Self {
        Self {
            host_port: Some(host_port),
            env_value: std::env::var(SEED_ENV_VAR).ok(),
            nodemap: default_nodemap_path(),
        }
    }
}

/// `<exe dir>/nodes/nodemap`.
pub fn default_nodemap_path() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join("nodes").join("nodemap"))
}

/// Split on any whitespace, dropping empties.
pub fn parse_env_seeds(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

/// One seed per line; blank lines and trailing `\r` dropped.
pub fn parse_nodemap(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Run-scoped seed cache.
pub struct SeedResolver {
    sources: SeedSources,
    outcome: Mutex<Option<std::result::Result<SeedSet, SeedError>>>,
}

impl SeedResolver {
    pub fn new(sources: SeedSources) -> Self {
        Self {
            sources,
            outcome: Mutex::new(None),
        }
    }

    /// Resolve (first call) or replay the cached outcome.
    pub async fn resolve(&self, factory: &ConnectionFactory) -> Result<SeedSet> {
        if let Some(cached) = self.outcome.lock().clone() {
            return cached.map_err(HarnessError::from);
        }
        let fresh = self.load(factory).await;
        let outcome = self.outcome.lock().get_or_insert(fresh).clone();
        outcome.map_err(HarnessError::from)
    }

    /// Source of the resolved list, if resolution has run and succeeded.
    pub fn source(&self) -> Option<SeedSource> {
        match self.outcome.lock().as_ref() {
            Some(Ok(set)) => Some(set.source.clone()),
            _ => None,
        }
    }

    /// Human-readable source for diagnostics; empty before a successful resolution.
    pub fn source_description(&self) -> String {
        self.source().map(|s| s.to_string()).unwrap_or_default()
    }

    async fn load(&self, factory: &ConnectionFactory) -> std::result::Result<SeedSet, SeedError> {
        let mut attempts = Vec::new();

        if let Some(endpoint) = &self.sources.host_port {
            let tried = format!("--host={}, --port={}", endpoint.host, endpoint.port);
            match probe_masters(factory, endpoint).await {
                Ok(seeds) if !seeds.is_empty() => {
                    return Ok(found(seeds, SeedSource::HostPort(endpoint.clone())));
                }
                Ok(_) => attempts.push(format!("{tried} (no masters reported)")),
                Err(e) => attempts.push(format!("{tried} ({e})")),
            }
        }

        if let Some(value) = &self.sources.env_value {
            let seeds = parse_env_seeds(value);
            if !seeds.is_empty() {
                return Ok(found(seeds, SeedSource::Environment));
            }
            attempts.push(format!("environment variable {SEED_ENV_VAR} ({value})"));
        }

        if let Some(path) = &self.sources.nodemap {
            match read_nodemap(path).await {
                Ok(seeds) if !seeds.is_empty() => {
                    return Ok(found(seeds, SeedSource::NodeMap(path.clone())));
                }
                Ok(_) => attempts.push(format!("nodemap file '{}' (empty)", path.display())),
                Err(e) => attempts.push(format!("nodemap file '{}' ({e})", path.display())),
            }
        }

        for attempt in &attempts {
            warn!(%attempt, "cluster seed source failed");
        }
        Err(SeedError { attempts })
    }
}

fn found(seeds: Vec<String>, source: SeedSource) -> SeedSet {
    debug!(%source, count = seeds.len(), "cluster seeds resolved");
    SeedSet { seeds, source }
}

async fn probe_masters(factory: &ConnectionFactory, endpoint: &Endpoint) -> Result<Vec<String>> {
    let request = factory.cluster_request(vec![endpoint.clone()])?;
    let client = factory.connect(&request).await?;
    let masters = client.masters().await;
    if let Err(e) = client.close().await {
        debug!(error = %e, "closing probe connection failed");
    }
    masters
}

async fn read_nodemap(path: &Path) -> std::io::Result<Vec<String>> {
    Ok(parse_nodemap(&tokio::fs::read_to_string(path).await?))
}

// ── Tests ──────────────────────────────────────────────────────────
