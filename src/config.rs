//! Client construction options and the connection request built from them.
//!
//! `ClientOptions` mirrors the arguments a client constructor accepts.
//! `ConnectionRequest` is the validated form handed to a [`Connector`],
//! and is what the offline `ConnectionRequestTest` suite inspects.
//!
//! [`Connector`]: crate::connect::Connector

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::{HarnessError, Result};

/// Default store host.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default store port.
pub const DEFAULT_PORT: u16 = 6379;
/// Seed the cluster connection factory dials.
pub const DEFAULT_CLUSTER_SEED: &str = "127.0.0.1:7001";

/// Upper bound on a single reconnect backoff step.
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// One `host:port` address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        parse_host_port(s.trim(), DEFAULT_PORT)
    }
}

/// Parse `host`, `host:port` or `[v6]:port`.
pub fn parse_host_port(s: &str, default_port: u16) -> Result<Endpoint> {
    let (mut host, port) = if let Some(rest) = s.strip_prefix('[') {
        let close = rest
            .find(']')
            .ok_or_else(|| HarnessError::Config(format!("unclosed IPv6 bracket: {s}")))?;
        let port = match rest[close + 1..].strip_prefix(':') {
            Some(p) => p
                .parse()
                .map_err(|_| HarnessError::Config(format!("invalid port: {p}")))?,
            None => default_port,
        };
        (rest[..close].to_string(), port)
    } else if let Some((h, p)) = s.rsplit_once(':') {
        match p.parse::<u16>() {
            Ok(port) => (h.to_string(), port),
            // bare IPv6 without brackets
            Err(_) if h.contains(':') => (s.to_string(), default_port),
            Err(_) => return Err(HarnessError::Config(format!("invalid port: {p}"))),
        }
    } else {
        (s.to_string(), default_port)
    };

    if host.is_empty() {
        host = DEFAULT_HOST.to_string();
    }
    Ok(Endpoint { host, port })
}

// ── Credentials ───────────────────────────────────────────────────

/// Authentication material for a run or a single client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Credential {
    #[default]
    None,
    Password(String),
    UserPassword { username: String, password: String },
}

impl Credential {
    /// Build from the `--user` / `--auth` pair.
    ///
    /// A username without a password is reported and dropped.
    pub fn from_parts(user: Option<&str>, auth: Option<&str>) -> Self {
        match (user, auth) {
            (Some(username), Some(password)) => Self::UserPassword {
                username: username.to_string(),
                password: password.to_string(),
            },
            (None, Some(password)) => Self::Password(password.to_string()),
            (Some(_), None) => {
                warn!("User passed without a password!");
                Self::None
            }
            (None, None) => Self::None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Self::UserPassword { username, .. } => Some(username),
            _ => None,
        }
    }

    pub fn password(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Password(password) | Self::UserPassword { password, .. } => Some(password),
        }
    }

    /// Query-string fragment used in session save paths.
    pub fn auth_fragment(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::Password(password) => format!("auth[pass]={password}"),
            Self::UserPassword { username, password } => {
                format!("auth[user]={username}&auth[pass]={password}")
            }
        }
    }
}

// ── Client options ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TlsMode {
    #[default]
    NoTls,
    SecureTls,
    InsecureTls,
}

/// Read preference for replicated deployments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadFrom {
    #[default]
    Primary,
    PreferReplica,
    AzAffinity,
    AzAffinityReplicasAndPrimary,
}

impl ReadFrom {
    pub fn reads_replicas(self) -> bool {
        !matches!(self, Self::Primary)
    }
}

/// Exponential connection backoff: `factor * exponent_base^attempt` ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectStrategy {
    pub num_of_retries: u32,
    pub factor: u32,
    pub exponent_base: u32,
    pub jitter_percent: Option<u32>,
}

impl ReconnectStrategy {
    pub fn new(num_of_retries: u32, factor: u32, exponent_base: u32) -> Self {
        Self {
            num_of_retries,
            factor,
            exponent_base,
            jitter_percent: None,
        }
    }

    pub fn with_jitter(mut self, percent: u32) -> Self {
        self.jitter_percent = Some(percent);
        self
    }

    /// Delay before retry number `attempt` (0-based), capped at ten seconds.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let ms = u64::from(self.exponent_base)
            .checked_pow(attempt)
            .and_then(|p| p.checked_mul(u64::from(self.factor)))
            .unwrap_or(u64::MAX);
        Duration::from_millis(ms).min(MAX_BACKOFF)
    }

    /// `backoff(attempt)` stretched by up to `jitter_percent` of itself.
    /// `sample` is a uniform draw from `[0, 1)`.
    pub fn jittered_backoff(&self, attempt: u32, sample: f64) -> Duration {
        let base = self.backoff(attempt);
        match self.jitter_percent {
            Some(percent) if percent > 0 => {
                let spread = base * percent / 100;
                let extra = (spread.as_nanos() as f64 * sample.clamp(0.0, 1.0)) as u64;
                base + Duration::from_nanos(extra)
            }
            _ => base,
        }
    }

    /// The delay actually slept before retry `attempt`.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        self.jittered_backoff(attempt, rand::random::<f64>())
    }

    /// Upper bound of any delay this strategy produces.
    pub fn max_delay(&self) -> Duration {
        MAX_BACKOFF + MAX_BACKOFF * self.jitter_percent.unwrap_or(0) / 100
    }
}

/// Cluster topology refresh policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PeriodicChecks {
    #[default]
    EnabledDefaultConfigs,
    Disabled,
}

/// Everything a client constructor accepts.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub addresses: Vec<Endpoint>,
    pub use_tls: bool,
    pub use_insecure_tls: bool,
    pub credential: Credential,
    pub read_from: ReadFrom,
    pub request_timeout_ms: Option<u32>,
    pub reconnect_strategy: Option<ReconnectStrategy>,
    pub database_id: Option<u32>,
    pub client_name: Option<String>,
    pub client_az: Option<String>,
    pub connection_timeout_ms: Option<u32>,
    pub lazy_connect: bool,
    pub periodic_checks: Option<PeriodicChecks>,
}

impl ClientOptions {
    pub fn new(addresses: Vec<Endpoint>) -> Self {
        Self {
            addresses,
            ..Self::default()
        }
    }

    pub fn single(host: impl Into<String>, port: u16) -> Self {
        Self::new(vec![Endpoint::new(host, port)])
    }
}

/// Username/password pair as carried by a connection request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationInfo {
    pub username: Option<String>,
    pub password: String,
}

/// The validated request a connector turns into a live client.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionRequest {
    pub cluster_mode_enabled: bool,
    pub addresses: Vec<Endpoint>,
    pub tls_mode: TlsMode,
    pub authentication: Option<AuthenticationInfo>,
    pub read_from: ReadFrom,
    pub request_timeout: Option<Duration>,
    pub connection_retry_strategy: Option<ReconnectStrategy>,
    pub database_id: u32,
    pub client_name: Option<String>,
    pub client_az: Option<String>,
    pub connection_timeout: Option<Duration>,
    pub lazy_connect: bool,
    pub periodic_checks: Option<PeriodicChecks>,
}

impl ConnectionRequest {
    pub fn standalone(options: &ClientOptions) -> Result<Self> {
        Self::build(options, false)
    }

    pub fn cluster(options: &ClientOptions) -> Result<Self> {
        Self::build(options, true)
    }

    fn build(options: &ClientOptions, cluster: bool) -> Result<Self> {
        if options.addresses.is_empty() {
            return Err(HarnessError::Config("at least one address is required".into()));
        }
        if options.use_insecure_tls && !options.use_tls {
            return Err(HarnessError::Config(
                "use_insecure_tls requires use_tls".into(),
            ));
        }
        if cluster && options.database_id.is_some_and(|db| db != 0) {
            return Err(HarnessError::Config(
                "database_id is not supported in cluster mode".into(),
            ));
        }
        if !cluster && options.periodic_checks.is_some() {
            return Err(HarnessError::Config(
                "periodic_checks is only supported in cluster mode".into(),
            ));
        }
        if let Some(jitter) = options.reconnect_strategy.and_then(|s| s.jitter_percent) {
            if jitter > 100 {
                return Err(HarnessError::Config(format!(
                    "jitter_percent must be within 0..=100, got {jitter}"
                )));
            }
        }

        let tls_mode = match (options.use_tls, options.use_insecure_tls) {
            (false, _) => TlsMode::NoTls,
            (true, false) => TlsMode::SecureTls,
            (true, true) => TlsMode::InsecureTls,
        };
        let authentication = options.credential.password().map(|password| AuthenticationInfo {
            username: options.credential.username().map(str::to_string),
            password: password.to_string(),
        });

        Ok(Self {
            cluster_mode_enabled: cluster,
            addresses: options.addresses.clone(),
            tls_mode,
            authentication,
            read_from: options.read_from,
            request_timeout: options.request_timeout_ms.map(|ms| Duration::from_millis(ms.into())),
            connection_retry_strategy: options.reconnect_strategy,
            database_id: options.database_id.unwrap_or(0),
            client_name: options.client_name.clone(),
            client_az: options.client_az.clone(),
            connection_timeout: options
                .connection_timeout_ms
                .map(|ms| Duration::from_millis(ms.into())),
            lazy_connect: options.lazy_connect,
            periodic_checks: if cluster {
                Some(options.periodic_checks.unwrap_or_default())
            } else {
                None
            },
        })
    }
}

// ── Tests ──────────────────────────────────────────────────────────
