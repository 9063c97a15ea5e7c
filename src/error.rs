use std::fmt;
use std::io;

use crate::seeds::SeedError;

// ── Error taxonomy ────────────────────────────────────────────────
//
//  HarnessError
//  ├── Connection / Io / Timeout      transport to the store
//  ├── Redis { kind, message }        error reply from the store
//  │   ├── Err, WrongType, NoAuth, WrongPass
//  │   └── Moved, Ask, ClusterDown, Loading, ReadOnly, Busy, TryAgain
//  ├── Type / Config                  client-side misuse
//  ├── Unreachable                    standalone setup saw no INFO
//  ├── Assertion / Skipped            test body outcomes
//  ├── Fixture                        unknown key-type tag
//  ├── Seeds                          every seed source failed
//  ├── Fatal                          cluster construction failed
//  └── UnknownSuite                   unresolvable class id

/// Structured server error kinds for programmatic matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedisErrorKind {
    /// Generic ERR
    Err,
    /// WRONGTYPE Operation against a key holding the wrong kind of value
    WrongType,
    /// NOAUTH Authentication required
    NoAuth,
    /// WRONGPASS invalid username-password pair
    WrongPass,
    /// MOVED slot host:port  (cluster)
    Moved { slot: u16, addr: String },
    /// ASK slot host:port  (cluster)
    Ask { slot: u16, addr: String },
    /// CLUSTERDOWN
    ClusterDown,
    /// LOADING the dataset is being loaded in memory
    Loading,
    /// READONLY You can't write against a read only replica
    ReadOnly,
    /// BUSY the server is running a script
    Busy,
    /// TRYAGAIN
    TryAgain,
    /// Any other error prefix
    Other(String),
}

impl RedisErrorKind {
    /// Parse from a server error message (e.g. "WRONGTYPE Operation against…").
    pub fn from_error_msg(msg: &str) -> (Self, String) {
        for (prefix, redirect) in [("MOVED ", true), ("ASK ", false)] {
            if let Some(rest) = msg.strip_prefix(prefix) {
                let parsed = rest
                    .split_once(' ')
                    .and_then(|(slot, addr)| Some((slot.parse::<u16>().ok()?, addr.to_string())));
                let kind = match (parsed, redirect) {
                    (Some((slot, addr)), true) => Self::Moved { slot, addr },
                    (Some((slot, addr)), false) => Self::Ask { slot, addr },
                    (None, _) => Self::Other(prefix.trim_end().to_string()),
                };
                return (kind, msg.to_string());
            }
        }

        let kind = if msg.starts_with("WRONGTYPE") {
            Self::WrongType
        } else if msg.starts_with("NOAUTH") {
            Self::NoAuth
        } else if msg.starts_with("WRONGPASS") {
            Self::WrongPass
        } else if msg.starts_with("CLUSTERDOWN") {
            Self::ClusterDown
        } else if msg.starts_with("LOADING") {
            Self::Loading
        } else if msg.starts_with("READONLY") {
            Self::ReadOnly
        } else if msg.starts_with("BUSY") {
            Self::Busy
        } else if msg.starts_with("TRYAGAIN") {
            Self::TryAgain
        } else if msg.starts_with("ERR") {
            Self::Err
        } else {
            let prefix = msg.split_whitespace().next().unwrap_or("UNKNOWN");
            Self::Other(prefix.to_string())
        };
        (kind, msg.to_string())
    }
}

/// All error variants raised by the harness.
#[derive(Debug)]
pub enum HarnessError {
    /// The transport to the store could not be established or was dropped.
    Connection(String),
    /// Local I/O failure (nodemap file, subprocess pipes, report sink).
    Io(io::Error),
    /// Connect or request timeout exceeded.
    Timeout(String),
    /// The store answered with an error reply.
    Redis {
        kind: RedisErrorKind,
        message: String,
    },
    /// A reply had an unexpected shape.
    Type(String),
    /// Invalid client options.
    Config(String),
    /// Standalone setup could not retrieve server info.
    Unreachable(String),
    /// An assertion inside a test body failed hard.
    Assertion(String),
    /// The test skipped itself.
    Skipped(String),
    /// Harness programming error in fixture handling.
    Fixture(String),
    /// Every cluster seed source failed.
    Seeds(SeedError),
    /// The cluster client could not be built; the run must stop.
    Fatal { message: String, seed_source: String },
    /// A class id no built-in or registered suite answers to.
    UnknownSuite(String),
}

impl HarnessError {
    /// Create a server error from a raw error message, auto-parsing the kind.
    pub fn redis(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        let (kind, message) = RedisErrorKind::from_error_msg(&msg);
        Self::Redis { kind, message }
    }

    /// True for the one condition that terminates a whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    /// Check if the store rejected our credentials.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::Redis {
                kind: RedisErrorKind::WrongPass | RedisErrorKind::NoAuth,
                ..
            }
        )
    }

    /// Check if this is a WRONGTYPE reply.
    pub fn is_wrong_type(&self) -> bool {
        matches!(
            self,
            Self::Redis {
                kind: RedisErrorKind::WrongType,
                ..
            }
        )
    }
}

impl fmt::Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "connection error: {msg}"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Redis { message, .. } => write!(f, "{message}"),
            Self::Type(msg) => write!(f, "type error: {msg}"),
            Self::Config(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Unreachable(msg) => write!(f, "{msg}"),
            Self::Assertion(msg) => write!(f, "assertion failed: {msg}"),
            Self::Skipped(reason) => write!(f, "skipped: {reason}"),
            Self::Fixture(msg) => write!(f, "fixture error: {msg}"),
            Self::Seeds(e) => write!(f, "{e}"),
            Self::Fatal {
                message,
                seed_source,
            } => write!(f, "Fatal error: {message}\nSeed source: {seed_source}"),
            Self::UnknownSuite(id) => write!(f, "Fatal: couldn't find test class '{id}'"),
        }
    }
}

impl std::error::Error for HarnessError {}

impl From<io::Error> for HarnessError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<tokio::time::error::Elapsed> for HarnessError {
    fn from(e: tokio::time::error::Elapsed) -> Self {
        Self::Timeout(e.to_string())
    }
}

impl From<SeedError> for HarnessError {
    fn from(e: SeedError) -> Self {
        Self::Seeds(e)
    }
}

impl From<redis::RedisError> for HarnessError {
    fn from(e: redis::RedisError) -> Self {
        if e.kind() == redis::ErrorKind::AuthenticationFailed {
            return Self::Redis {
                kind: RedisErrorKind::WrongPass,
                message: format!("WRONGPASS {e}"),
            };
        }
        if e.is_timeout() {
            return Self::Timeout(e.to_string());
        }
        if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() {
            return Self::Connection(e.to_string());
        }
        if e.kind() == redis::ErrorKind::TypeError {
            return Self::Type(e.to_string());
        }
        match e.code() {
            Some(code) => {
                let msg = match e.detail() {
                    Some(detail) => format!("{code} {detail}"),
                    None => code.to_string(),
                };
                Self::redis(msg)
            }
            None => Self::redis(e.to_string()),
        }
    }
}

/// Convenience type alias.
pub type Result<T> = std::result::Result<T, HarnessError>;

// ── Tests ──────────────────────────────────────────────────────────
