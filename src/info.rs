//! Server `INFO` parsing and version predicates.

use std::collections::HashMap;

use semver::Version;

/// Version reported when the server does not announce one.
pub const UNKNOWN_VERSION: &str = "0.0.0";

/// Parsed `INFO` reply: `field:value` lines, section headers dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoMap {
    fields: HashMap<String, String>,
}

impl InfoMap {
    pub fn parse(text: &str) -> Self {
        let fields = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `redis_version`, or `0.0.0` when absent.
    pub fn server_version(&self) -> &str {
        self.get("redis_version").unwrap_or(UNKNOWN_VERSION)
    }

    /// Valkey announces itself through `server_name`; plain Redis does not.
    pub fn is_valkey(&self) -> bool {
        self.get("server_name") == Some("valkey")
    }
}

/// Normalize loose server versions ("7", "7.2", "7.2.4-rc1") into semver.
pub fn normalize_version(raw: &str) -> Version {
    let core = raw.trim().split(['-', '+']).next().unwrap_or_default();
    let mut parts = core
        .split('.')
        .map(|p| p.parse::<u64>().unwrap_or(0))
        .chain(std::iter::repeat(0));
    let (major, minor, patch) = (
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    );
    Version::new(major, minor, patch)
}

/// True iff `detected >= minimum` under semantic version ordering.
pub fn version_at_least(detected: &str, minimum: &str) -> bool {
    normalize_version(detected) >= normalize_version(minimum)
}

// ── Tests ──────────────────────────────────────────────────────────
