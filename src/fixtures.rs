//! Fixture catalog: city coordinates and deterministic per-type key fixtures.
//!
//! A key fixture is `(type, "<type>-<index>", value)`. Member and value names
//! are derived from the key, so a given key always holds the same data.

use std::collections::BTreeMap;
use std::fmt;

use crate::client::{ClientHandle, StreamEntry};
use crate::error::{HarnessError, Result};

/// A named coordinate pair for geo scenarios.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct City {
    pub name: &'static str,
    pub longitude: f64,
    pub latitude: f64,
}

pub const CITIES: [City; 5] = [
    City { name: "Chico", longitude: -121.837478, latitude: 39.728494 },
    City { name: "Sacramento", longitude: -121.494400, latitude: 38.581572 },
    City { name: "Gridley", longitude: -121.693583, latitude: 39.363777 },
    City { name: "Marysville", longitude: -121.591355, latitude: 39.145725 },
    City { name: "Cupertino", longitude: -122.032182, latitude: 37.322998 },
];

/// Value types a key fixture can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyType {
    String,
    Set,
    List,
    Hash,
    SortedSet,
    Stream,
}

impl KeyType {
    pub const ALL: [KeyType; 6] = [
        Self::String,
        Self::Set,
        Self::List,
        Self::Hash,
        Self::SortedSet,
        Self::Stream,
    ];

    /// Tag as reported by `TYPE`.
    pub fn tag(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Set => "set",
            Self::List => "list",
            Self::Hash => "hash",
            Self::SortedSet => "zset",
            Self::Stream => "stream",
        }
    }

    /// Unknown tags are a harness bug, not a server condition.
    pub fn from_tag(tag: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.tag() == tag)
            .ok_or_else(|| HarnessError::Fixture(format!("Unknown type '{tag}'")))
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// `"<type>-<index>"`.
pub fn key_name(kind: KeyType, index: usize) -> String {
    format!("{}-{}", kind.tag(), index)
}

/// The value shape a fixture key holds.
#[derive(Debug, Clone, PartialEq)]
pub enum FixtureValue {
    Scalar(String),
    /// Unordered members (set).
    Members(Vec<String>),
    /// Ordered elements (list).
    Sequence(Vec<String>),
    Mapping(BTreeMap<String, String>),
    Scored(BTreeMap<String, f64>),
    Entries(Vec<StreamEntry>),
}

impl FixtureValue {
    /// The deterministic value `key` holds when populated as `kind`.
    pub fn generate(kind: KeyType, key: &str) -> Self {
        match kind {
            KeyType::String => Self::Scalar(format!("{key}-value")),
            KeyType::Set => Self::Members((1..=6).map(|i| format!("{key}-mem{i}")).collect()),
            KeyType::List => Self::Sequence((1..=6).map(|i| format!("{key}-ele{i}")).collect()),
            KeyType::Hash => Self::Mapping(
                (1..=3)
                    .map(|i| (format!("{key}-mem{i}"), format!("{key}-val{i}")))
                    .collect(),
            ),
            KeyType::SortedSet => Self::Scored(
                (1..=3)
                    .map(|i| (format!("{key}-mem{i}"), f64::from(i)))
                    .collect(),
            ),
            KeyType::Stream => Self::Entries(
                (1..=3)
                    .map(|i| StreamEntry {
                        id: format!("{i}-0"),
                        fields: vec![(format!("{key}-field{i}"), format!("{key}-val{i}"))],
                    })
                    .collect(),
            ),
        }
    }

    pub fn kind(&self) -> KeyType {
        match self {
            Self::Scalar(_) => KeyType::String,
            Self::Members(_) => KeyType::Set,
            Self::Sequence(_) => KeyType::List,
            Self::Mapping(_) => KeyType::Hash,
            Self::Scored(_) => KeyType::SortedSet,
            Self::Entries(_) => KeyType::Stream,
        }
    }
}

/// Sorted-set equivalence: same cardinality, same members, same score sum.
///
/// Per-member scores are NOT compared, so `{a:1, b:5}` and `{a:5, b:1}`
/// are considered equivalent. Callers that need exact equality must compare
/// the maps directly.
pub fn zset_equivalent(expected: &BTreeMap<String, f64>, actual: &BTreeMap<String, f64>) -> bool {
    if expected.len() != actual.len() || !expected.keys().eq(actual.keys()) {
        return false;
    }
    let sum = |m: &BTreeMap<String, f64>| m.values().sum::<f64>();
    (sum(expected) - sum(actual)).abs() < 1e-9
}

/// Delete `key`, then write `value` under it.
pub async fn write_fixture(client: &ClientHandle, key: &str, value: &FixtureValue) -> Result<()> {
    client.del(&[key]).await?;
    match value {
        FixtureValue::Scalar(v) => {
            client.set(key, v).await?;
        }
        FixtureValue::Members(members) => {
            let members: Vec<&str> = members.iter().map(String::as_str).collect();
            client.sadd(key, &members).await?;
        }
        FixtureValue::Sequence(elements) => {
            let elements: Vec<&str> = elements.iter().map(String::as_str).collect();
            client.rpush(key, &elements).await?;
        }
        FixtureValue::Mapping(map) => {
            let pairs: Vec<(&str, &str)> = map.iter().map(|(f, v)| (f.as_str(), v.as_str())).collect();
            client.hmset(key, &pairs).await?;
        }
        FixtureValue::Scored(map) => {
            let members: Vec<(f64, &str)> = map.iter().map(|(m, s)| (*s, m.as_str())).collect();
            client.zadd(key, &members).await?;
        }
        FixtureValue::Entries(entries) => {
            for entry in entries {
                let fields: Vec<(&str, &str)> = entry
                    .fields
                    .iter()
                    .map(|(f, v)| (f.as_str(), v.as_str()))
                    .collect();
                client.xadd(key, &entry.id, &fields).await?;
            }
        }
    }
    Ok(())
}

/// Read `key` back in the shape `kind` dictates.
pub async fn read_fixture(client: &ClientHandle, kind: KeyType, key: &str) -> Result<FixtureValue> {
    Ok(match kind {
        KeyType::String => FixtureValue::Scalar(client.get(key).await?.unwrap_or_default()),
        KeyType::Set => FixtureValue::Members(client.smembers(key).await?),
        KeyType::List => FixtureValue::Sequence(client.lrange(key, 0, -1).await?),
        KeyType::Hash => FixtureValue::Mapping(client.hgetall(key).await?),
        KeyType::SortedSet => {
            FixtureValue::Scored(client.zrange_withscores(key, 0, -1).await?.into_iter().collect())
        }
        KeyType::Stream => FixtureValue::Entries(client.xrange(key, "-", "+").await?),
    })
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(m, s)| (m.to_string(), *s)).collect()
    }

    #[test]
    fn key_names_are_deterministic() {
        assert_eq!(key_name(KeyType::Hash, 3), "hash-3");
        assert_eq!(key_name(KeyType::SortedSet, 0), "zset-0");
    }

    #[test]
    fn tags_round_trip_and_unknown_is_an_error() {
        for kind in KeyType::ALL {
            assert_eq!(KeyType::from_tag(kind.tag()).unwrap(), kind);
        }
        assert!(matches!(KeyType::from_tag("bitmap"), Err(HarnessError::Fixture(_))));
    }

    #[test]
    fn hash_fixture_shape() {
        let FixtureValue::Mapping(map) = FixtureValue::generate(KeyType::Hash, "hash-3") else {
            panic!("hash fixture must be a mapping");
        };
        let expected: BTreeMap<String, String> = [
            ("hash-3-mem1", "hash-3-val1"),
            ("hash-3-mem2", "hash-3-val2"),
            ("hash-3-mem3", "hash-3-val3"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(map, expected);
    }

    #[test]
    fn set_and_list_have_six_members() {
        match FixtureValue::generate(KeyType::Set, "set-1") {
            FixtureValue::Members(m) => {
                assert_eq!(m.len(), 6);
                assert_eq!(m[5], "set-1-mem6");
            }
            other => panic!("unexpected {other:?}"),
        }
        match FixtureValue::generate(KeyType::List, "list-1") {
            FixtureValue::Sequence(e) => assert_eq!(e[0], "list-1-ele1"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn generated_value_kind_matches() {
        for kind in KeyType::ALL {
            assert_eq!(FixtureValue::generate(kind, &key_name(kind, 1)).kind(), kind);
        }
    }

    #[test]
    fn zset_equivalence_accepts_identical() {
        let a = scored(&[("a", 1.0), ("b", 2.0)]);
        assert!(zset_equivalent(&a, &a.clone()));
    }

    #[test]
    fn zset_equivalence_rejects_different_members_or_sums() {
        let a = scored(&[("a", 1.0), ("b", 2.0)]);
        assert!(!zset_equivalent(&a, &scored(&[("a", 1.0), ("c", 2.0)])));
        assert!(!zset_equivalent(&a, &scored(&[("a", 1.0), ("b", 3.0)])));
        assert!(!zset_equivalent(&a, &scored(&[("a", 1.0)])));
    }

    #[test]
    fn zset_equivalence_misses_swapped_scores() {
        // Known blind spot: equal sums hide per-member differences.
        let a = scored(&[("a", 1.0), ("b", 5.0)]);
        let b = scored(&[("a", 5.0), ("b", 1.0)]);
        assert_ne!(a, b);
        assert!(zset_equivalent(&a, &b));
    }

    #[test]
    fn city_catalog() {
        assert_eq!(CITIES.len(), 5);
        assert_eq!(CITIES[0].name, "Chico");
        assert!(CITIES.iter().all(|c| c.longitude < -121.0 && c.latitude > 37.0));
    }
}
