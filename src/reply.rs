//! Store replies as seen by the harness.
//!
//! Whatever the client library hands back is normalized into [`Reply`] so the
//! suites, the fixture checks and the in-memory test store speak one shape.

use bytes::Bytes;

use crate::error::{HarnessError, Result};

/// A reply value (RESP2 shapes plus the RESP3 ones a client may surface).
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Nil,
    /// +OK and other status replies
    Status(String),
    Int(i64),
    Bulk(Bytes),
    Array(Vec<Reply>),
    Map(Vec<(Reply, Reply)>),
    Set(Vec<Reply>),
    Double(f64),
    Boolean(bool),
    /// Anything the harness never inspects structurally (push, big number…).
    Other(String),
}

impl Reply {
    pub fn ok() -> Self {
        Self::Status("OK".into())
    }

    pub fn bulk(s: impl AsRef<[u8]>) -> Self {
        Self::Bulk(Bytes::copy_from_slice(s.as_ref()))
    }

    /// Try to interpret this value as a UTF-8 string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Status(s) => Some(s),
            Self::Bulk(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; bulk strings are parsed since scores travel as text in RESP2.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(*d),
            Self::Int(i) => Some(*i as f64),
            Self::Bulk(_) | Self::Status(_) => self.as_str()?.parse().ok(),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// True for `+OK`.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Status(s) if s == "OK")
    }

    pub fn into_array(self) -> Option<Vec<Reply>> {
        match self {
            Self::Array(a) | Self::Set(a) => Some(a),
            _ => None,
        }
    }

    /// Nil becomes `None`; any string shape becomes `Some`.
    pub fn into_opt_string(self) -> Result<Option<String>> {
        match self {
            Self::Nil => Ok(None),
            other => other
                .as_str()
                .map(|s| Some(s.to_string()))
                .ok_or_else(|| type_error("string", &other)),
        }
    }

    /// An array (or set) of strings.
    pub fn into_strings(self) -> Result<Vec<String>> {
        let type_name = self.type_name();
        let items = self
            .into_array()
            .ok_or_else(|| HarnessError::Type(format!("expected array, got {type_name}")))?;
        items
            .into_iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| type_error("string element", &item))
            })
            .collect()
    }

    /// Field/value pairs from a RESP3 map, a flat RESP2 array, or an array of
    /// two-element arrays.
    pub fn into_pairs(self) -> Result<Vec<(Reply, Reply)>> {
        match self {
            Self::Map(pairs) => Ok(pairs),
            Self::Array(items) if items.iter().all(|i| matches!(i, Self::Array(a) if a.len() == 2)) => {
                Ok(items
                    .into_iter()
                    .filter_map(|item| {
                        let mut pair = item.into_array()?.into_iter();
                        Some((pair.next()?, pair.next()?))
                    })
                    .collect())
            }
            Self::Array(items) => {
                if items.len() % 2 != 0 {
                    return Err(HarnessError::Type(format!(
                        "expected even-length array of pairs, got {} elements",
                        items.len()
                    )));
                }
                let mut pairs = Vec::with_capacity(items.len() / 2);
                let mut iter = items.into_iter();
                while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
                    pairs.push((k, v));
                }
                Ok(pairs)
            }
            other => Err(type_error("map", &other)),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Status(_) => "status",
            Self::Int(_) => "integer",
            Self::Bulk(_) => "bulk_string",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
            Self::Set(_) => "set",
            Self::Double(_) => "double",
            Self::Boolean(_) => "boolean",
            Self::Other(_) => "other",
        }
    }
}

fn type_error(expected: &str, got: &Reply) -> HarnessError {
    HarnessError::Type(format!("expected {expected}, got {}", got.type_name()))
}

impl From<redis::Value> for Reply {
    fn from(value: redis::Value) -> Self {
        use redis::Value;
        match value {
            Value::Nil => Self::Nil,
            Value::Okay => Self::ok(),
            Value::SimpleString(s) => Self::Status(s),
            Value::Int(i) => Self::Int(i),
            Value::BulkString(b) => Self::Bulk(Bytes::from(b)),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Set(items) => Self::Set(items.into_iter().map(Self::from).collect()),
            Value::Map(pairs) => Self::Map(
                pairs
                    .into_iter()
                    .map(|(k, v)| (Self::from(k), Self::from(v)))
                    .collect(),
            ),
            Value::Double(d) => Self::Double(d),
            Value::Boolean(b) => Self::Boolean(b),
            Value::VerbatimString { text, .. } => Self::Bulk(Bytes::from(text)),
            Value::Attribute { data, .. } => Self::from(*data),
            other => Self::Other(format!("{other:?}")),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
