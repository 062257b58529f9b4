//! Query fingerprints.
//!
//! # Invariants
//! - Equal `(descriptor, params)` pairs always produce equal fingerprints.
//! - The hash input is the canonical JSON array `[descriptor, params]`, so
//!   the value is stable across processes and releases.
//! - Object keys are sorted before hashing, whether or not serde_json's
//!   `preserve_order` feature is enabled somewhere in the build.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

/// 64-bit content hash of one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Computes the fingerprint of `descriptor` executed with `params`.
    pub fn of(descriptor: &str, params: &[Value]) -> Self {
        let canonical = Value::Array(vec![
            Value::String(descriptor.to_string()),
            Value::Array(params.iter().map(canonicalize).collect()),
        ]);
        let hash = blake3::hash(canonical.to_string().as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&hash.as_bytes()[..8]);
        Self(u64::from_be_bytes(prefix))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Parses the 16-digit hex form produced by `Display`.
    pub fn parse(value: &str) -> Option<Self> {
        if value.len() != 16 {
            return None;
        }
        u64::from_str_radix(value, 16).ok().map(Self)
    }
}

/// Rebuilds `value` with every object's keys inserted in sorted order.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(object) => {
            let mut keys: Vec<&String> = object.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(object.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&object[key.as_str()]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid fingerprint `{raw}`")))
    }
}
