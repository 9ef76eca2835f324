// SPDX-License-Identifier: Apache-2.0

//! Deterministic hashing used to derive cache keys from explicit inputs.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Serializes `value` to JSON with object keys sorted recursively.
pub fn stable_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let raw = serde_json::to_value(value)?;
    serde_json::to_vec(&normalize_json_value(raw))
}

pub fn stable_json_hash_hex<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let bytes = stable_json_bytes(value)?;
    Ok(sha256_hex(&bytes))
}

/// Short form of [`stable_json_hash_hex`] for log lines and cache key suffixes.
pub fn short_hash<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let mut full = stable_json_hash_hex(value)?;
    full.truncate(16);
    Ok(full)
}

fn normalize_json_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map
                .into_iter()
                .map(|(k, v)| (k, normalize_json_value(v)))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k, v);
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_json_value).collect()),
        other => other,
    }
}
