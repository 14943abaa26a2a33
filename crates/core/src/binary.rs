// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical hex encoding for identifiers, hashes, keys and signatures.
//!
//! Token payloads arrive from several producers that disagree on how binary
//! values are written:
//!
//! - hex strings, with or without a `0x` prefix, in any case
//! - plain byte arrays: `[171, 205]`
//! - buffer objects: `{"type": "Buffer", "data": [171, 205]}`
//! - typed-array objects: `{"0": 171, "1": 205}`
//!
//! Content addressing needs byte-identical output for identical logical
//! content, so every binary value is rewritten to lowercase hex before it is
//! hashed, validated or stored. [`Hex`] accepts all of the forms above when
//! deserializing and always serializes as the lowercase string.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Field names whose values are binary and must be canonicalized even when
/// they sit inside otherwise opaque JSON.
pub const BINARY_FIELDS: &[&str] = &[
    "tokenId",
    "tokenType",
    "salt",
    "publicKey",
    "signature",
    "stateHash",
    "transactionHash",
    "previousStateHash",
    "newStateHash",
    "recipientDataHash",
    "requestId",
    "unicityCertificate",
    "predicate",
    "nonce",
];

/// A canonical lowercase hex string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hex(String);

impl Hex {
    /// Parses a hex string, accepting an optional `0x` prefix and any case.
    pub fn parse(s: &str) -> Result<Self> {
        let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        if digits.len() % 2 != 0 {
            return Err(Error::InvalidHex(format!("odd length {} in '{s}'", digits.len())));
        }
        if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(Error::InvalidHex(format!("unexpected character '{bad}' in '{s}'")));
        }
        Ok(Hex(digits.to_ascii_lowercase()))
    }

    /// Encodes raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Hex(hex::encode(bytes))
    }

    /// Decodes any of the accepted wire representations.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Hex::parse(s),
            Value::Array(items) => bytes_from_array(items).map(|b| Hex::from_bytes(&b)),
            Value::Object(map) => bytes_from_object(map).map(|b| Hex::from_bytes(&b)),
            other => Err(Error::InvalidHex(format!("expected binary value, got {other}"))),
        }
    }

    /// Returns the canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the decoded bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        // Construction guarantees valid hex.
        hex::decode(&self.0).unwrap_or_default()
    }

    /// Returns true for the zero-length value.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn bytes_from_array(items: &[Value]) -> Result<Vec<u8>> {
    items
        .iter()
        .map(|item| {
            item.as_u64()
                .and_then(|n| u8::try_from(n).ok())
                .ok_or_else(|| Error::InvalidHex(format!("byte out of range: {item}")))
        })
        .collect()
}

fn bytes_from_object(map: &Map<String, Value>) -> Result<Vec<u8>> {
    if let Some(Value::Array(data)) = map.get("data") {
        // Buffer object; the "type" tag is optional in some producers
        return bytes_from_array(data);
    }

    // Typed-array object: keys must be exactly 0..n
    let mut indexed = Vec::with_capacity(map.len());
    for (key, value) in map {
        let index: usize = key
            .parse()
            .map_err(|_| Error::InvalidHex(format!("unexpected key '{key}' in byte object")))?;
        indexed.push((index, value.clone()));
    }
    indexed.sort_by_key(|(index, _)| *index);
    if indexed.iter().enumerate().any(|(pos, (index, _))| pos != *index) {
        return Err(Error::InvalidHex("byte object has gaps in its indices".into()));
    }
    let values: Vec<Value> = indexed.into_iter().map(|(_, v)| v).collect();
    bytes_from_array(&values)
}

fn looks_like_buffer(map: &Map<String, Value>) -> bool {
    map.get("type").and_then(Value::as_str) == Some("Buffer")
        && matches!(map.get("data"), Some(Value::Array(_)))
}

/// Rewrites binary values inside an arbitrary JSON tree to canonical hex.
///
/// Buffer objects are converted wherever they appear; other encodings are
/// only converted under a key listed in [`BINARY_FIELDS`]. Values that fail
/// to convert are left untouched for the typed decode to report.
///
/// Returns the number of values rewritten.
pub fn normalize_value(value: &mut Value) -> usize {
    match value {
        Value::Object(map) => {
            if looks_like_buffer(map) {
                if let Ok(bytes) = bytes_from_object(map) {
                    *value = Value::String(hex::encode(bytes));
                    return 1;
                }
            }
            let mut rewritten = 0;
            for (key, child) in map.iter_mut() {
                if BINARY_FIELDS.contains(&key.as_str()) && !child.is_null() {
                    if let Ok(hex) = Hex::from_value(child) {
                        let canonical = Value::String(hex.0);
                        if *child != canonical {
                            *child = canonical;
                            rewritten += 1;
                        }
                        continue;
                    }
                }
                rewritten += normalize_value(child);
            }
            rewritten
        }
        Value::Array(items) => items.iter_mut().map(normalize_value).sum(),
        _ => 0,
    }
}

impl fmt::Display for Hex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Hex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Hex::parse(s)
    }
}

impl AsRef<str> for Hex {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for Hex {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Hex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Hex::from_value(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "binary_tests.rs"]
mod tests;
