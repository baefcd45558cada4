//! Typed request arguments.
//!
//! Values are limited to a closed set of kinds. `RequestArgs` is built by
//! value; combining two argument sets produces a new one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::address::KeyAddress;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ArgValue {
    Int64(i64),
    String(String),
    #[serde(with = "hex::serde")]
    Bytes(Vec<u8>),
    Address(KeyAddress),
    #[serde(with = "hex::serde")]
    Hash([u8; 32]),
}

impl From<i64> for ArgValue {
    fn from(v: i64) -> Self {
        ArgValue::Int64(v)
    }
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        ArgValue::String(v.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self {
        ArgValue::String(v)
    }
}

impl From<KeyAddress> for ArgValue {
    fn from(v: KeyAddress) -> Self {
        ArgValue::Address(v)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestArgs(BTreeMap<String, ArgValue>);

impl RequestArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn with_int(self, key: impl Into<String>, value: i64) -> Self {
        self.with(key, ArgValue::Int64(value))
    }

    pub fn with_string(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(key, ArgValue::String(value.into()))
    }

    pub fn with_bytes(self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.with(key, ArgValue::Bytes(value.into()))
    }

    pub fn with_address(self, key: impl Into<String>, value: KeyAddress) -> Self {
        self.with(key, ArgValue::Address(value))
    }

    pub fn with_hash(self, key: impl Into<String>, value: [u8; 32]) -> Self {
        self.with(key, ArgValue::Hash(value))
    }

    /// Keys present in both take the value from `other`.
    pub fn merge(mut self, other: RequestArgs) -> Self {
        self.0.extend(other.0);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}
