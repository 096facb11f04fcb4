//! Named JSON values: the storage shape of an activation's results.

use serde_json::{Map, Value};

/// An ordered map from result id to a semi-structured value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vars {
    inner: Map<String, Value>,
}

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with<V: Into<Value>>(
        mut self,
        key: &str,
        value: V,
    ) -> Self {
        self.set(key, value);
        self
    }

    pub fn set<V: Into<Value>>(
        &mut self,
        key: &str,
        value: V,
    ) {
        self.inner.insert(key.to_string(), value.into());
    }

    pub fn value(
        &self,
        key: &str,
    ) -> Option<&Value> {
        self.inner.get(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.inner.iter()
    }
}
