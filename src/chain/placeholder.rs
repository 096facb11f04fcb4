use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Placeholders declared on an action, keyed by the token name used in `[[NAME]]`.
pub type Placeholders = HashMap<String, Placeholder>;

/// A declared path into the activation results.
///
/// `name` is the result id the walk starts from; every entry of `path` is one
/// hop, either an object field or an array index.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    #[serde(default)]
    pub path: Vec<String>,
}

/// Wire shape accepting both the flat form and the legacy linked form
/// `{"name": "root", "next": {"name": "items", "next": {...}}}`.
#[derive(Deserialize)]
struct RawPlaceholder {
    name: String,
    #[serde(default)]
    path: Vec<String>,
    #[serde(default)]
    next: Option<Box<RawPlaceholder>>,
}

impl<'de> Deserialize<'de> for Placeholder {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawPlaceholder::deserialize(deserializer)?;
        let mut path = raw.path;
        let mut next = raw.next;
        while let Some(hop) = next {
            if hop.name.is_empty() {
                break;
            }
            path.push(hop.name);
            next = hop.next;
        }

        Ok(Placeholder {
            name: raw.name,
            path,
        })
    }
}

impl Placeholder {
    pub fn new(
        name: &str,
        path: &[&str],
    ) -> Self {
        Self {
            name: name.to_string(),
            path: path.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Walks the path starting at `root`; `None` when any hop does not resolve.
    pub fn lookup<'a>(
        &self,
        root: &'a Value,
    ) -> Option<&'a Value> {
        let mut current = root;
        for hop in &self.path {
            current = match current {
                Value::Object(map) => map.get(hop)?,
                Value::Array(items) => items.get(hop.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}
