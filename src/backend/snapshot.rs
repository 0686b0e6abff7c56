//! Immutable views of a subtree, as delivered to listeners

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{BackendError, DbPath};

/// The full content of the store below `path` at one moment.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    path: DbPath,
    value: Option<Value>,
}

impl Snapshot {
    pub fn new(path: DbPath, value: Option<Value>) -> Self {
        // Null and empty objects do not exist in the store
        let value = value.filter(|v| !is_empty_node(v));
        Self { path, value }
    }

    pub fn path(&self) -> &DbPath {
        &self.path
    }

    /// Key of this snapshot (last path segment)
    pub fn key(&self) -> Option<&str> {
        self.path.key()
    }

    pub fn exists(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Snapshot of a direct child. Missing children yield an empty snapshot.
    pub fn child(&self, key: &str) -> Snapshot {
        let value = self
            .value
            .as_ref()
            .and_then(|v| v.as_object())
            .and_then(|map| map.get(key))
            .cloned();
        let path = self.path.child(key).unwrap_or_else(|_| self.path.clone());
        Snapshot::new(path, value)
    }

    /// Direct children in key order
    pub fn children(&self) -> Vec<Snapshot> {
        let Some(map) = self.value.as_ref().and_then(|v| v.as_object()) else {
            return Vec::new();
        };
        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort();
        keys.into_iter()
            .filter_map(|key| {
                let path = self.path.child(key).ok()?;
                Some(Snapshot::new(path, map.get(key).cloned()))
            })
            .collect()
    }

    /// Deserialize the value. `Ok(None)` when the node does not exist.
    pub fn get<T: DeserializeOwned>(&self) -> Result<Option<T>, BackendError> {
        match &self.value {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| BackendError::SerializationError(format!("{}: {}", self.path, e))),
            None => Ok(None),
        }
    }
}

pub(crate) fn is_empty_node(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
