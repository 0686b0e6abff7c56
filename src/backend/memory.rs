//! In-memory realtime backend
//!
//! Holds the whole store as one JSON tree and pushes snapshots to listeners
//! on every change that overlaps their path. Listeners are invoked on the
//! writing task, outside of the tree and listener locks, so a listener may
//! detach itself while being called. Deliveries are serialized: every
//! listener sees changes in the order they were applied, whichever thread
//! wrote them. A listener must not write or subscribe from inside its
//! callback.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::snapshot::is_empty_node;
use super::path::validate_segment;
use super::{BackendError, DbPath, ListenerId, RealtimeBackend, Snapshot, SnapshotListener};

type SharedListener = Arc<dyn Fn(Result<Snapshot, BackendError>) + Send + Sync>;

struct Listener {
    path: DbPath,
    callback: SharedListener,
}

/// A realtime backend kept entirely in memory
pub struct InMemoryBackend {
    tree: Arc<Mutex<Value>>,
    listeners: Arc<Mutex<HashMap<ListenerId, Listener>>>,
    online: AtomicBool,
    denied: Mutex<Vec<DbPath>>,
    /// Held from snapshot capture until the last listener returns
    delivery: Mutex<()>,
}

impl InMemoryBackend {
    /// Create an empty, online backend
    pub fn new() -> Self {
        Self::with_tree(Value::Object(Map::new()))
    }

    fn with_tree(tree: Value) -> Self {
        Self {
            tree: Arc::new(Mutex::new(tree)),
            listeners: Arc::new(Mutex::new(HashMap::new())),
            online: AtomicBool::new(true),
            denied: Mutex::new(Vec::new()),
            delivery: Mutex::new(()),
        }
    }

    fn delivery_guard(&self) -> MutexGuard<'_, ()> {
        // Guards no data, so a poisoned lock is still usable
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of attached listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Simulate losing or regaining connectivity.
    ///
    /// Going offline cancels every listener with `Unavailable`.
    pub fn set_online(&self, online: bool) {
        let _delivering = self.delivery_guard();
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if was_online && !online {
            log::warn!("In-memory backend going offline, cancelling listeners");
            let cancelled: Vec<Listener> = match self.listeners.lock() {
                Ok(mut listeners) => listeners.drain().map(|(_, l)| l).collect(),
                Err(_) => Vec::new(),
            };
            for listener in cancelled {
                (listener.callback)(Err(BackendError::Unavailable(
                    "connection lost".to_string(),
                )));
            }
        }
    }

    /// Deny reads and writes at or below `prefix`.
    pub fn deny(&self, prefix: DbPath) {
        if let Ok(mut denied) = self.denied.lock() {
            denied.push(prefix);
        }
    }

    fn check_access(&self, path: &DbPath) -> Result<(), BackendError> {
        if !self.is_online() {
            return Err(BackendError::Unavailable(format!("cannot reach backend for {}", path)));
        }
        let denied = self
            .denied
            .lock()
            .map_err(|_| BackendError::StorageError("Failed to acquire lock".into()))?;
        if denied.iter().any(|prefix| prefix.is_ancestor_of(path)) {
            return Err(BackendError::PermissionDenied(path.to_string()));
        }
        Ok(())
    }

    fn read(&self, path: &DbPath) -> Result<Snapshot, BackendError> {
        let tree = self
            .tree
            .lock()
            .map_err(|_| BackendError::StorageError("Failed to acquire lock".into()))?;
        Ok(Snapshot::new(path.clone(), node_at(&tree, path.segments()).cloned()))
    }

    /// Register a listener and take its first snapshot under the tree lock,
    /// so no change can slip in between the two.
    fn attach(
        &self,
        id: ListenerId,
        path: &DbPath,
        callback: &SharedListener,
    ) -> Result<Snapshot, BackendError> {
        let tree = self
            .tree
            .lock()
            .map_err(|_| BackendError::StorageError("Failed to acquire lock".into()))?;
        let mut listeners = self
            .listeners
            .lock()
            .map_err(|_| BackendError::StorageError("Failed to acquire lock".into()))?;
        listeners.insert(
            id,
            Listener {
                path: path.clone(),
                callback: callback.clone(),
            },
        );
        Ok(Snapshot::new(path.clone(), node_at(&tree, path.segments()).cloned()))
    }

    /// Apply a change to the tree and notify every overlapping listener.
    fn apply(&self, path: &DbPath, value: Option<Value>) -> Result<(), BackendError> {
        self.check_access(path)?;

        let _delivering = self.delivery_guard();
        let deliveries: Vec<(SharedListener, Snapshot)> = {
            let mut tree = self
                .tree
                .lock()
                .map_err(|_| BackendError::StorageError("Failed to acquire lock".into()))?;
            match value {
                Some(value) => set_node(&mut tree, path.segments(), value),
                None => remove_node(&mut tree, path.segments()),
            }

            let listeners = self
                .listeners
                .lock()
                .map_err(|_| BackendError::StorageError("Failed to acquire lock".into()))?;
            listeners
                .values()
                .filter(|l| l.path.overlaps(path))
                .map(|l| {
                    let snapshot =
                        Snapshot::new(l.path.clone(), node_at(&tree, l.path.segments()).cloned());
                    (l.callback.clone(), snapshot)
                })
                .collect()
        };

        log::debug!("Change at {} delivered to {} listener(s)", path, deliveries.len());
        for (callback, snapshot) in deliveries {
            callback(Ok(snapshot));
        }
        Ok(())
    }

    /// Persist the whole tree as JSON
    pub async fn save_to_file(&self, file: impl AsRef<Path>) -> Result<(), BackendError> {
        let json = {
            let tree = self
                .tree
                .lock()
                .map_err(|_| BackendError::StorageError("Failed to acquire lock".into()))?;
            serde_json::to_vec_pretty(&*tree)
                .map_err(|e| BackendError::SerializationError(e.to_string()))?
        };
        tokio::fs::write(file.as_ref(), json)
            .await
            .map_err(|e| BackendError::StorageError(e.to_string()))
    }

    /// Create a backend from a tree saved with `save_to_file`
    pub async fn load_from_file(file: impl AsRef<Path>) -> Result<Self, BackendError> {
        let bytes = tokio::fs::read(file.as_ref())
            .await
            .map_err(|e| BackendError::StorageError(e.to_string()))?;
        let tree: Value = serde_json::from_slice(&bytes)
            .map_err(|e| BackendError::SerializationError(e.to_string()))?;
        if !tree.is_object() {
            return Err(BackendError::SerializationError(
                "stored tree is not a JSON object".to_string(),
            ));
        }
        let tree = normalize(tree)?.unwrap_or_else(|| Value::Object(Map::new()));
        Ok(Self::with_tree(tree))
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RealtimeBackend for InMemoryBackend {
    fn subscribe(&self, path: &DbPath, listener: SnapshotListener) -> ListenerId {
        let id = Uuid::new_v4();
        let callback: SharedListener = Arc::from(listener);

        let _delivering = self.delivery_guard();
        let initial = self.check_access(path).and_then(|_| self.attach(id, path, &callback));
        match initial {
            Ok(snapshot) => callback(Ok(snapshot)),
            Err(e) => {
                log::warn!("Subscription to {} rejected: {}", path, e);
                callback(Err(e));
            }
        }
        id
    }

    fn unsubscribe(&self, id: ListenerId) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.remove(&id);
        }
    }

    async fn get(&self, path: &DbPath) -> Result<Snapshot, BackendError> {
        self.check_access(path)?;
        self.read(path)
    }

    async fn write(&self, path: &DbPath, value: Value) -> Result<(), BackendError> {
        let value = normalize(value)?;
        self.apply(path, value)
    }

    async fn delete(&self, path: &DbPath) -> Result<(), BackendError> {
        self.apply(path, None)
    }
}

fn node_at<'a>(tree: &'a Value, segments: &[String]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(tree, |node, segment| node.as_object()?.get(segment))
}

/// Strip nulls and empty objects, recursively. Every object key must be a
/// valid path segment.
fn normalize(value: Value) -> Result<Option<Value>, BackendError> {
    match value {
        Value::Object(map) => {
            let mut cleaned = Map::new();
            for (key, child) in map {
                validate_segment(&key)?;
                if let Some(child) = normalize(child)? {
                    cleaned.insert(key, child);
                }
            }
            if cleaned.is_empty() {
                Ok(None)
            } else {
                Ok(Some(Value::Object(cleaned)))
            }
        }
        Value::Null => Ok(None),
        other => Ok(Some(other)),
    }
}

fn set_node(tree: &mut Value, segments: &[String], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        *tree = value;
        return;
    };
    let mut node = tree;
    for segment in parents {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Some(map) = node.as_object_mut() else { return };
        node = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Some(map) = node.as_object_mut() {
        map.insert(last.clone(), value);
    }
}

fn remove_node(tree: &mut Value, segments: &[String]) {
    let Some((first, rest)) = segments.split_first() else {
        *tree = Value::Object(Map::new());
        return;
    };
    let Some(map) = tree.as_object_mut() else { return };
    if rest.is_empty() {
        map.remove(first);
        return;
    }
    if let Some(child) = map.get_mut(first) {
        remove_node(child, rest);
        if is_empty_node(child) {
            map.remove(first);
        }
    }
}
