//! Realtime backend contract
//!
//! The heart-rate data lives in an external realtime key-value store. This
//! module defines the narrow contract the rest of the crate relies on:
//!
//! - **subscribe**: a listener receives the full subtree at a path right away
//!   and again on every change below (or above) that path
//! - **get**: one-shot read of a subtree
//! - **write** / **delete**: asynchronous mutations, each resolving on its own
//!
//! `InMemoryBackend` is a complete implementation of the contract for tests,
//! demos and offline use.

pub mod memory;
pub mod path;
pub mod snapshot;

pub use memory::InMemoryBackend;
pub use path::DbPath;
pub use snapshot::Snapshot;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Error types for backend operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

/// Identifier handed out by `RealtimeBackend::subscribe`
pub type ListenerId = Uuid;

/// Callback invoked with every snapshot of a subscribed path.
///
/// An `Err` is terminal: the backend drops the listener after delivering it.
pub type SnapshotListener = Box<dyn Fn(Result<Snapshot, BackendError>) + Send + Sync>;

/// The realtime key-value store the monitor reads from and deletes in.
#[async_trait]
pub trait RealtimeBackend: Send + Sync {
    /// Attach a listener to `path`. The current snapshot is delivered
    /// before this returns.
    fn subscribe(&self, path: &DbPath, listener: SnapshotListener) -> ListenerId;

    /// Detach a listener. Unknown ids are ignored.
    fn unsubscribe(&self, id: ListenerId);

    /// Read the subtree at `path` once.
    async fn get(&self, path: &DbPath) -> Result<Snapshot, BackendError>;

    /// Replace the subtree at `path`. Writing `null` removes it.
    async fn write(&self, path: &DbPath, value: serde_json::Value) -> Result<(), BackendError>;

    /// Remove the subtree at `path`. Removing a missing path succeeds.
    async fn delete(&self, path: &DbPath) -> Result<(), BackendError>;
}
