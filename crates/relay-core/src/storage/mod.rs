//! Durable tier for nodes.
//!
//! The [`NodeStore`] never touches this tier by itself: callers decide when
//! a node is complete enough to persist.

mod file;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::node::store::{NodeHandle, NodeStore};
use crate::node::MsgNode;

pub use file::FileNodeStorage;
pub use memory::MemoryNodeStorage;

#[async_trait]
pub trait NodeStorage: Send + Sync {
    async fn load_node(&self, id: &str) -> Result<Option<MsgNode>, StorageError>;
    async fn save_node(&self, id: &str, node: &MsgNode) -> Result<(), StorageError>;
}

pub type SharedNodeStorage = Arc<dyn NodeStorage>;

/// Resolve a node: memory, then durable storage, then a fresh empty node.
///
/// A storage failure is treated as a miss so traversal can continue.
pub async fn resolve_node(store: &NodeStore, storage: &dyn NodeStorage, id: &str) -> NodeHandle {
    if let Some(handle) = store.get(id) {
        return handle;
    }

    match storage.load_node(id).await {
        Ok(Some(node)) => {
            tracing::debug!(node_id = %id, "NodeStore: cache miss served from durable storage");
            store.get_or_insert(id, node)
        }
        Ok(None) => store.get_or_create(id),
        Err(error) => {
            tracing::warn!(node_id = %id, error = %error, "NodeStore: durable lookup failed, starting empty");
            store.get_or_create(id)
        }
    }
}
