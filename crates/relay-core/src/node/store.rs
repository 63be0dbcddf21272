//! Bounded in-memory node cache.
//!
//! Lock ordering: the cache lock is always released before a node lock is
//! taken. Handles are cloned out under the cache lock and locked afterwards.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::RwLock;
use tokio::sync::Mutex;

use super::{MessageId, MsgNode};

/// Shared handle to one node. All field mutation happens under this lock.
pub type NodeHandle = Arc<Mutex<MsgNode>>;

/// Memory tier of the node store. Durability is the caller's concern, see
/// [`crate::storage::NodeStorage`].
pub struct NodeStore {
    nodes: RwLock<LruCache<MessageId, NodeHandle>>,
}

impl NodeStore {
    pub const DEFAULT_CAPACITY: usize = 500;

    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            nodes: RwLock::new(LruCache::new(capacity)),
        }
    }

    /// Return the cached node or cache a fresh empty one.
    pub fn get_or_create(&self, id: &str) -> NodeHandle {
        self.get_or_insert_with(id, MsgNode::default)
    }

    /// Return the cached node, or cache `node` if none is present. Used to
    /// promote durable hits without clobbering a concurrent insert.
    pub fn get_or_insert(&self, id: &str, node: MsgNode) -> NodeHandle {
        self.get_or_insert_with(id, || node)
    }

    fn get_or_insert_with(&self, id: &str, make: impl FnOnce() -> MsgNode) -> NodeHandle {
        let mut nodes = self.nodes.write();
        if let Some(handle) = nodes.get(id) {
            return handle.clone();
        }

        let handle: NodeHandle = Arc::new(Mutex::new(make()));
        if let Some((evicted, _)) = nodes.push(id.to_string(), handle.clone()) {
            tracing::trace!(evicted = %evicted, "NodeStore: evicted least recently used node");
        }
        handle
    }

    /// Memory-only lookup. Marks the entry as recently used.
    pub fn get(&self, id: &str) -> Option<NodeHandle> {
        self.nodes.write().get(id).cloned()
    }

    /// Upsert a node, evicting the least recently used entry when full.
    /// Handles previously returned for `id` keep pointing at the old value.
    pub fn set(&self, id: &str, node: MsgNode) -> NodeHandle {
        let handle: NodeHandle = Arc::new(Mutex::new(node));
        let mut nodes = self.nodes.write();
        if let Some((evicted, _)) = nodes.push(id.to_string(), handle.clone()) {
            if evicted != id {
                tracing::trace!(evicted = %evicted, "NodeStore: evicted least recently used node");
            }
        }
        handle
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.read().contains(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.nodes.read().cap().get()
    }
}

impl Default for NodeStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for NodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let nodes = self.nodes.read();
        f.debug_struct("NodeStore")
            .field("len", &nodes.len())
            .field("capacity", &nodes.cap())
            .finish()
    }
}
