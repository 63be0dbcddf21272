use async_trait::async_trait;
use dashmap::DashMap;

use super::NodeStorage;
use crate::error::StorageError;
use crate::node::MsgNode;

/// Process-local durable tier, for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryNodeStorage {
    nodes: DashMap<String, MsgNode>,
}

impl MemoryNodeStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[async_trait]
impl NodeStorage for MemoryNodeStorage {
    async fn load_node(&self, id: &str) -> Result<Option<MsgNode>, StorageError> {
        Ok(self.nodes.get(id).map(|entry| entry.value().clone()))
    }

    async fn save_node(&self, id: &str, node: &MsgNode) -> Result<(), StorageError> {
        self.nodes.insert(id.to_string(), node.clone());
        Ok(())
    }
}
