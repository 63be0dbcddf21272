use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use uuid::Uuid;

use super::NodeStorage;
use crate::error::StorageError;
use crate::node::MsgNode;

/// One JSON document per node under `base_path`.
#[derive(Debug, Clone)]
pub struct FileNodeStorage {
    base_path: PathBuf,
}

impl FileNodeStorage {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Default location: `~/.relay/nodes`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(".relay")
            .join("nodes")
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn node_path(&self, id: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", sanitize_id(id)))
    }
}

/// Ids are platform snowflakes; anything else is flattened so it cannot
/// escape the base directory.
fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[async_trait]
impl NodeStorage for FileNodeStorage {
    async fn load_node(&self, id: &str) -> Result<Option<MsgNode>, StorageError> {
        let path = self.node_path(id);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        let node = serde_json::from_str(&content)?;
        Ok(Some(node))
    }

    async fn save_node(&self, id: &str, node: &MsgNode) -> Result<(), StorageError> {
        let path = self.node_path(id);
        // Unique per write so concurrent saves of one node never share a temp file.
        let tmp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        let json = serde_json::to_vec(node)?;

        fs::create_dir_all(&self.base_path).await?;
        fs::write(&tmp_path, json).await?;
        fs::rename(&tmp_path, &path).await?;
        Ok(())
    }
}
