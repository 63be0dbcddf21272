pub mod budget;
pub mod config;
pub mod error;
pub mod logging;
pub mod message;
pub mod node;
pub mod platform;
pub mod storage;

pub use budget::{
    HeuristicTokenCounter, ModelLimit, ModelLimitsRegistry, SharedTokenCounter, TokenCounter,
};
pub use config::{
    CacheSettings, ChainSettings, ConfigHandle, ContextSettings, LoggingConfig, ModelSettings,
    RelayConfig, RetrySettings, StreamSettings, WorkerSettings,
};
pub use error::{ConfigError, PlatformError, StorageError};
pub use logging::init_logging;
pub use message::{
    AudioRef, ChatMessage, ContentPart, DocumentRef, GeneratedImage, GroundingMetadata, ImageRef,
    Role,
};
pub use node::store::{NodeHandle, NodeStore};
pub use node::{ChannelId, MessageId, MsgNode, NodeIssue, NodeRef, RenderOptions, RenderedNode, UserId};
pub use platform::{
    Attachment, Author, ChatPlatform, MessageKind, OutgoingMessage, PlatformMessage,
    ResponseAction, ThreadInfo,
};
pub use storage::{resolve_node, FileNodeStorage, MemoryNodeStorage, NodeStorage, SharedNodeStorage};
