//! Conversation context for the relay pipeline.
//!
//! - [`chain`]: rebuilds the reply chain behind an incoming message
//! - [`context`]: fits that chain into a model's token budget

pub mod chain;
pub mod context;
pub mod error;

pub use chain::{
    AttachmentContent, AttachmentFetcher, ChainBuilder, ChainFlags, ChainResult, ContentProcessor,
    DefaultContentProcessor, FanOut, FanOutResult, ParentLookup, ParentResolver, ProcessOptions,
    UrlAttachmentFetcher,
};
pub use context::{
    identify_pairs, truncate_to_fit, ContextConfig, ContextManager, ConversationPair,
    LlmSummarizer, ManagedContext, RetryPolicy, SummaryResult, Summarizer,
};
pub use error::{ChainError, ContextError};
