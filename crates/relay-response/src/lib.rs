//! Response delivery for the relay pipeline.
//!
//! - [`controller`]: streams a model answer onto the platform with one
//!   fallback attempt and a watchdog
//! - [`renderer`]: message splitting and throttled edits
//! - [`worker`]: bounded worker pool that drops work when saturated
//! - [`pipeline`]: chain, context and response for one inbound message

pub mod config;
pub mod controller;
pub mod error;
pub mod pipeline;
pub mod renderer;
pub mod split;
pub mod state;
pub mod worker;

pub use config::StreamConfig;
pub use controller::{ResponseController, ResponseOutcome, ResponseRequest};
pub use error::{ResponseError, SubmitError};
pub use pipeline::{ConversationPipeline, PLACEHOLDER_TEXT};
pub use renderer::MessageRenderer;
pub use split::split_at_char_limit;
pub use state::ResponseState;
pub use worker::{JobHandler, WorkerPool};
