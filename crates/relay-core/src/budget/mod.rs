//! Token budget support shared by the context manager and the response
//! controller.
//!
//! - [`counter`]: Token counting via heuristic estimation
//! - [`limits`]: Model context window limits registry

pub mod counter;
pub mod limits;

pub use counter::{HeuristicTokenCounter, SharedTokenCounter, TokenCounter};
pub use limits::{ModelLimit, ModelLimitsRegistry, DEFAULT_CONTEXT_WINDOW};
