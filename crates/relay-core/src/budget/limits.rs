//! Model context window limits registry.
//!
//! Known context window sizes for common models, overridable from the
//! `[models.limits]` config table.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Known model context window sizes.
pub const KNOWN_MODEL_LIMITS: &[(&str, u32)] = &[
    // OpenAI models
    ("gpt-4o", 128_000),
    ("gpt-4o-mini", 128_000),
    ("gpt-4-turbo", 128_000),
    ("gpt-4.1", 1_047_576),
    ("gpt-4", 8_192),
    ("gpt-3.5-turbo", 16_385),
    ("o3", 200_000),
    ("o4-mini", 200_000),
    // Anthropic models
    ("claude-3-5-sonnet", 200_000),
    ("claude-3-7-sonnet", 200_000),
    ("claude-3-opus", 200_000),
    ("claude-3-haiku", 200_000),
    ("claude-sonnet-4", 200_000),
    ("claude-opus-4", 200_000),
    // Google models
    ("gemini-1.5-pro", 2_097_152),
    ("gemini-1.5-flash", 1_048_576),
    ("gemini-2.0-flash", 1_048_576),
    ("gemini-2.5-pro", 1_048_576),
    ("gemini-2.5-flash", 1_048_576),
    // Open-weight models commonly served locally
    ("llama-3", 8_192),
    ("llama3.1", 131_072),
    ("llama-3.1", 131_072),
    ("mistral", 32_768),
    ("qwen2.5", 32_768),
];

/// Context window used when no pattern matches.
pub const DEFAULT_CONTEXT_WINDOW: u32 = 128_000;

/// Model limit configuration (user-overridable).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelLimit {
    /// Model identifier; partial match supported ("gpt-4o" matches "openai/gpt-4o-mini").
    pub model_pattern: String,
    /// Maximum context window size in tokens
    pub max_context_tokens: u32,
}

impl ModelLimit {
    pub fn new(model_pattern: impl Into<String>, max_context_tokens: u32) -> Self {
        Self {
            model_pattern: model_pattern.into(),
            max_context_tokens,
        }
    }
}

/// Registry for model limits with built-in defaults and user overrides.
#[derive(Debug, Clone, Default)]
pub struct ModelLimitsRegistry {
    /// User-provided overrides (higher priority than built-in)
    user_limits: HashMap<String, ModelLimit>,
}

impl ModelLimitsRegistry {
    /// Create a new registry with built-in defaults only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with `pattern -> tokens` overrides.
    pub fn with_overrides<'a>(overrides: impl IntoIterator<Item = (&'a String, &'a u32)>) -> Self {
        let mut registry = Self::new();
        for (pattern, tokens) in overrides {
            registry.add_limit(ModelLimit::new(pattern.clone(), *tokens));
        }
        registry
    }

    /// Add a user limit override.
    pub fn add_limit(&mut self, limit: ModelLimit) {
        self.user_limits.insert(limit.model_pattern.clone(), limit);
    }

    /// Get limit for a model, with user overrides taking priority.
    ///
    /// # Matching Strategy
    /// 1. Exact match (user, then built-in)
    /// 2. Model contains pattern; the longest (most specific) pattern wins
    pub fn get(&self, model: &str) -> Option<ModelLimit> {
        if let Some(limit) = self.user_limits.get(model) {
            return Some(limit.clone());
        }

        if let Some((pattern, tokens)) = KNOWN_MODEL_LIMITS.iter().find(|(p, _)| *p == model) {
            return Some(ModelLimit::new(*pattern, *tokens));
        }

        let best_user_match = self
            .user_limits
            .iter()
            .filter(|(pattern, _)| model.contains(pattern.as_str()))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(_, limit)| limit.clone());

        if best_user_match.is_some() {
            return best_user_match;
        }

        KNOWN_MODEL_LIMITS
            .iter()
            .filter(|(pattern, _)| model.contains(*pattern))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(pattern, tokens)| ModelLimit::new(*pattern, *tokens))
    }

    /// Context window for a model with fallback to [`DEFAULT_CONTEXT_WINDOW`].
    pub fn context_window(&self, model: &str) -> u32 {
        self.get(model)
            .map(|limit| limit.max_context_tokens)
            .unwrap_or(DEFAULT_CONTEXT_WINDOW)
    }

    /// List all user-defined limits.
    pub fn list_user_limits(&self) -> Vec<&ModelLimit> {
        self.user_limits.values().collect()
    }
}
