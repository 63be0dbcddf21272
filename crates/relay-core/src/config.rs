//! Runtime configuration.
//!
//! Loaded from TOML, then overridden by `RELAY_*` environment variables.
//! Readers never hold a reference into a live config: they take an
//! immutable snapshot from [`ConfigHandle`] once per operation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    pub chain: ChainSettings,
    pub context: ContextSettings,
    pub stream: StreamSettings,
    pub models: ModelSettings,
    pub cache: CacheSettings,
    pub workers: WorkerSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChainSettings {
    pub max_messages: usize,
    pub max_images: usize,
    /// Characters per message, 0 for unlimited.
    pub max_text: usize,
    pub accept_images: bool,
    pub accept_usernames: bool,
    /// Deadline for lightweight lookups such as parent resolution.
    pub lookup_timeout_ms: u64,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            max_messages: 25,
            max_images: 5,
            max_text: 100_000,
            accept_images: true,
            accept_usernames: false,
            lookup_timeout_ms: 5_000,
        }
    }
}

impl ChainSettings {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContextSettings {
    pub enabled: bool,
    /// Fraction of the model window that triggers summarization.
    pub trigger_threshold: f64,
    pub min_unsummarized_pairs: usize,
    pub max_pairs_per_batch: usize,
    /// Model used for summaries; the primary model when unset.
    pub summarizer_model: Option<String>,
    pub truncation_marker: String,
    /// Deadline for one summarizer call.
    pub summary_timeout_secs: u64,
    pub retry: RetrySettings,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger_threshold: 0.8,
            min_unsummarized_pairs: 1,
            max_pairs_per_batch: 2,
            summarizer_model: None,
            truncation_marker: "\n\n[... message truncated to fit context ...]".to_string(),
            summary_timeout_secs: 60,
            retry: RetrySettings::default(),
        }
    }
}

impl ContextSettings {
    pub fn summary_timeout(&self) -> Duration {
        Duration::from_secs(self.summary_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            multiplier: 2.0,
            max_delay_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamSettings {
    pub max_message_chars: usize,
    pub edit_delay_ms: u64,
    pub streaming_marker: String,
    pub first_content_timeout_secs: u64,
    pub response_timeout_secs: u64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            max_message_chars: 2_000,
            edit_delay_ms: 1_000,
            streaming_marker: " ⚪".to_string(),
            first_content_timeout_secs: 60,
            response_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelSettings {
    pub primary: String,
    pub fallback: Option<String>,
    pub api_base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Context window overrides, keyed by model pattern.
    pub limits: HashMap<String, u32>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            primary: "gpt-4o".to_string(),
            fallback: Some("gpt-4o-mini".to_string()),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            limits: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheSettings {
    pub max_nodes: usize,
    /// Durable node directory, `~/.relay/nodes` when unset.
    pub storage_dir: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_nodes: 500,
            storage_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerSettings {
    pub count: usize,
    pub queue_capacity: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            count: 10,
            queue_capacity: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

fn parse_bool_env(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

impl RelayConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Default config file location: `<config dir>/relay/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("relay").join(CONFIG_FILE_NAME))
    }

    /// Load from `path`, else the default location, else built-in defaults,
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let candidate = path
            .map(Path::to_path_buf)
            .or_else(Self::default_path)
            .filter(|p| p.exists());

        let mut config = match candidate {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading relay config");
                let content = std::fs::read_to_string(&path)?;
                Self::from_toml_str(&content)?
            }
            None => {
                if let Some(path) = path {
                    tracing::warn!(path = %path.display(), "Config file not found, using defaults");
                }
                Self::default()
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `RELAY_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("RELAY_MODEL") {
            self.models.primary = model;
        }
        if let Some(fallback) = lookup("RELAY_FALLBACK_MODEL") {
            self.models.fallback = Some(fallback).filter(|f| !f.trim().is_empty());
        }
        if let Some(api_base) = lookup("RELAY_API_BASE") {
            self.models.api_base = api_base;
        }
        if let Some(api_key) = lookup("RELAY_API_KEY") {
            self.models.api_key = Some(api_key);
        }
        if let Some(model) = lookup("RELAY_SUMMARIZER_MODEL") {
            self.context.summarizer_model = Some(model);
        }
        if let Some(value) = lookup("RELAY_MAX_MESSAGES") {
            self.chain.max_messages = parse_env("RELAY_MAX_MESSAGES", &value)?;
        }
        if let Some(value) = lookup("RELAY_CACHE_SIZE") {
            self.cache.max_nodes = parse_env("RELAY_CACHE_SIZE", &value)?;
        }
        if let Some(dir) = lookup("RELAY_STORAGE_DIR") {
            self.cache.storage_dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = lookup("RELAY_WORKERS") {
            self.workers.count = parse_env("RELAY_WORKERS", &value)?;
        }
        if let Some(value) = lookup("RELAY_CONTEXT_MANAGEMENT") {
            self.context.enabled = parse_bool_env(&value);
        }
        if let Some(level) = lookup("RELAY_LOG") {
            self.logging.level = level;
        }
        if let Some(value) = lookup("RELAY_LOG_JSON") {
            self.logging.json = parse_bool_env(&value);
        }
        Ok(())
    }
}

/// Atomically swappable config snapshot.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Arc<RelayConfig>>>,
}

impl ConfigHandle {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// Current config. The returned value never changes underneath the caller.
    pub fn snapshot(&self) -> Arc<RelayConfig> {
        self.inner.read().clone()
    }

    pub fn replace(&self, config: RelayConfig) {
        *self.inner.write() = Arc::new(config);
    }

    /// Re-read config from disk and swap it in. The old snapshot stays in
    /// place if loading fails.
    pub fn reload(&self, path: Option<&Path>) -> Result<(), ConfigError> {
        let config = RelayConfig::load(path)?;
        self.replace(config);
        tracing::info!("Relay config reloaded");
        Ok(())
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(RelayConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parse_bool_env_true_values() {
        for value in ["1", "true", "TRUE", " yes ", "Y", "on"] {
            assert!(parse_bool_env(value), "value {value:?} should be true");
        }
    }

    #[test]
    fn parse_bool_env_false_values() {
        for value in ["0", "false", "no", "off", "", "  "] {
            assert!(!parse_bool_env(value), "value {value:?} should be false");
        }
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = RelayConfig::from_toml_str(
            r#"
            [chain]
            max_messages = 10

            [models]
            primary = "claude-sonnet-4"

            [models.limits]
            "local-llama" = 4096
            "#,
        )
        .unwrap();

        assert_eq!(config.chain.max_messages, 10);
        assert_eq!(config.chain.max_images, 5);
        assert_eq!(config.models.primary, "claude-sonnet-4");
        assert_eq!(config.models.limits.get("local-llama"), Some(&4096));
        assert_eq!(config.context.trigger_threshold, 0.8);
        assert_eq!(config.stream.max_message_chars, 2_000);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let err = RelayConfig::from_toml_str("[chain\nmax_messages = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = RelayConfig::default();
        config
            .apply_env_overrides(env(&[
                ("RELAY_MODEL", "gpt-4.1"),
                ("RELAY_FALLBACK_MODEL", ""),
                ("RELAY_MAX_MESSAGES", "7"),
                ("RELAY_LOG_JSON", "yes"),
            ]))
            .unwrap();

        assert_eq!(config.models.primary, "gpt-4.1");
        assert_eq!(config.models.fallback, None);
        assert_eq!(config.chain.max_messages, 7);
        assert!(config.logging.json);
    }

    #[test]
    fn bad_numeric_env_is_rejected() {
        let mut config = RelayConfig::default();
        let err = config
            .apply_env_overrides(env(&[("RELAY_WORKERS", "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "RELAY_WORKERS"));
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(&path, "[workers]\ncount = 3\n").unwrap();

        let config = RelayConfig::load(Some(&path)).unwrap();
        assert_eq!(config.workers.count, 3);
    }

    #[test]
    fn snapshot_is_stable_across_replace() {
        let handle = ConfigHandle::default();
        let before = handle.snapshot();

        let mut updated = RelayConfig::default();
        updated.chain.max_messages = 3;
        handle.replace(updated);

        assert_eq!(before.chain.max_messages, 25);
        assert_eq!(handle.snapshot().chain.max_messages, 3);
    }
}
