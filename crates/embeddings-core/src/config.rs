//! Runtime Configuration
//!
//! Precedence, lowest to highest: built-in defaults, an optional JSON file,
//! then `EMBEDDINGS_*` environment variables.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LoadError, LoadResult};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Maximum tokens per text (BERT-family position limit)
pub const DEFAULT_MAX_SEQUENCE_LENGTH: usize = 512;

/// Batch worker threads per handle
pub const DEFAULT_THREADS: usize = 2;

/// Environment variable naming an optional JSON config file
pub const CONFIG_PATH_ENV: &str = "EMBEDDINGS_CONFIG";

const MAX_SEQ_LEN_ENV: &str = "EMBEDDINGS_MAX_SEQ_LEN";
const POOLING_ENV: &str = "EMBEDDINGS_POOLING";
const NORMALIZE_ENV: &str = "EMBEDDINGS_NORMALIZE";
const SPECIAL_TOKENS_ENV: &str = "EMBEDDINGS_ADD_SPECIAL_TOKENS";
const THREADS_ENV: &str = "EMBEDDINGS_THREADS";

// ============================================================================
// POOLING
// ============================================================================

/// How per-token hidden states collapse into one vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pooling {
    /// Attention-masked mean over all tokens
    #[default]
    Mean,
    /// Hidden state of the first token
    Cls,
}

impl std::str::FromStr for Pooling {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(Pooling::Mean),
            "cls" => Ok(Pooling::Cls),
            other => Err(LoadError::Config(format!(
                "unknown pooling '{}', expected 'mean' or 'cls'",
                other
            ))),
        }
    }
}

// ============================================================================
// CONFIG
// ============================================================================

/// Settings fixed for the lifetime of a handle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    /// Token cap per text; longer inputs are truncated
    pub max_sequence_length: usize,
    /// Pooling strategy for token-level model outputs
    pub pooling: Pooling,
    /// L2-normalize output vectors
    pub normalize: bool,
    /// Let the tokenizer's post-processor add special tokens
    pub add_special_tokens: bool,
    /// Batch worker threads
    pub threads: usize,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            max_sequence_length: DEFAULT_MAX_SEQUENCE_LENGTH,
            pooling: Pooling::Mean,
            normalize: true,
            add_special_tokens: true,
            threads: DEFAULT_THREADS,
        }
    }
}

impl EmbeddingsConfig {
    /// Read a JSON config file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> LoadResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LoadError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            LoadError::Config(format!("cannot parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> LoadResult<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Full resolution: `EMBEDDINGS_CONFIG` file if set, then environment overrides
    pub fn load() -> LoadResult<Self> {
        let base = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.is_empty() => Self::from_file(path)?,
            _ => Self::default(),
        };
        base.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `EMBEDDINGS_*` overrides read through `lookup`
    pub fn with_overrides<F>(mut self, lookup: F) -> LoadResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(MAX_SEQ_LEN_ENV) {
            self.max_sequence_length = parse_usize(MAX_SEQ_LEN_ENV, &value)?;
        }
        if let Some(value) = lookup(POOLING_ENV) {
            self.pooling = value.parse()?;
        }
        if let Some(value) = lookup(NORMALIZE_ENV) {
            self.normalize = parse_bool(NORMALIZE_ENV, &value)?;
        }
        if let Some(value) = lookup(SPECIAL_TOKENS_ENV) {
            self.add_special_tokens = parse_bool(SPECIAL_TOKENS_ENV, &value)?;
        }
        if let Some(value) = lookup(THREADS_ENV) {
            self.threads = parse_usize(THREADS_ENV, &value)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Builder: set the token cap
    pub fn with_max_sequence_length(mut self, max_sequence_length: usize) -> Self {
        self.max_sequence_length = max_sequence_length;
        self
    }

    /// Builder: set the pooling strategy
    pub fn with_pooling(mut self, pooling: Pooling) -> Self {
        self.pooling = pooling;
        self
    }

    /// Builder: set the worker count
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Reject settings no handle can run with
    pub fn validate(&self) -> LoadResult<()> {
        if self.threads == 0 {
            return Err(LoadError::Config("threads must be at least 1".to_string()));
        }
        if self.max_sequence_length == 0 {
            return Err(LoadError::Config(
                "max_sequence_length must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_usize(key: &str, value: &str) -> LoadResult<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| LoadError::Config(format!("{} must be a non-negative integer, got '{}'", key, value)))
}

fn parse_bool(key: &str, value: &str) -> LoadResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(LoadError::Config(format!("{} must be a boolean, got '{}'", key, value))),
    }
}

// ============================================================================
// TESTS
// ============================================================================
