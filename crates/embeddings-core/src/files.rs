//! Model File Layout
//!
//! A model directory holds the Hugging Face export layout:
//! - `model.onnx`: the encoder graph
//! - `tokenizer.json`: the tokenizer
//! - `config.json` (optional): architecture metadata used for load-time checks

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{LoadError, LoadResult};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Model graph file name
pub const MODEL_FILENAME: &str = "model.onnx";

/// Tokenizer file name
pub const TOKENIZER_FILENAME: &str = "tokenizer.json";

/// Architecture metadata file name
pub const METADATA_FILENAME: &str = "config.json";

/// Environment variable overriding the default model directory
pub const MODEL_DIR_ENV: &str = "EMBEDDINGS_MODEL_DIR";

// ============================================================================
// MODEL FILES
// ============================================================================

/// Paths of one model's files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    /// ONNX model
    pub model: PathBuf,
    /// tokenizer.json
    pub tokenizer: PathBuf,
    /// config.json, if present
    pub metadata: Option<PathBuf>,
}

impl ModelFiles {
    /// Explicit model and tokenizer paths; metadata is looked up next to the model
    pub fn new(model: impl AsRef<Path>, tokenizer: impl AsRef<Path>) -> Self {
        let model = model.as_ref().to_path_buf();
        let metadata = model
            .parent()
            .map(|dir| dir.join(METADATA_FILENAME))
            .filter(|path| path.is_file());
        Self {
            model,
            tokenizer: tokenizer.as_ref().to_path_buf(),
            metadata,
        }
    }

    /// Standard file names inside `dir`
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join(MODEL_FILENAME), dir.join(TOKENIZER_FILENAME))
    }

    /// Default model directory
    ///
    /// Uses `EMBEDDINGS_MODEL_DIR`, or falls back to the platform cache directory:
    /// - macOS: ~/Library/Caches/dev.cortex.embeddings/models
    /// - Linux: ~/.cache/embeddings/models
    /// - Windows: %LOCALAPPDATA%\cortex\embeddings\cache\models
    pub fn default_dir() -> PathBuf {
        if let Ok(path) = std::env::var(MODEL_DIR_ENV) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(proj_dirs) = directories::ProjectDirs::from("dev", "cortex", "embeddings") {
            return proj_dirs.cache_dir().join("models");
        }

        if let Some(base_dirs) = directories::BaseDirs::new() {
            return base_dirs.home_dir().join(".cache/embeddings/models");
        }

        PathBuf::from(".embeddings_models")
    }

    /// True when both required files exist
    pub fn is_complete(&self) -> bool {
        self.model.is_file() && self.tokenizer.is_file()
    }

    /// Read config.json if one was found
    pub fn read_metadata(&self) -> LoadResult<ModelMetadata> {
        match &self.metadata {
            Some(path) => ModelMetadata::from_file(path),
            None => Ok(ModelMetadata::default()),
        }
    }
}

// ============================================================================
// MODEL METADATA
// ============================================================================

/// Architecture fields from a Hugging Face `config.json`
///
/// Unknown fields are ignored; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ModelMetadata {
    /// Width of the hidden states (output dimension)
    #[serde(default)]
    pub hidden_size: Option<usize>,
    /// Rows in the token embedding table
    #[serde(default)]
    pub vocab_size: Option<usize>,
    /// Longest sequence the position embeddings cover
    #[serde(default)]
    pub max_position_embeddings: Option<usize>,
}

impl ModelMetadata {
    /// Parse a config.json file
    pub fn from_file(path: impl AsRef<Path>) -> LoadResult<Self> {
        let path = path.as_ref();
        debug!("Reading model metadata from {:?}", path);
        let raw = std::fs::read_to_string(path)
            .map_err(|e| LoadError::ModelMetadata(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| LoadError::ModelMetadata(format!("{}: {}", path.display(), e)))
    }
}

// ============================================================================
// TESTS
// ============================================================================
