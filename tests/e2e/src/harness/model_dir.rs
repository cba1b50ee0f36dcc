//! Test Model Directory
//!
//! Provides isolated model directories for testing:
//! - a word-level `tokenizer.json` built from the shared test vocabulary
//! - optional `config.json` metadata
//! - handles assembled from mock backends, or real ONNX models when available

use std::path::{Path, PathBuf};

use embeddings_core::{
    EmbeddingsConfig, EmbeddingsHandle, InferenceBackend, LoadResult, ModelFiles,
    TokenizerAdapter,
    files::{METADATA_FILENAME, TOKENIZER_FILENAME},
};
use serde_json::json;
use tempfile::TempDir;

use crate::mocks::{HashBackend, SPECIAL_TOKENS, WORDS};

/// Output dimension of handles built by [`TestModelDir::open`]
pub const TEST_DIMENSION: usize = 32;

/// Environment variable pointing at a real model directory
const REAL_MODEL_ENV: &str = "EMBEDDINGS_TEST_MODEL_DIR";

/// Directory of a real model for ignored tests, if configured
pub fn real_model_dir() -> Option<PathBuf> {
    std::env::var(REAL_MODEL_ENV)
        .ok()
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
}

/// Tokenizer JSON for the test vocabulary
///
/// Ids: `[UNK]`=0, `[PAD]`=1, `[CLS]`=2, `[SEP]`=3, then [`WORDS`] in order.
pub fn tokenizer_json() -> String {
    let mut vocab = serde_json::Map::new();
    for (id, token) in SPECIAL_TOKENS.iter().chain(WORDS.iter()).enumerate() {
        vocab.insert(token.to_string(), json!(id));
    }

    json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": { "type": "Lowercase" },
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": {
            "type": "BertProcessing",
            "sep": ["[SEP]", 3],
            "cls": ["[CLS]", 2]
        },
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab,
            "unk_token": "[UNK]"
        }
    })
    .to_string()
}

/// Temporary model directory
///
/// Removed when dropped. Handles opened from it stay valid afterwards since
/// everything is read at open time.
///
/// # Example
///
/// ```rust,ignore
/// let dir = TestModelDir::new_temp();
/// let handle = dir.open();
/// assert_eq!(handle.dimension(), TEST_DIMENSION);
/// ```
pub struct TestModelDir {
    /// Temporary directory (kept alive to prevent premature deletion)
    temp_dir: TempDir,
    /// Resolved file paths
    files: ModelFiles,
}

impl TestModelDir {
    /// Directory with a tokenizer and no metadata
    pub fn new_temp() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        std::fs::write(temp_dir.path().join(TOKENIZER_FILENAME), tokenizer_json())
            .expect("Failed to write tokenizer");
        let files = ModelFiles::from_dir(temp_dir.path());
        Self { temp_dir, files }
    }

    /// Directory with a tokenizer and a `config.json`
    pub fn with_metadata(metadata: serde_json::Value) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        std::fs::write(temp_dir.path().join(TOKENIZER_FILENAME), tokenizer_json())
            .expect("Failed to write tokenizer");
        std::fs::write(temp_dir.path().join(METADATA_FILENAME), metadata.to_string())
            .expect("Failed to write metadata");
        let files = ModelFiles::from_dir(temp_dir.path());
        Self { temp_dir, files }
    }

    /// Directory path
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Resolved model files
    pub fn files(&self) -> &ModelFiles {
        &self.files
    }

    /// Write bytes that are not an ONNX model to `model.onnx`
    pub fn write_garbage_model(&self) {
        std::fs::write(&self.files.model, b"definitely not a protobuf")
            .expect("Failed to write model");
    }

    /// Load the directory's tokenizer
    pub fn tokenizer(&self) -> TokenizerAdapter {
        TokenizerAdapter::from_file(&self.files.tokenizer).expect("Failed to load tokenizer")
    }

    /// Open a handle over `backend`, applying the directory's metadata checks
    pub fn open_with(
        &self,
        backend: impl InferenceBackend + 'static,
        config: EmbeddingsConfig,
    ) -> LoadResult<EmbeddingsHandle> {
        let metadata = self.files.read_metadata()?;
        EmbeddingsHandle::from_parts(self.tokenizer(), Box::new(backend), &metadata, config)
    }

    /// Open a default handle: [`HashBackend`] of [`TEST_DIMENSION`]
    pub fn open(&self) -> EmbeddingsHandle {
        self.open_with(HashBackend::new(TEST_DIMENSION), EmbeddingsConfig::default())
            .expect("Failed to open test handle")
    }
}
