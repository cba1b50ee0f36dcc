//! Handle Registry
//!
//! [`EmbeddingsHandle`] binds one tokenizer and one model runtime into a
//! single owned resource. Everything it holds is fixed at open time; encode
//! calls only borrow it, so one handle can be shared across threads by
//! reference and needs no locking. Closing (or dropping) the handle frees
//! everything it loaded.

use std::path::Path;
use std::time::Instant;

use tracing::debug;

use crate::batch::{BatchProgress, BatchScheduler};
use crate::buffer::{EmbeddingBatch, ResultBuffer};
use crate::config::EmbeddingsConfig;
use crate::error::{EncodeResult, LoadError, LoadResult};
use crate::files::{ModelFiles, ModelMetadata};
use crate::runtime::{InferenceBackend, ModelRuntime, OnnxBackend};
use crate::tokenizer::TokenizerAdapter;

/// A loaded model and tokenizer pair
#[derive(Debug)]
pub struct EmbeddingsHandle {
    tokenizer: TokenizerAdapter,
    runtime: ModelRuntime,
    scheduler: BatchScheduler,
    config: EmbeddingsConfig,
}

impl EmbeddingsHandle {
    // ========================================================================
    // OPEN
    // ========================================================================

    /// Open a model and tokenizer with configuration from the environment
    pub fn open(model_path: impl AsRef<Path>, tokenizer_path: impl AsRef<Path>) -> LoadResult<Self> {
        let files = ModelFiles::new(model_path, tokenizer_path);
        Self::open_with_config(&files, EmbeddingsConfig::load()?)
    }

    /// Open the standard file layout inside `dir`
    pub fn open_dir(dir: impl AsRef<Path>) -> LoadResult<Self> {
        Self::open_with_config(&ModelFiles::from_dir(dir), EmbeddingsConfig::load()?)
    }

    /// Open with an explicit configuration
    pub fn open_with_config(files: &ModelFiles, config: EmbeddingsConfig) -> LoadResult<Self> {
        config.validate()?;
        let start = Instant::now();

        let metadata = files.read_metadata()?;
        let tokenizer = TokenizerAdapter::from_file(&files.tokenizer)?;
        let backend = OnnxBackend::load(&files.model)?;
        let handle = Self::from_parts(tokenizer, Box::new(backend), &metadata, config)?;

        debug!(
            "Opened embeddings handle in {}ms (dimension={})",
            start.elapsed().as_millis(),
            handle.dimension()
        );
        Ok(handle)
    }

    /// Assemble a handle from already-loaded parts
    ///
    /// Runs the same compatibility checks as [`EmbeddingsHandle::open_with_config`].
    pub fn from_parts(
        tokenizer: TokenizerAdapter,
        backend: Box<dyn InferenceBackend>,
        metadata: &ModelMetadata,
        config: EmbeddingsConfig,
    ) -> LoadResult<Self> {
        config.validate()?;
        let runtime = ModelRuntime::new(backend, config.pooling, config.normalize)?;

        if let Some(declared) = metadata.hidden_size {
            if declared != runtime.dimension() {
                return Err(LoadError::DimensionMismatch {
                    declared,
                    detected: runtime.dimension(),
                });
            }
        }

        if let Some(model_vocab) = metadata.vocab_size.or_else(|| runtime.vocab_size()) {
            if tokenizer.vocab_size() > model_vocab {
                return Err(LoadError::IncompatibleVocabulary {
                    tokenizer: tokenizer.vocab_size(),
                    model: model_vocab,
                });
            }
        }

        let max_length = match metadata.max_position_embeddings {
            Some(limit) if limit > 0 && limit < config.max_sequence_length => {
                debug!(
                    "Capping max sequence length at {} (model position limit)",
                    limit
                );
                limit
            }
            _ => config.max_sequence_length,
        };
        let tokenizer = tokenizer
            .with_max_length(max_length)
            .with_special_tokens(config.add_special_tokens);

        let scheduler = BatchScheduler::new(config.threads)?;

        debug!(
            "Handle ready: backend={} dimension={} pooling={:?} max_length={}",
            runtime.describe(),
            runtime.dimension(),
            runtime.pooling(),
            max_length
        );

        Ok(Self {
            tokenizer,
            runtime,
            scheduler,
            config,
        })
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Output vector length, fixed for the lifetime of the handle
    pub fn dimension(&self) -> usize {
        self.runtime.dimension()
    }

    /// Tokenizer vocabulary size
    pub fn vocab_size(&self) -> usize {
        self.tokenizer.vocab_size()
    }

    /// Effective token cap (config value, possibly lowered by the model)
    pub fn max_sequence_length(&self) -> usize {
        self.tokenizer.max_length()
    }

    /// Configuration the handle was opened with
    pub fn config(&self) -> &EmbeddingsConfig {
        &self.config
    }

    /// Backend description
    pub fn describe(&self) -> String {
        self.runtime.describe()
    }

    // ========================================================================
    // ENCODE
    // ========================================================================

    /// Embed one text
    pub fn encode(&self, text: &str) -> EncodeResult<ResultBuffer> {
        self.encode_bytes(text.as_bytes())
    }

    /// Embed raw bytes, decoding them best-effort as UTF-8
    pub fn encode_bytes(&self, text: &[u8]) -> EncodeResult<ResultBuffer> {
        self.scheduler.encode(&self.tokenizer, &self.runtime, text)
    }

    /// Embed several texts into one buffer, in input order
    pub fn encode_batch<T>(&self, texts: &[T]) -> EncodeResult<EmbeddingBatch>
    where
        T: AsRef<[u8]> + Sync,
    {
        self.scheduler
            .encode_batch(&self.tokenizer, &self.runtime, texts)
    }

    /// Embed several texts in chunks, reporting progress after each chunk
    pub fn encode_batch_with_progress<T, F>(
        &self,
        texts: &[T],
        chunk_size: usize,
        on_progress: F,
    ) -> EncodeResult<EmbeddingBatch>
    where
        T: AsRef<[u8]> + Sync,
        F: FnMut(BatchProgress),
    {
        self.scheduler.encode_batch_with_progress(
            &self.tokenizer,
            &self.runtime,
            texts,
            chunk_size,
            on_progress,
        )
    }

    // ========================================================================
    // CLOSE
    // ========================================================================

    /// Release everything the handle loaded
    pub fn close(self) {
        debug!("Closing embeddings handle ({})", self.runtime.describe());
        drop(self);
    }
}

// ============================================================================
// TESTS
// ============================================================================
