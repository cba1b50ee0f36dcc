//! # Embeddings Core
//!
//! Local text-embedding inference behind a small, owned API:
//!
//! - **Tokenizer Adapter**: Hugging Face `tokenizer.json`, bounded sequences
//! - **Model Runtime**: ONNX transformer encoders on tract, mean or CLS pooling
//! - **Batch Scheduler**: per-handle rayon pool, batch results identical to single encodes
//! - **Result Buffers**: one contiguous `f32` allocation per call, length-known
//! - **Handles**: immutable after open, shareable across threads without locks
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use embeddings_core::EmbeddingsHandle;
//!
//! let handle = EmbeddingsHandle::open("model/model.onnx", "model/tokenizer.json")?;
//! assert_eq!(handle.dimension(), 384);
//!
//! let vector = handle.encode("The mitochondria is the powerhouse of the cell")?;
//! let batch = handle.encode_batch(&["first text", "second text"])?;
//! assert_eq!(batch.get(0).map(<[f32]>::len), Some(handle.dimension()));
//!
//! handle.close();
//! ```
//!
//! ## Configuration
//!
//! [`EmbeddingsConfig::load`] reads an optional JSON file named by
//! `EMBEDDINGS_CONFIG`, then applies `EMBEDDINGS_*` environment overrides.
//! A `config.json` next to the model, when present, is checked against the
//! loaded model and may lower the token cap.
//!
//! ## Logging
//!
//! The crate emits `tracing` events and never installs a subscriber.

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod batch;
pub mod buffer;
pub mod config;
pub mod error;
pub mod files;
pub mod handle;
pub mod runtime;
pub mod tokenizer;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use batch::{BatchProgress, BatchScheduler};
pub use buffer::{EmbeddingBatch, ResultBuffer};
pub use config::{EmbeddingsConfig, Pooling, DEFAULT_MAX_SEQUENCE_LENGTH, DEFAULT_THREADS};
pub use error::{EncodeError, EncodeResult, ErrorKind, LoadError, LoadResult};
pub use files::{ModelFiles, ModelMetadata};
pub use handle::EmbeddingsHandle;
pub use runtime::{InferenceBackend, ModelOutput, ModelRuntime, OnnxBackend};
pub use tokenizer::{TokenizedInput, TokenizerAdapter};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
