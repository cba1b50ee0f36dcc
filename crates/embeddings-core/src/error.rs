//! Error Types
//!
//! Two failure families cross the boundary:
//! - [`LoadError`]: raised while opening a handle (model, tokenizer, config)
//! - [`EncodeError`]: raised by a single encode call; the handle stays usable
//!
//! Misuse of the ownership contract (double release, foreign buffers) is not
//! represented here.

use std::path::PathBuf;

use thiserror::Error;

// ============================================================================
// ERROR KIND
// ============================================================================

/// Coarse failure category reported at the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Model or tokenizer missing, unreadable, or incompatible
    LoadFailure,
    /// Text could not be tokenized or encoded
    EncodingFailure,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::LoadFailure => write!(f, "LoadFailure"),
            ErrorKind::EncodingFailure => write!(f, "EncodingFailure"),
        }
    }
}

// ============================================================================
// LOAD ERRORS
// ============================================================================

/// Errors raised while loading a model, tokenizer, or configuration
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LoadError {
    /// A required file does not exist
    #[error("{what} not found at {}", path.display())]
    MissingFile {
        /// Which file was expected ("model", "tokenizer", ...)
        what: &'static str,
        /// Path that was checked
        path: PathBuf,
    },

    /// The tokenizer file could not be parsed
    #[error("Failed to load tokenizer: {0}")]
    Tokenizer(String),

    /// The model file could not be parsed, optimized, or made runnable
    #[error("Failed to load model: {0}")]
    Model(String),

    /// The model metadata (config.json) could not be read
    #[error("Invalid model metadata: {0}")]
    ModelMetadata(String),

    /// The model exposes inputs or outputs this runtime cannot drive
    #[error("Unsupported model signature: {0}")]
    UnsupportedModel(String),

    /// Tokenizer can emit ids the model has no embedding for
    #[error("Tokenizer vocabulary ({tokenizer}) exceeds model vocabulary ({model})")]
    IncompatibleVocabulary {
        /// Vocabulary size reported by the tokenizer
        tokenizer: usize,
        /// Vocabulary size declared by the model
        model: usize,
    },

    /// Declared hidden size disagrees with the detected output dimension
    #[error("Model metadata declares dimension {declared}, model produces {detected}")]
    DimensionMismatch {
        /// Dimension from config.json
        declared: usize,
        /// Dimension detected from the model output
        detected: usize,
    },

    /// Invalid runtime configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The batch worker pool could not be created
    #[error("Failed to create worker pool: {0}")]
    WorkerPool(String),
}

impl LoadError {
    /// Boundary category of this error
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::LoadFailure
    }
}

// ============================================================================
// ENCODE ERRORS
// ============================================================================

/// Errors raised by a single encode call
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Input bytes contain no decodable text at all
    #[error("Input text is not decodable as UTF-8")]
    Undecodable,

    /// The tokenizer rejected the text
    #[error("Tokenization failed: {0}")]
    Tokenization(String),

    /// The model failed while running
    #[error("Inference failed: {0}")]
    Inference(String),

    /// The model produced an output of unexpected size
    #[error("Model output has {actual} values, expected {expected}")]
    OutputShape {
        /// Expected number of values
        expected: usize,
        /// Number of values produced
        actual: usize,
    },

    /// One item of a batch failed; the whole batch is discarded
    #[error("Batch item {index} failed: {source}")]
    Batch {
        /// Position of the failing text in the input
        index: usize,
        /// Underlying failure
        #[source]
        source: Box<EncodeError>,
    },
}

impl EncodeError {
    /// Boundary category of this error
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::EncodingFailure
    }

    /// Attach a batch position to an item failure
    pub(crate) fn at(self, index: usize) -> Self {
        match self {
            EncodeError::Batch { .. } => self,
            other => EncodeError::Batch {
                index,
                source: Box::new(other),
            },
        }
    }

    /// Move a batch position by `offset` (chunk-relative to batch-relative)
    pub(crate) fn shifted(self, offset: usize) -> Self {
        match self {
            EncodeError::Batch { index, source } => EncodeError::Batch {
                index: index + offset,
                source,
            },
            other => other,
        }
    }

    /// Position of the failing item, if this came from a batch
    pub fn batch_index(&self) -> Option<usize> {
        match self {
            EncodeError::Batch { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Result type for load operations
pub type LoadResult<T> = std::result::Result<T, LoadError>;

/// Result type for encode operations
pub type EncodeResult<T> = std::result::Result<T, EncodeError>;

// ============================================================================
// TESTS
// ============================================================================
