//! Model Runtime
//!
//! Owns the loaded model and turns one token sequence into one fixed-length
//! vector. The runtime holds no per-call state: every scratch buffer lives in
//! the call that created it, so a shared `&ModelRuntime` can serve any number
//! of threads at once.
//!
//! Backends:
//! - [`OnnxBackend`]: transformer encoders exported to ONNX, run by tract
//! - anything implementing [`InferenceBackend`]

mod onnx;
pub mod pooling;

pub use onnx::OnnxBackend;

use std::fmt;

use crate::config::Pooling;
use crate::error::{EncodeError, EncodeResult, LoadError, LoadResult};
use crate::tokenizer::TokenizedInput;

// ============================================================================
// BACKEND SEAM
// ============================================================================

/// Raw model output for one sequence
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    /// Per-token hidden states, row-major `[seq_len, dimension]`
    TokenStates {
        /// Number of token rows
        seq_len: usize,
        /// Flattened hidden states
        values: Vec<f32>,
    },
    /// Sentence-level vector already pooled by the model
    Pooled(Vec<f32>),
}

/// A loaded model that can run one token sequence
///
/// Implementations must be pure with respect to `&self`: the same input
/// produces the same output regardless of concurrent calls.
pub trait InferenceBackend: Send + Sync {
    /// Output vector length
    fn dimension(&self) -> usize;

    /// Number of token ids the model can embed, when known
    fn vocab_size(&self) -> Option<usize> {
        None
    }

    /// Short human-readable description for logs
    fn describe(&self) -> String;

    /// Run the model over one non-empty sequence
    fn forward(&self, input: &TokenizedInput) -> EncodeResult<ModelOutput>;
}

// ============================================================================
// RUNTIME
// ============================================================================

/// Loaded model plus the post-processing applied to its outputs
pub struct ModelRuntime {
    backend: Box<dyn InferenceBackend>,
    dimension: usize,
    pooling: Pooling,
    normalize: bool,
}

impl fmt::Debug for ModelRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRuntime")
            .field("backend", &self.backend.describe())
            .field("dimension", &self.dimension)
            .field("pooling", &self.pooling)
            .field("normalize", &self.normalize)
            .finish()
    }
}

impl ModelRuntime {
    /// Wrap a backend; the dimension is captured once and never changes
    pub fn new(
        backend: Box<dyn InferenceBackend>,
        pooling: Pooling,
        normalize: bool,
    ) -> LoadResult<Self> {
        let dimension = backend.dimension();
        if dimension == 0 {
            return Err(LoadError::UnsupportedModel(format!(
                "{} reports a zero output dimension",
                backend.describe()
            )));
        }

        Ok(Self {
            backend,
            dimension,
            pooling,
            normalize,
        })
    }

    /// Output vector length
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Model vocabulary size, when the backend knows it
    pub fn vocab_size(&self) -> Option<usize> {
        self.backend.vocab_size()
    }

    /// Pooling strategy in effect
    pub fn pooling(&self) -> Pooling {
        self.pooling
    }

    /// Backend description
    pub fn describe(&self) -> String {
        self.backend.describe()
    }

    /// Produce the embedding for one tokenized text
    pub fn embed(&self, input: &TokenizedInput) -> EncodeResult<Vec<f32>> {
        // Nothing to attend over; the backend never sees empty sequences
        if input.is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        let mut vector = match self.backend.forward(input)? {
            ModelOutput::TokenStates { seq_len, values } => {
                let expected = seq_len * self.dimension;
                if seq_len == 0 || values.len() != expected {
                    return Err(EncodeError::OutputShape {
                        expected,
                        actual: values.len(),
                    });
                }
                pooling::pool(
                    &values,
                    seq_len,
                    self.dimension,
                    &input.attention_mask,
                    self.pooling,
                )
            }
            ModelOutput::Pooled(values) => {
                if values.len() != self.dimension {
                    return Err(EncodeError::OutputShape {
                        expected: self.dimension,
                        actual: values.len(),
                    });
                }
                values
            }
        };

        if self.normalize {
            pooling::l2_normalize(&mut vector);
        }
        Ok(vector)
    }
}

// ============================================================================
// TESTS
// ============================================================================
