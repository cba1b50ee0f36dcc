//! Mock Inference Backends
//!
//! Pure functions of the token sequence, so any difference between two
//! encodes of the same text points at the code under test.

use embeddings_core::{EncodeError, EncodeResult, InferenceBackend, ModelOutput, TokenizedInput};

/// Deterministic token-state backend
///
/// Each (token, position, dimension) triple maps to a fixed value in
/// `[-0.5, 0.5)`.
#[derive(Debug, Clone)]
pub struct HashBackend {
    dimension: usize,
    vocab_size: Option<usize>,
    yield_per_token: bool,
}

impl HashBackend {
    /// Backend with the given output dimension and unknown vocabulary
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vocab_size: None,
            yield_per_token: false,
        }
    }

    /// Report a model vocabulary size
    pub fn with_vocab_size(mut self, vocab_size: usize) -> Self {
        self.vocab_size = Some(vocab_size);
        self
    }

    /// Yield the thread after every token to force interleaving
    pub fn yielding(mut self) -> Self {
        self.yield_per_token = true;
        self
    }

    fn value(token: i64, position: usize, dim: usize) -> f32 {
        let mixed = (token as u64)
            .wrapping_mul(2_654_435_761)
            .wrapping_add((dim as u64).wrapping_mul(40_503))
            .wrapping_add((position as u64).wrapping_mul(97));
        (mixed % 1000) as f32 / 1000.0 - 0.5
    }
}

impl InferenceBackend for HashBackend {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn vocab_size(&self) -> Option<usize> {
        self.vocab_size
    }

    fn describe(&self) -> String {
        format!("hash({})", self.dimension)
    }

    fn forward(&self, input: &TokenizedInput) -> EncodeResult<ModelOutput> {
        let mut values = Vec::with_capacity(input.len() * self.dimension);
        for (position, &token) in input.input_ids.iter().enumerate() {
            for dim in 0..self.dimension {
                values.push(Self::value(token, position, dim));
            }
            if self.yield_per_token {
                std::thread::yield_now();
            }
        }
        Ok(ModelOutput::TokenStates {
            seq_len: input.len(),
            values,
        })
    }
}

/// Backend that fails on any sequence containing one token id
#[derive(Debug, Clone)]
pub struct FailingBackend {
    inner: HashBackend,
    poison_id: i64,
}

impl FailingBackend {
    /// Fail whenever `poison_id` appears in the input
    pub fn new(dimension: usize, poison_id: i64) -> Self {
        Self {
            inner: HashBackend::new(dimension),
            poison_id,
        }
    }
}

impl InferenceBackend for FailingBackend {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn describe(&self) -> String {
        format!("failing(on={})", self.poison_id)
    }

    fn forward(&self, input: &TokenizedInput) -> EncodeResult<ModelOutput> {
        if input.input_ids.contains(&self.poison_id) {
            return Err(EncodeError::Inference(format!(
                "token {} triggers a failure",
                self.poison_id
            )));
        }
        self.inner.forward(input)
    }
}
