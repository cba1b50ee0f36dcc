//! Batch Scheduler
//!
//! Encodes many texts in one call:
//! 1. every text is tokenized (in parallel) before any inference starts
//! 2. each sequence is run through the model independently (in parallel)
//! 3. vectors are concatenated in input order into one buffer
//!
//! Items never share a model invocation, so a vector computed inside a batch
//! is bit-for-bit the vector [`BatchScheduler::encode`] returns for the same
//! text. A failure anywhere fails the whole call and no buffer is produced.

use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::debug;

use crate::buffer::{EmbeddingBatch, ResultBuffer};
use crate::error::{EncodeError, EncodeResult, LoadError, LoadResult};
use crate::runtime::ModelRuntime;
use crate::tokenizer::TokenizerAdapter;

// ============================================================================
// PROGRESS
// ============================================================================

/// Progress after each chunk of a chunked batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// Current chunk (1-indexed)
    pub chunk_index: usize,
    /// Total number of chunks
    pub total_chunks: usize,
    /// Texts encoded so far
    pub processed: usize,
    /// Texts in the whole batch
    pub total: usize,
}

impl BatchProgress {
    /// Completion percentage (0-100)
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.processed as f64 / self.total as f64) * 100.0
        }
    }
}

// ============================================================================
// SCHEDULER
// ============================================================================

/// Per-handle worker pool for batch encoding
pub struct BatchScheduler {
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for BatchScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchScheduler")
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

impl BatchScheduler {
    /// Create a scheduler with `threads` workers
    pub fn new(threads: usize) -> LoadResult<Self> {
        if threads == 0 {
            return Err(LoadError::Config("threads must be at least 1".to_string()));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("embeddings-worker-{}", index))
            .build()
            .map_err(|e| LoadError::WorkerPool(e.to_string()))?;
        debug!("Batch scheduler using {} threads", threads);
        Ok(Self { pool })
    }

    /// Worker count
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Encode one text on the calling thread
    pub fn encode(
        &self,
        tokenizer: &TokenizerAdapter,
        runtime: &ModelRuntime,
        text: &[u8],
    ) -> EncodeResult<ResultBuffer> {
        let input = tokenizer.encode_bytes(text)?;
        let vector = runtime.embed(&input)?;
        Ok(ResultBuffer::from_vec(vector))
    }

    /// Encode all texts into one buffer of `texts.len() * dimension` values
    ///
    /// When several items fail, the error reports the lowest failing index.
    pub fn encode_batch<T>(
        &self,
        tokenizer: &TokenizerAdapter,
        runtime: &ModelRuntime,
        texts: &[T],
    ) -> EncodeResult<EmbeddingBatch>
    where
        T: AsRef<[u8]> + Sync,
    {
        let dimension = runtime.dimension();
        if texts.is_empty() {
            return Ok(EmbeddingBatch::new(ResultBuffer::from_vec(Vec::new()), dimension));
        }

        let start = Instant::now();
        let vectors = self.pool.install(|| -> EncodeResult<Vec<Vec<f32>>> {
            let tokenized: Vec<EncodeResult<_>> = texts
                .par_iter()
                .map(|text| tokenizer.encode_bytes(text.as_ref()))
                .collect();
            let inputs = first_failure(tokenized)?;

            let embedded: Vec<EncodeResult<Vec<f32>>> =
                inputs.par_iter().map(|input| runtime.embed(input)).collect();
            first_failure(embedded)
        })?;

        let mut flat = Vec::with_capacity(texts.len() * dimension);
        for vector in vectors {
            flat.extend_from_slice(&vector);
        }
        log_throughput(texts.len(), start.elapsed());

        Ok(EmbeddingBatch::new(ResultBuffer::from_vec(flat), dimension))
    }

    /// Encode in ordered chunks of `chunk_size`, reporting after each chunk
    ///
    /// The result is identical to [`BatchScheduler::encode_batch`]; a failure
    /// in any chunk discards everything encoded so far.
    pub fn encode_batch_with_progress<T, F>(
        &self,
        tokenizer: &TokenizerAdapter,
        runtime: &ModelRuntime,
        texts: &[T],
        chunk_size: usize,
        mut on_progress: F,
    ) -> EncodeResult<EmbeddingBatch>
    where
        T: AsRef<[u8]> + Sync,
        F: FnMut(BatchProgress),
    {
        let dimension = runtime.dimension();
        let total = texts.len();
        if total == 0 {
            return Ok(EmbeddingBatch::new(ResultBuffer::from_vec(Vec::new()), dimension));
        }

        let chunk_size = chunk_size.max(1);
        let total_chunks = total.div_ceil(chunk_size);
        let mut flat = Vec::with_capacity(total * dimension);

        for (chunk_index, chunk) in texts.chunks(chunk_size).enumerate() {
            let offset = chunk_index * chunk_size;
            let encoded = self
                .encode_batch(tokenizer, runtime, chunk)
                .map_err(|e| e.shifted(offset))?;
            flat.extend_from_slice(encoded.into_buffer().as_slice());

            on_progress(BatchProgress {
                chunk_index: chunk_index + 1,
                total_chunks,
                processed: offset + chunk.len(),
                total,
            });
        }

        Ok(EmbeddingBatch::new(ResultBuffer::from_vec(flat), dimension))
    }
}

/// Unwrap per-item results in order, tagging the first failure with its index
fn first_failure<T>(results: Vec<EncodeResult<T>>) -> EncodeResult<Vec<T>> {
    results
        .into_iter()
        .enumerate()
        .map(|(index, result)| result.map_err(|e: EncodeError| e.at(index)))
        .collect()
}

fn log_throughput(count: usize, elapsed: Duration) {
    let secs = elapsed.as_secs_f64();
    let rate = if secs > 0.0 { count as f64 / secs } else { 0.0 };
    debug!(
        "Encoded {} texts in {}ms ({:.1} texts/sec)",
        count,
        elapsed.as_millis(),
        rate
    );
}

// ============================================================================
// TESTS
// ============================================================================
