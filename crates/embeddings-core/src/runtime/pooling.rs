//! Pooling and normalization over token-level hidden states
//!
//! All reductions run sequentially in a fixed order so the same input always
//! yields the same bits.

use crate::config::Pooling;

/// Norms below this are treated as zero
const NORM_EPSILON: f32 = 1e-12;

/// Collapse row-major `[seq_len, dim]` hidden states into one vector
pub fn pool(values: &[f32], seq_len: usize, dim: usize, mask: &[i64], pooling: Pooling) -> Vec<f32> {
    match pooling {
        Pooling::Mean => mean_pool(values, seq_len, dim, mask),
        Pooling::Cls => cls_pool(values, dim),
    }
}

/// Attention-masked mean; positions beyond the mask count as real tokens
pub fn mean_pool(values: &[f32], seq_len: usize, dim: usize, mask: &[i64]) -> Vec<f32> {
    let mut pooled = vec![0.0f32; dim];
    let mut count = 0usize;

    for (row, token) in values.chunks_exact(dim).take(seq_len).enumerate() {
        if mask.get(row).copied().unwrap_or(1) == 0 {
            continue;
        }
        for (acc, value) in pooled.iter_mut().zip(token) {
            *acc += value;
        }
        count += 1;
    }

    if count > 0 {
        let divisor = count as f32;
        for value in pooled.iter_mut() {
            *value /= divisor;
        }
    }
    pooled
}

/// Hidden state of the first token
pub fn cls_pool(values: &[f32], dim: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; dim];
    let first = values.len().min(dim);
    pooled[..first].copy_from_slice(&values[..first]);
    pooled
}

/// Normalize a vector to unit length in place (L2)
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > NORM_EPSILON {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}
