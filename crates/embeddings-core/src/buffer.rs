//! Result Buffer Owner
//!
//! Every successful encode produces one contiguous `f32` allocation whose
//! length is counted in elements. Inside Rust it is an owned [`ResultBuffer`];
//! only [`ResultBuffer::into_raw_parts`] and [`ResultBuffer::from_raw_parts`]
//! deal in pointers, and they are the single place where ownership crosses
//! the boundary.
//!
//! An empty result is represented across the boundary as a null pointer with
//! length 0, and reclaiming `(null, 0)` is a no-op.

use std::fmt;
use std::ops::Deref;
use std::slice::ChunksExact;

// ============================================================================
// RESULT BUFFER
// ============================================================================

/// Owned, length-known block of embedding values
#[derive(Clone, PartialEq)]
pub struct ResultBuffer {
    data: Box<[f32]>,
}

impl fmt::Debug for ResultBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultBuffer")
            .field("len", &self.data.len())
            .finish_non_exhaustive()
    }
}

impl ResultBuffer {
    /// Take ownership of computed values; capacity is trimmed to length
    pub fn from_vec(values: Vec<f32>) -> Self {
        Self {
            data: values.into_boxed_slice(),
        }
    }

    /// Number of `f32` elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the buffer holds no elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the values
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Convert into a growable vector
    pub fn into_vec(self) -> Vec<f32> {
        self.data.into_vec()
    }

    /// Hand the allocation to a foreign caller
    ///
    /// Returns `(null, 0)` for an empty buffer. A non-null pointer must be
    /// returned exactly once through [`ResultBuffer::from_raw_parts`] with the
    /// same length.
    pub fn into_raw_parts(self) -> (*mut f32, usize) {
        let len = self.data.len();
        if len == 0 {
            return (std::ptr::null_mut(), 0);
        }
        let ptr = Box::into_raw(self.data) as *mut f32;
        (ptr, len)
    }

    /// Reclaim an allocation produced by [`ResultBuffer::into_raw_parts`]
    ///
    /// Returns `None` for a null pointer or zero length.
    ///
    /// # Safety
    ///
    /// `ptr` and `len` must be exactly a pair returned by `into_raw_parts`
    /// that has not already been reclaimed.
    pub unsafe fn from_raw_parts(ptr: *mut f32, len: usize) -> Option<Self> {
        if ptr.is_null() || len == 0 {
            return None;
        }
        let slice = std::ptr::slice_from_raw_parts_mut(ptr, len);
        // SAFETY: the caller guarantees this pair came from `into_raw_parts`,
        // which leaked a `Box<[f32]>` of exactly `len` elements.
        let data = unsafe { Box::from_raw(slice) };
        Some(Self { data })
    }
}

impl Deref for ResultBuffer {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.data
    }
}

impl AsRef<[f32]> for ResultBuffer {
    fn as_ref(&self) -> &[f32] {
        &self.data
    }
}

// ============================================================================
// EMBEDDING BATCH
// ============================================================================

/// Concatenated vectors for a batch, in input order
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingBatch {
    buffer: ResultBuffer,
    dimension: usize,
}

impl EmbeddingBatch {
    /// Wrap a buffer holding `buffer.len() / dimension` vectors
    pub(crate) fn new(buffer: ResultBuffer, dimension: usize) -> Self {
        debug_assert!(dimension > 0);
        debug_assert_eq!(buffer.len() % dimension, 0);
        Self { buffer, dimension }
    }

    /// Number of vectors
    pub fn len(&self) -> usize {
        self.buffer.len() / self.dimension
    }

    /// True when the batch holds no vectors
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Vector length
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Vector at `index`
    pub fn get(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.dimension)?;
        self.buffer.get(start..start + self.dimension)
    }

    /// Vectors in input order
    pub fn iter(&self) -> ChunksExact<'_, f32> {
        self.buffer.chunks_exact(self.dimension)
    }

    /// Total `f32` elements (`len() * dimension()`)
    pub fn element_count(&self) -> usize {
        self.buffer.len()
    }

    /// Give up the per-vector view and keep the flat buffer
    pub fn into_buffer(self) -> ResultBuffer {
        self.buffer
    }

    /// Split into owned vectors
    pub fn into_vectors(self) -> Vec<Vec<f32>> {
        self.iter().map(<[f32]>::to_vec).collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
