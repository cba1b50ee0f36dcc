//! # Embeddings FFI
//!
//! C ABI over [`embeddings_core`]. The declarations live in
//! `include/embeddings.h`.
//!
//! Ownership rules for callers:
//! - a handle from `embeddings_init` is released once with `embeddings_free`
//! - a buffer from a successful encode is released once with
//!   `embeddings_free_result`, passing back the same length
//! - a failed call leaves `*embeddings_out = NULL` and `*len_out = 0`
//!
//! No panic crosses the boundary; a caught panic is reported as failure.

use std::ffi::{CStr, c_char};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::ptr;

use embeddings_core::{EmbeddingsHandle, ResultBuffer};
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable read by [`embeddings_enable_logging`]
pub const LOG_ENV: &str = "EMBEDDINGS_LOG";

// ============================================================================
// HELPERS
// ============================================================================

/// Run `f`, converting a panic into `fallback`
fn guarded<T>(entry: &str, fallback: T, f: impl FnOnce() -> T) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            error!("{} panicked; reporting failure", entry);
            fallback
        }
    }
}

fn c_path<'a>(raw: &'a CStr, what: &str) -> Option<&'a Path> {
    match raw.to_str() {
        Ok(path) => Some(Path::new(path)),
        Err(_) => {
            warn!("{} path is not valid UTF-8", what);
            None
        }
    }
}

/// # Safety
///
/// Both pointers must be valid for writes.
unsafe fn clear_outputs(embeddings_out: *mut *mut f32, len_out: *mut usize) {
    unsafe {
        *embeddings_out = ptr::null_mut();
        *len_out = 0;
    }
}

/// # Safety
///
/// Both pointers must be valid for writes.
unsafe fn publish(buffer: ResultBuffer, embeddings_out: *mut *mut f32, len_out: *mut usize) {
    let (data, len) = buffer.into_raw_parts();
    unsafe {
        *embeddings_out = data;
        *len_out = len;
    }
}

// ============================================================================
// HANDLE LIFECYCLE
// ============================================================================

/// Load a model and tokenizer. Returns NULL on error.
///
/// Configuration comes from `EMBEDDINGS_CONFIG` and `EMBEDDINGS_*` variables.
///
/// # Safety
///
/// Non-null arguments must be NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn embeddings_init(
    model_path: *const c_char,
    tokenizer_path: *const c_char,
) -> *mut EmbeddingsHandle {
    if model_path.is_null() || tokenizer_path.is_null() {
        warn!("embeddings_init called with a null path");
        return ptr::null_mut();
    }

    // SAFETY: non-null and NUL-terminated per the contract above
    let model_path = unsafe { CStr::from_ptr(model_path) };
    let tokenizer_path = unsafe { CStr::from_ptr(tokenizer_path) };

    guarded("embeddings_init", ptr::null_mut(), || {
        let (Some(model), Some(tokenizer)) =
            (c_path(model_path, "model"), c_path(tokenizer_path, "tokenizer"))
        else {
            return ptr::null_mut();
        };

        match EmbeddingsHandle::open(model, tokenizer) {
            Ok(handle) => {
                debug!("embeddings_init: dimension {}", handle.dimension());
                Box::into_raw(Box::new(handle))
            }
            Err(e) => {
                error!("embeddings_init failed ({}): {}", e.kind(), e);
                ptr::null_mut()
            }
        }
    })
}

/// Release a handle. NULL is ignored.
///
/// # Safety
///
/// `handle` must come from `embeddings_init`, must not have been freed, and
/// must not be in use by another thread.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn embeddings_free(handle: *mut EmbeddingsHandle) {
    if handle.is_null() {
        return;
    }
    // SAFETY: produced by Box::into_raw in embeddings_init and released once
    let handle = unsafe { Box::from_raw(handle) };
    guarded("embeddings_free", (), move || handle.close());
}

/// Output vector length for a handle, or 0 for NULL.
///
/// # Safety
///
/// A non-null `handle` must be live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn embeddings_get_dimension(handle: *const EmbeddingsHandle) -> usize {
    if handle.is_null() {
        return 0;
    }
    // SAFETY: live handle per the contract above
    let handle = unsafe { &*handle };
    guarded("embeddings_get_dimension", 0, || handle.dimension())
}

// ============================================================================
// ENCODING
// ============================================================================

/// Embed one NUL-terminated text.
///
/// On success `*embeddings_out` holds `*len_out` floats (the handle's
/// dimension) that the caller releases with `embeddings_free_result`.
///
/// # Safety
///
/// `handle` must be live, `text` NUL-terminated, and both out pointers valid
/// for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn embeddings_encode(
    handle: *const EmbeddingsHandle,
    text: *const c_char,
    embeddings_out: *mut *mut f32,
    len_out: *mut usize,
) -> bool {
    if handle.is_null() || text.is_null() || embeddings_out.is_null() || len_out.is_null() {
        warn!("embeddings_encode called with a null argument");
        return false;
    }
    // SAFETY: out pointers are non-null and writable per the contract above
    unsafe { clear_outputs(embeddings_out, len_out) };

    // SAFETY: live handle and NUL-terminated text per the contract above
    let handle = unsafe { &*handle };
    let text = unsafe { CStr::from_ptr(text) };

    let encoded = guarded("embeddings_encode", None, || {
        match handle.encode_bytes(text.to_bytes()) {
            Ok(buffer) => Some(buffer),
            Err(e) => {
                warn!("embeddings_encode failed ({}): {}", e.kind(), e);
                None
            }
        }
    });

    match encoded {
        Some(buffer) => {
            // SAFETY: checked above
            unsafe { publish(buffer, embeddings_out, len_out) };
            true
        }
        None => false,
    }
}

/// Embed `num_texts` NUL-terminated texts into one buffer.
///
/// On success `*len_out` is `num_texts * dimension` and vectors appear in
/// input order. An empty batch succeeds with `*embeddings_out = NULL` and
/// `*len_out = 0`. Any failing item fails the whole call.
///
/// # Safety
///
/// `handle` must be live, `texts` must point to `num_texts` NUL-terminated
/// strings (it may be NULL only when `num_texts` is 0), and both out pointers
/// must be valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn embeddings_encode_batch(
    handle: *const EmbeddingsHandle,
    texts: *const *const c_char,
    num_texts: usize,
    embeddings_out: *mut *mut f32,
    len_out: *mut usize,
) -> bool {
    if handle.is_null() || embeddings_out.is_null() || len_out.is_null() {
        warn!("embeddings_encode_batch called with a null argument");
        return false;
    }
    if texts.is_null() && num_texts > 0 {
        warn!("embeddings_encode_batch: null texts with count {}", num_texts);
        return false;
    }
    // SAFETY: out pointers are non-null and writable per the contract above
    unsafe { clear_outputs(embeddings_out, len_out) };
    if num_texts == 0 {
        return true;
    }

    // SAFETY: live handle; `texts` holds `num_texts` entries per the contract above
    let handle = unsafe { &*handle };
    let raw_texts = unsafe { std::slice::from_raw_parts(texts, num_texts) };

    let mut inputs: Vec<&[u8]> = Vec::with_capacity(num_texts);
    for (index, &raw) in raw_texts.iter().enumerate() {
        if raw.is_null() {
            warn!("embeddings_encode_batch: text {} is null", index);
            return false;
        }
        // SAFETY: non-null and NUL-terminated per the contract above
        inputs.push(unsafe { CStr::from_ptr(raw) }.to_bytes());
    }

    let encoded = guarded("embeddings_encode_batch", None, || {
        match handle.encode_batch(&inputs) {
            Ok(batch) => Some(batch.into_buffer()),
            Err(e) => {
                warn!("embeddings_encode_batch failed ({}): {}", e.kind(), e);
                None
            }
        }
    });

    match encoded {
        Some(buffer) => {
            // SAFETY: checked above
            unsafe { publish(buffer, embeddings_out, len_out) };
            true
        }
        None => false,
    }
}

/// Release a buffer from a successful encode. `(NULL, 0)` is a no-op.
///
/// May be called from any thread.
///
/// # Safety
///
/// `embeddings` and `len` must be exactly what an encode call returned, and
/// the buffer must not have been released already.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn embeddings_free_result(embeddings: *mut f32, len: usize) {
    // SAFETY: pair produced by ResultBuffer::into_raw_parts per the contract above
    let buffer = unsafe { ResultBuffer::from_raw_parts(embeddings, len) };
    guarded("embeddings_free_result", (), move || drop(buffer));
}

// ============================================================================
// LOGGING
// ============================================================================

/// Install a stderr log subscriber filtered by `EMBEDDINGS_LOG` (or `RUST_LOG`).
///
/// Returns true if this call installed it; later calls do nothing and
/// return false.
#[unsafe(no_mangle)]
pub extern "C" fn embeddings_enable_logging() -> bool {
    guarded("embeddings_enable_logging", false, || {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn"));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_ansi(false)
            .try_init()
            .is_ok()
    })
}

// ============================================================================
// TESTS
// ============================================================================
