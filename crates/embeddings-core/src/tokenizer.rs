//! Tokenizer Adapter
//!
//! Wraps a Hugging Face `tokenizer.json` and turns text into bounded
//! `input_ids` / `attention_mask` / `token_type_ids` sequences.
//!
//! Byte input follows a best-effort decode policy: invalid sequences are
//! replaced with U+FFFD, and only input with no decodable character at all
//! is rejected.

use std::borrow::Cow;
use std::fmt;
use std::path::Path;

use tokenizers::Tokenizer as HfTokenizer;
use tracing::{debug, warn};

use crate::error::{EncodeError, EncodeResult, LoadError, LoadResult};

/// Tokenizer wrapper for preparing model inputs
pub struct TokenizerAdapter {
    inner: HfTokenizer,
    max_length: usize,
    add_special_tokens: bool,
}

impl fmt::Debug for TokenizerAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenizerAdapter")
            .field("max_length", &self.max_length)
            .field("add_special_tokens", &self.add_special_tokens)
            .field("vocab_size", &self.vocab_size())
            .finish_non_exhaustive()
    }
}

impl TokenizerAdapter {
    /// Load a tokenizer from a `tokenizer.json` file
    pub fn from_file(path: impl AsRef<Path>) -> LoadResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(LoadError::MissingFile {
                what: "tokenizer",
                path: path.to_path_buf(),
            });
        }
        debug!("Loading tokenizer from {:?}", path);

        let inner = HfTokenizer::from_file(path)
            .map_err(|e| LoadError::Tokenizer(format!("{}: {}", path.display(), e)))?;

        Ok(Self {
            inner,
            max_length: crate::config::DEFAULT_MAX_SEQUENCE_LENGTH,
            add_special_tokens: true,
        })
    }

    /// Set the maximum sequence length
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Control whether the post-processor adds special tokens
    pub fn with_special_tokens(mut self, add_special_tokens: bool) -> Self {
        self.add_special_tokens = add_special_tokens;
        self
    }

    /// Maximum sequence length
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Vocabulary size including added tokens
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }

    /// Tokenize one text
    pub fn encode(&self, text: &str) -> EncodeResult<TokenizedInput> {
        let encoding = self
            .inner
            .encode(text, self.add_special_tokens)
            .map_err(|e| EncodeError::Tokenization(e.to_string()))?;

        let mut input = TokenizedInput {
            input_ids: encoding.get_ids().iter().map(|&id| id as i64).collect(),
            attention_mask: encoding
                .get_attention_mask()
                .iter()
                .map(|&m| m as i64)
                .collect(),
            token_type_ids: encoding.get_type_ids().iter().map(|&t| t as i64).collect(),
        };

        if input.len() > self.max_length {
            debug!(
                "Truncating sequence from {} to {} tokens",
                input.len(),
                self.max_length
            );
            input.truncate(self.max_length);
        }

        Ok(input)
    }

    /// Tokenize raw bytes using the best-effort decode policy
    pub fn encode_bytes(&self, bytes: &[u8]) -> EncodeResult<TokenizedInput> {
        let text = decode_text(bytes)?;
        self.encode(&text)
    }
}

/// Decode bytes as UTF-8, substituting invalid sequences
///
/// Fails only when no part of the input is valid UTF-8.
pub fn decode_text(bytes: &[u8]) -> EncodeResult<Cow<'_, str>> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(Cow::Borrowed(text)),
        Err(_) => {
            if bytes.utf8_chunks().all(|chunk| chunk.valid().is_empty()) {
                return Err(EncodeError::Undecodable);
            }
            let lossy = String::from_utf8_lossy(bytes);
            warn!(
                "Input contained invalid UTF-8 ({} bytes), substituted replacement characters",
                bytes.len()
            );
            Ok(lossy)
        }
    }
}

/// Tokenized input for a single text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenizedInput {
    /// Token IDs
    pub input_ids: Vec<i64>,
    /// Attention mask (1 for real tokens)
    pub attention_mask: Vec<i64>,
    /// Token type IDs
    pub token_type_ids: Vec<i64>,
}

impl TokenizedInput {
    /// Sequence length
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    /// True when the sequence has no tokens
    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    /// Keep only the first `max_length` positions
    pub fn truncate(&mut self, max_length: usize) {
        self.input_ids.truncate(max_length);
        self.attention_mask.truncate(max_length);
        self.token_type_ids.truncate(max_length);
    }

    /// Build a sequence from ids alone (mask all ones, type ids zero)
    pub fn from_ids(input_ids: Vec<i64>) -> Self {
        let len = input_ids.len();
        Self {
            input_ids,
            attention_mask: vec![1; len],
            token_type_ids: vec![0; len],
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
