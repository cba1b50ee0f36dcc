//! Mocks: inference backends and test text

mod backends;
mod texts;

pub use backends::{FailingBackend, HashBackend};
pub use texts::{SPECIAL_TOKENS, TestTexts, WORDS, word_id};
