//! Test Text Factory
//!
//! Sentences over the shared test vocabulary, plus byte strings that
//! exercise the decode policy.

/// Special tokens, ids 0..4
pub const SPECIAL_TOKENS: [&str; 4] = ["[UNK]", "[PAD]", "[CLS]", "[SEP]"];

/// Vocabulary words, ids 4.. in order
pub const WORDS: [&str; 24] = [
    "the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog", "memory", "vector", "model",
    "token", "search", "index", "query", "result", "cache", "graph", "node", "edge", "batch",
    "thread", "buffer", "poison",
];

/// Token id of a vocabulary word
pub fn word_id(word: &str) -> Option<i64> {
    SPECIAL_TOKENS
        .iter()
        .chain(WORDS.iter())
        .position(|token| *token == word)
        .map(|id| id as i64)
}

/// Factory for test input
pub struct TestTexts;

impl TestTexts {
    /// Bytes with no decodable character
    pub const UNDECODABLE: &'static [u8] = b"\xFF\xFE\xFD\x80";

    /// Bytes with one invalid sequence among valid words
    pub const MIXED: &'static [u8] = b"quick \xFF brown";

    /// Deterministic sentence of `words` vocabulary words
    ///
    /// "poison" is never produced.
    pub fn sentence(words: usize, seed: usize) -> String {
        let usable = WORDS.len() - 1;
        (0..words)
            .map(|i| WORDS[(seed.wrapping_mul(7).wrapping_add(i * 3)) % usable])
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// `count` sentences of varying length
    pub fn corpus(count: usize) -> Vec<String> {
        (0..count)
            .map(|i| format!("{} {}", Self::sentence(3 + i % 9, i), WORDS[i % 8]))
            .collect()
    }
}
