//! End-to-end test support
//!
//! - [`harness`]: temporary model directories and handle builders
//! - [`mocks`]: deterministic inference backends and text generators

pub mod harness;
pub mod mocks;

pub use harness::{TEST_DIMENSION, TestModelDir, real_model_dir};
pub use mocks::{FailingBackend, HashBackend, TestTexts};
