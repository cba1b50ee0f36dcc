//! Test harness: isolated model directories and handle construction

mod model_dir;

pub use model_dir::{TEST_DIMENSION, TestModelDir, real_model_dir};
