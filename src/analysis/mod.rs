//! Block-wise inference
//!
//! - Inference session (model + extractor, loaded once)
//! - Probability traces, per-block labels and the aggregate verdict

pub mod detector;
pub mod result;
