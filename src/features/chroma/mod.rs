//! Chroma extraction modules
//!
//! Project spectral energy onto the 12 pitch classes:
//! - Filter banks (STFT bins and constant-Q bins to chroma)
//! - Per-frame normalization strategies
//! - Chromagram computation

pub mod extractor;
pub mod filters;
pub mod normalization;
