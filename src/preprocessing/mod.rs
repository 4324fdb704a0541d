//! Audio preprocessing modules
//!
//! This module contains utilities for preparing audio for analysis:
//! - Channel mixing (multi-channel to mono)
//! - Sample rate conversion
//! - Block segmentation
//! - Silence detection
//! - Feature row normalization

pub mod blocks;
pub mod channel_mixer;
pub mod normalization;
pub mod resample;
pub mod silence;
