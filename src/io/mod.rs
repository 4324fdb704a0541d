//! Audio I/O modules
//!
//! Audio decoding with Symphonia and loading into mono waveforms at the analysis
//! sample rate.

pub mod decoder;
pub mod loader;
pub mod waveform;

pub use decoder::{decode_audio, AudioSource, DecodedAudio};
pub use loader::{load_waveform, load_waveform_or_empty};
pub use waveform::Waveform;
