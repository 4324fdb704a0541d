//! Audio decoding using Symphonia
//!
//! Decodes a file path or an in-memory buffer into interleaved `f32` PCM. The
//! container is probed with a hint taken from the file extension; packets that
//! fail with a recoverable decode error are skipped.

use std::fs::File;
use std::io::{Cursor, ErrorKind};
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::DetectionError;

/// Where audio comes from
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    /// File on disk
    Path(PathBuf),
    /// Encoded bytes held in memory (e.g. an upload)
    Bytes {
        /// Encoded file contents
        data: Vec<u8>,
        /// Optional container hint such as `"wav"` or `"mp3"`
        extension: Option<String>,
    },
}

impl AudioSource {
    /// Source for a file path
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        AudioSource::Path(path.into())
    }

    /// Source for an in-memory buffer
    pub fn from_bytes(data: Vec<u8>, extension: Option<&str>) -> Self {
        AudioSource::Bytes {
            data,
            extension: extension.map(str::to_string),
        }
    }

    /// Short human-readable description used in logs and errors
    pub fn describe(&self) -> String {
        match self {
            AudioSource::Path(path) => path.display().to_string(),
            AudioSource::Bytes { data, extension } => match extension {
                Some(ext) => format!("<{} bytes of {}>", data.len(), ext),
                None => format!("<{} bytes>", data.len()),
            },
        }
    }

    fn extension(&self) -> Option<String> {
        match self {
            AudioSource::Path(path) => path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase()),
            AudioSource::Bytes { extension, .. } => extension.clone(),
        }
    }
}

impl From<&Path> for AudioSource {
    fn from(path: &Path) -> Self {
        AudioSource::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for AudioSource {
    fn from(path: PathBuf) -> Self {
        AudioSource::Path(path)
    }
}

/// Decoded PCM audio
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Interleaved samples in [-1, 1]
    pub samples: Vec<f32>,
    /// Native sample rate in Hz
    pub sample_rate: u32,
    /// Channel count
    pub channels: usize,
}

impl DecodedAudio {
    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }
}

/// Decode an audio source to interleaved PCM samples
///
/// # Arguments
///
/// * `source` - File path or in-memory buffer
///
/// # Returns
///
/// Interleaved samples with the native sample rate and channel count
///
/// # Errors
///
/// Returns `DetectionError::Decode` if the container cannot be probed, no audio
/// track is present, the codec is unsupported, a non-recoverable read error occurs,
/// or no samples were decoded. A missing file is also reported as `Decode`.
pub fn decode_audio(source: &AudioSource) -> Result<DecodedAudio, DetectionError> {
    log::debug!("Decoding audio: {}", source.describe());

    let media: Box<dyn MediaSource> = match source {
        AudioSource::Path(path) => {
            let file = File::open(path).map_err(|e| {
                DetectionError::Decode(format!("Cannot open {}: {}", path.display(), e))
            })?;
            Box::new(file)
        }
        AudioSource::Bytes { data, .. } => Box::new(Cursor::new(data.clone())),
    };
    let mss = MediaSourceStream::new(media, Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = source.extension() {
        hint.with_extension(&ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| {
            DetectionError::Decode(format!("No audio track found in {}", source.describe()))
        })?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count());
    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples: Vec<f32> = Vec::new();
    let mut buffer: Option<SampleBuffer<f32>> = None;
    let mut skipped = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate.get_or_insert(spec.rate);
                channels.get_or_insert(spec.channels.count());

                let needed = decoded.capacity() * spec.channels.count();
                if buffer.as_ref().map_or(true, |buf| buf.capacity() < needed) {
                    buffer = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
                }
                if let Some(buf) = buffer.as_mut() {
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
            }
            Err(SymphoniaError::DecodeError(e)) => {
                // Corrupted packet; keep going
                skipped += 1;
                log::debug!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if skipped > 0 {
        log::warn!(
            "Skipped {} undecodable packets in {}",
            skipped,
            source.describe()
        );
    }

    let sample_rate = sample_rate.unwrap_or(0);
    let channels = channels.unwrap_or(1).max(1);

    if samples.is_empty() || sample_rate == 0 {
        return Err(DetectionError::Decode(format!(
            "No audio samples decoded from {}",
            source.describe()
        )));
    }

    log::debug!(
        "Decoded {} frames, {} channels at {} Hz",
        samples.len() / channels,
        channels,
        sample_rate
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}
