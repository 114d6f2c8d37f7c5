//! # Audio Conversion Module
//!
//! Turns a stored WAV file into telephony audio: 8 kHz, 8-bit G.711 A-law.
//!
//! ## Key Components:
//! - **Container Parser** (`wav`): RIFF/WAVE chunk walk producing an `AudioStreamDescriptor`
//! - **Resampler** (`resample`): linear-interpolation rate conversion to the target rate
//! - **Companding Encoder** (`alaw`): 16-bit linear PCM to G.711 A-law bytes
//! - **Conversion Pipeline** (`pipeline`): policy checks, then resample, then encode
//!
//! ## Data Flow:
//! raw bytes → descriptor (format + PCM bytes) → i16 samples → (resampled) samples → A-law bytes
//!
//! ## Error Taxonomy:
//! Every failure is a `ConversionError`, classified by `ErrorKind` so the HTTP layer
//! can tell "bad input" apart from "processing failure". Nothing here is retried:
//! the same file always fails the same way.

pub mod alaw;       // G.711 A-law companding
pub mod pipeline;   // Stage orchestration and policy
pub mod resample;   // Sample rate conversion
pub mod wav;        // RIFF/WAVE container parsing

pub use pipeline::{ConversionPipeline, ConversionPolicy, EncodedAudio};
pub use wav::AudioStreamDescriptor;

use std::io;
use thiserror::Error;

/// Broad category of a conversion failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or unsupported container
    Format,
    /// Stream ended before the declared data was available
    Io,
    /// Valid audio that violates the channel/bit-depth policy
    Policy,
    /// Invalid numeric input such as a zero sample rate
    Value,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Format => "format_error",
            ErrorKind::Io => "io_error",
            ErrorKind::Policy => "policy_error",
            ErrorKind::Value => "value_error",
        }
    }
}

/// Everything that can go wrong between reading WAV bytes and producing A-law bytes.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("not a WAV container")]
    NotWavContainer,

    #[error("expected format chunk")]
    ExpectedFormatChunk,

    #[error("format chunk too short: {0} bytes declared, 16 required")]
    FormatChunkTooShort(u32),

    #[error("unsupported encoding: format tag {0}")]
    UnsupportedEncoding(u16),

    #[error("missing data chunk")]
    MissingDataChunk,

    #[error("PCM payload of {len} bytes is not a whole number of {frame_size}-byte frames")]
    MisalignedPayload { len: usize, frame_size: usize },

    #[error("truncated file: expected {expected} bytes of PCM data, found {actual}")]
    Truncated { expected: u64, actual: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("mono audio required (file has {0} channels)")]
    MonoRequired(u16),

    #[error("16-bit audio required (file has {0} bits per sample)")]
    BitDepthRequired(u16),

    #[error("invalid source sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("invalid target sample rate: {0}")]
    InvalidTargetRate(u32),
}

impl ConversionError {
    /// Classify this error into the four-way taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConversionError::NotWavContainer
            | ConversionError::ExpectedFormatChunk
            | ConversionError::FormatChunkTooShort(_)
            | ConversionError::UnsupportedEncoding(_)
            | ConversionError::MissingDataChunk
            | ConversionError::MisalignedPayload { .. } => ErrorKind::Format,
            ConversionError::Truncated { .. } | ConversionError::Io(_) => ErrorKind::Io,
            ConversionError::MonoRequired(_) | ConversionError::BitDepthRequired(_) => ErrorKind::Policy,
            ConversionError::InvalidSampleRate(_) | ConversionError::InvalidTargetRate(_) => ErrorKind::Value,
        }
    }
}
