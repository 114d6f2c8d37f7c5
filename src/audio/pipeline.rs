//! # Conversion Pipeline
//!
//! Runs a parsed WAV stream through policy checks, resampling, and A-law encoding.
//!
//! ## Stage Order (fixed):
//! 1. **Policy**: mono and 16-bit only, payload must be whole frames
//! 2. **Resample**: only when the source rate differs from the target rate
//! 3. **Encode**: G.711 A-law, one byte per sample
//!
//! Policy violations are rejected before any numeric work is spent.
//!
//! ## Configuration:
//! The target rate comes from a `ConversionPolicy` passed in at construction time
//! rather than from a global, so alternate policies can coexist (in tests, or after a
//! runtime config update).

use super::alaw;
use super::resample::{self, TELEPHONY_SAMPLE_RATE};
use super::wav::AudioStreamDescriptor;
use super::ConversionError;
use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

/// Content type attached to every encoded buffer (RFC 4856 name for G.711 A-law)
pub const ALAW_CONTENT_TYPE: &str = "audio/PCMA";

const REQUIRED_CHANNELS: u16 = 1;
const REQUIRED_BITS_PER_SAMPLE: u16 = 16;

/// Tunable parts of the conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionPolicy {
    /// Output sample rate in Hz
    pub target_sample_rate: u32,
}

impl Default for ConversionPolicy {
    fn default() -> Self {
        Self {
            target_sample_rate: TELEPHONY_SAMPLE_RATE,
        }
    }
}

/// Result of a successful conversion, ready to hand to the forwarder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAudio {
    /// A-law bytes, one per sample, no container
    pub frames: Vec<u8>,

    /// Rate of `frames` in Hz
    pub sample_rate: u32,

    /// Fixed content type identifying G.711 A-law
    pub content_type: &'static str,
}

impl EncodedAudio {
    pub fn sample_count(&self) -> usize {
        self.frames.len()
    }
}

type ResampleStage = dyn Fn(&[i16], u32, u32) -> Result<Vec<i16>, ConversionError> + Send + Sync;
type EncodeStage = dyn Fn(&[i16]) -> Vec<u8> + Send + Sync;

/// Orchestrates the conversion stages under a `ConversionPolicy`.
///
/// ## Thread Safety:
/// Holds no mutable state; a single pipeline can serve any number of concurrent
/// conversions, each with its own buffers.
pub struct ConversionPipeline {
    policy: ConversionPolicy,
    resample: Box<ResampleStage>,
    encode: Box<EncodeStage>,
}

impl ConversionPipeline {
    /// Pipeline with the standard resampler and A-law encoder.
    pub fn new(policy: ConversionPolicy) -> Self {
        Self::with_stages(policy, resample::resample, alaw::encode)
    }

    /// Pipeline with caller-supplied stages (used to observe stage invocation).
    pub fn with_stages<R, E>(policy: ConversionPolicy, resample: R, encode: E) -> Self
    where
        R: Fn(&[i16], u32, u32) -> Result<Vec<i16>, ConversionError> + Send + Sync + 'static,
        E: Fn(&[i16]) -> Vec<u8> + Send + Sync + 'static,
    {
        Self {
            policy,
            resample: Box::new(resample),
            encode: Box::new(encode),
        }
    }

    pub fn policy(&self) -> ConversionPolicy {
        self.policy
    }

    /// Convert a parsed stream to A-law at the policy's target rate.
    ///
    /// ## Errors:
    /// - `MonoRequired` / `BitDepthRequired` for anything but mono 16-bit
    /// - `MisalignedPayload` when the payload is not a whole number of frames
    /// - whatever the resample stage reports (zero rates)
    pub fn convert(&self, descriptor: &AudioStreamDescriptor) -> Result<EncodedAudio, ConversionError> {
        let samples = self.validated_samples(descriptor)?;
        let target_rate = self.policy.target_sample_rate;

        let samples = if descriptor.sample_rate != target_rate {
            let resampled = (self.resample)(&samples, descriptor.sample_rate, target_rate)?;
            debug!(
                from_rate = descriptor.sample_rate,
                to_rate = target_rate,
                samples_in = samples.len(),
                samples_out = resampled.len(),
                "Resampled"
            );
            resampled
        } else {
            samples
        };

        Ok(EncodedAudio {
            frames: (self.encode)(&samples),
            sample_rate: target_rate,
            content_type: ALAW_CONTENT_TYPE,
        })
    }

    fn validated_samples(&self, descriptor: &AudioStreamDescriptor) -> Result<Vec<i16>, ConversionError> {
        if descriptor.channel_count != REQUIRED_CHANNELS {
            return Err(ConversionError::MonoRequired(descriptor.channel_count));
        }
        if descriptor.bits_per_sample != REQUIRED_BITS_PER_SAMPLE {
            return Err(ConversionError::BitDepthRequired(descriptor.bits_per_sample));
        }

        let frame_size = descriptor.frame_size();
        let len = descriptor.pcm_data.len();
        if len % frame_size != 0 {
            return Err(ConversionError::MisalignedPayload { len, frame_size });
        }

        let mut samples = vec![0i16; len / frame_size];
        LittleEndian::read_i16_into(&descriptor.pcm_data, &mut samples);
        Ok(samples)
    }
}

impl Default for ConversionPipeline {
    fn default() -> Self {
        Self::new(ConversionPolicy::default())
    }
}
