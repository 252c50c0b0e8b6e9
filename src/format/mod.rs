//! Audio format description and PCM conversion utilities.
//!
//! This module provides:
//! - [`AudioFormat`]: the sample rate, channel count, and encoding negotiated
//!   with the capture endpoint for a session
//! - Sample conversion between interleaved PCM bytes and `f32` sample blocks

mod convert;

pub use convert::{decode_into, encode_samples, f32_to_i16, i16_to_f32};

use std::fmt;
use std::time::Duration;

/// Encoding of a single PCM sample in a captured byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleEncoding {
    /// Signed 16-bit little-endian integer.
    Pcm16,
    /// Signed 24-bit little-endian integer, packed in 3 bytes.
    Pcm24,
    /// IEEE-754 32-bit little-endian float.
    Float32,
}

impl SampleEncoding {
    /// Number of bytes one sample occupies.
    #[must_use]
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::Pcm16 => 2,
            Self::Pcm24 => 3,
            Self::Float32 => 4,
        }
    }

    /// Number of bits per sample (16, 24, or 32).
    #[must_use]
    pub const fn bits_per_sample(self) -> u16 {
        match self {
            Self::Pcm16 => 16,
            Self::Pcm24 => 24,
            Self::Float32 => 32,
        }
    }
}

impl fmt::Display for SampleEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pcm16 => f.write_str("16-bit PCM"),
            Self::Pcm24 => f.write_str("24-bit PCM"),
            Self::Float32 => f.write_str("32-bit float"),
        }
    }
}

/// Format of the audio flowing through a routing session.
///
/// The format is fixed for the lifetime of a capture session. Changing it
/// requires stopping the router and starting it again, which rebuilds every
/// sink's buffer and effect state.
///
/// # Example
///
/// ```
/// use echo_route::{AudioFormat, SampleEncoding};
///
/// let format = AudioFormat::new(48000, 2, SampleEncoding::Float32);
/// assert_eq!(format.block_align(), 8);
/// assert_eq!(format.byte_rate(), 384_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Per-sample encoding.
    pub encoding: SampleEncoding,
}

impl AudioFormat {
    /// Creates a new format.
    #[must_use]
    pub const fn new(sample_rate: u32, channels: u16, encoding: SampleEncoding) -> Self {
        Self {
            sample_rate,
            channels,
            encoding,
        }
    }

    /// Bytes per interleaved frame (one sample for every channel).
    #[must_use]
    pub const fn block_align(&self) -> usize {
        self.encoding.bytes_per_sample() * self.channels as usize
    }

    /// Bytes per second of audio.
    #[must_use]
    pub const fn byte_rate(&self) -> usize {
        self.block_align() * self.sample_rate as usize
    }

    /// Number of whole bytes covering `duration`, rounded down to a frame boundary.
    #[must_use]
    pub fn bytes_for(&self, duration: Duration) -> usize {
        let frames = (f64::from(self.sample_rate) * duration.as_secs_f64()) as usize;
        frames * self.block_align()
    }

    /// Number of frames contained in `byte_len` bytes.
    #[must_use]
    pub const fn frames_in(&self, byte_len: usize) -> usize {
        let align = self.block_align();
        if align == 0 {
            return 0;
        }
        byte_len / align
    }

    /// Number of interleaved samples covering `ms` milliseconds.
    #[must_use]
    pub fn samples_for_ms(&self, ms: u32) -> usize {
        let frames = (u64::from(self.sample_rate) * u64::from(ms) / 1000) as usize;
        frames * self.channels as usize
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz/{}ch/{}",
            self.sample_rate, self.channels, self.encoding
        )
    }
}
