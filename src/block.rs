//! Captured PCM block with format metadata.

use std::time::Duration;

use crate::format::AudioFormat;

/// A block of interleaved PCM bytes delivered by a capture callback.
///
/// `RawBlock` borrows the capture backend's buffer. It is only valid for the
/// duration of the callback; the router copies the bytes into every sink's
/// buffer and never retains the block itself.
///
/// # Example
///
/// ```
/// use echo_route::{AudioFormat, RawBlock, SampleEncoding};
/// use std::time::Duration;
///
/// let format = AudioFormat::new(48000, 2, SampleEncoding::Float32);
/// let bytes = vec![0u8; 4800 * 8];
/// let block = RawBlock::new(&bytes, format);
/// assert_eq!(block.frame_count(), 4800);
/// assert_eq!(block.duration(), Duration::from_millis(100));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RawBlock<'a> {
    bytes: &'a [u8],
    format: AudioFormat,
}

impl<'a> RawBlock<'a> {
    /// Wraps captured bytes produced under `format`.
    pub fn new(bytes: &'a [u8], format: AudioFormat) -> Self {
        Self { bytes, format }
    }

    /// The interleaved PCM bytes.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// The format the bytes were produced under.
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Number of whole frames in this block.
    pub fn frame_count(&self) -> usize {
        self.format.frames_in(self.bytes.len())
    }

    /// Playback duration of this block.
    pub fn duration(&self) -> Duration {
        if self.format.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count() as f64 / f64::from(self.format.sample_rate))
    }

    /// Returns `true` if this block carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
