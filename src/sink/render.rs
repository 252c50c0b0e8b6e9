//! Device-side render path for one sink.

use std::sync::Arc;

use super::buffer::BufferReader;
use super::{SinkFeed, MAX_OUTPUT_DELAY_MS};
use crate::format::{decode_into, AudioFormat};
use crate::SinkError;

/// Pulls audio for one output device.
///
/// Output backends call [`render`](Self::render) from the device callback
/// with the buffer the device wants filled. Each call:
///
/// 1. pops whole frames from the sink's buffer and decodes them to `f32`
/// 2. zero-fills whatever the buffer could not supply (an underrun)
/// 3. applies the sink's output delay
/// 4. runs the effect chain
/// 5. scales by the sink's volume
pub struct SinkRenderer {
    feed: Arc<SinkFeed>,
    reader: BufferReader,
    format: AudioFormat,
    scratch: Vec<u8>,
    delay: DelayLine,
}

impl SinkRenderer {
    pub(crate) fn new(feed: Arc<SinkFeed>, reader: BufferReader, format: AudioFormat) -> Self {
        Self {
            feed,
            reader,
            format,
            scratch: Vec::new(),
            delay: DelayLine::new(&format),
        }
    }

    /// Format the renderer decodes; devices must be opened with it.
    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    /// Fills `out` with interleaved samples.
    pub fn render(&mut self, out: &mut [f32]) {
        let want = out.len() * self.format.encoding.bytes_per_sample();
        if self.scratch.len() < want {
            self.scratch.resize(want, 0);
        }

        let got = self.reader.pop_frames(&mut self.scratch[..want]);
        let decoded = decode_into(&self.scratch[..got], self.format.encoding, out);
        if decoded < out.len() {
            out[decoded..].fill(0.0);
            self.feed.record_underrun();
        }

        let delay_frames = self.feed.delay_frames(self.format.sample_rate);
        self.delay.process(out, delay_frames);

        self.feed.chain.lock().process(out);

        let volume = self.feed.volume();
        if volume < 1.0 {
            for sample in out.iter_mut() {
                *sample *= volume;
            }
        }
    }

    /// Returns a handle that reports device errors against this sink.
    ///
    /// Backends install it in their stream error callback.
    pub fn error_reporter(&self) -> impl Fn(SinkError) + Send + Sync + 'static {
        let feed = Arc::clone(&self.feed);
        move |error| feed.report(error)
    }
}

/// Interleaved output delay, sized once for the longest delay.
struct DelayLine {
    buffer: Vec<f32>,
    channels: usize,
    write: usize,
}

impl DelayLine {
    fn new(format: &AudioFormat) -> Self {
        let channels = usize::from(format.channels.max(1));
        let max_frames = format.samples_for_ms(MAX_OUTPUT_DELAY_MS) / channels;
        Self {
            buffer: vec![0.0; (max_frames + 1) * channels],
            channels,
            write: 0,
        }
    }

    fn max_frames(&self) -> usize {
        self.buffer.len() / self.channels - 1
    }

    /// History is always recorded so raising the delay replays real audio.
    fn process(&mut self, block: &mut [f32], delay_frames: usize) {
        let len = self.buffer.len();
        let lag = delay_frames.min(self.max_frames()) * self.channels;
        for sample in block.iter_mut() {
            self.buffer[self.write] = *sample;
            *sample = self.buffer[(self.write + len - lag) % len];
            self.write = (self.write + 1) % len;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::SampleEncoding;

    fn mono(rate: u32) -> AudioFormat {
        AudioFormat::new(rate, 1, SampleEncoding::Float32)
    }

    #[test]
    fn test_zero_delay_is_identity() {
        let mut line = DelayLine::new(&mono(1000));
        let mut block = [0.1f32, 0.2, 0.3];
        line.process(&mut block, 0);
        assert_eq!(block, [0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_delay_shifts_by_frames() {
        let format = AudioFormat::new(1000, 2, SampleEncoding::Float32);
        let mut line = DelayLine::new(&format);
        assert_eq!(line.max_frames(), 2000);

        let mut block = [1.0f32, -1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        line.process(&mut block, 2);
        assert_eq!(block, [0.0, 0.0, 0.0, 0.0, 1.0, -1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_delay_is_capped() {
        let mut line = DelayLine::new(&mono(100));
        let max = line.max_frames();
        assert_eq!(max, 200);

        let mut block = vec![0.0f32; 400];
        block[0] = 1.0;
        line.process(&mut block, 10_000);
        assert_eq!(block[max], 1.0);
        assert_eq!(block.iter().filter(|s| **s != 0.0).count(), 1);
    }
}
