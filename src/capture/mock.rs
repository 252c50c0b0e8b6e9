//! Mock capture backend for testing without hardware.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{BlockCallback, CaptureBackend, CaptureErrorCallback};
use crate::block::RawBlock;
use crate::format::{encode_samples, AudioFormat, SampleEncoding};
use crate::RouterError;

/// A capture backend fed by hand through a [`MockCaptureFeed`].
///
/// Blocks pushed into the feed are delivered synchronously on the pushing
/// thread, which makes pipeline tests deterministic.
///
/// # Example
///
/// ```
/// use echo_route::{AudioFormat, MockCapture, SampleEncoding};
///
/// let format = AudioFormat::new(48000, 2, SampleEncoding::Float32);
/// let (capture, feed) = MockCapture::new(format);
///
/// // Not started yet, so nothing is delivered
/// assert!(!feed.push_sine(440.0, 10));
/// # drop(capture);
/// ```
pub struct MockCapture {
    shared: Arc<Mutex<MockShared>>,
    unavailable: Option<String>,
}

/// Pushes audio into a started [`MockCapture`].
#[derive(Clone)]
pub struct MockCaptureFeed {
    shared: Arc<Mutex<MockShared>>,
}

struct MockShared {
    format: AudioFormat,
    on_block: Option<BlockCallback>,
    on_error: Option<CaptureErrorCallback>,
    endpoint: Option<String>,
    phase: f64,
}

impl MockCapture {
    /// Creates a backend producing `format` and the feed that drives it.
    pub fn new(format: AudioFormat) -> (Self, MockCaptureFeed) {
        let shared = Arc::new(Mutex::new(MockShared {
            format,
            on_block: None,
            on_error: None,
            endpoint: None,
            phase: 0.0,
        }));
        let feed = MockCaptureFeed {
            shared: Arc::clone(&shared),
        };
        (
            Self {
                shared,
                unavailable: None,
            },
            feed,
        )
    }

    /// Creates a backend whose `start` always fails.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let (mut capture, _) = Self::new(AudioFormat::new(0, 0, SampleEncoding::Float32));
        capture.unavailable = Some(reason.into());
        capture
    }
}

impl CaptureBackend for MockCapture {
    fn start(
        &mut self,
        endpoint: Option<&str>,
        on_block: BlockCallback,
        on_error: CaptureErrorCallback,
    ) -> Result<AudioFormat, RouterError> {
        if let Some(reason) = &self.unavailable {
            return Err(RouterError::capture_unavailable(reason.clone()));
        }
        let mut shared = self.shared.lock();
        shared.on_block = Some(on_block);
        shared.on_error = Some(on_error);
        shared.endpoint = endpoint.map(str::to_string);
        Ok(shared.format)
    }

    fn stop(&mut self) {
        let mut shared = self.shared.lock();
        shared.on_block = None;
        shared.on_error = None;
    }

    fn name(&self) -> &'static str {
        "mock capture"
    }
}

impl MockCaptureFeed {
    /// The format blocks are delivered in.
    pub fn format(&self) -> AudioFormat {
        self.shared.lock().format
    }

    /// Endpoint id passed to the last `start`.
    pub fn endpoint(&self) -> Option<String> {
        self.shared.lock().endpoint.clone()
    }

    /// Returns `true` while the backend is started.
    pub fn is_started(&self) -> bool {
        self.shared.lock().on_block.is_some()
    }

    /// Delivers raw bytes as one block. Returns `false` if not started.
    pub fn push(&self, bytes: &[u8]) -> bool {
        let mut shared = self.shared.lock();
        let format = shared.format;
        match shared.on_block.as_mut() {
            Some(on_block) => {
                on_block(&RawBlock::new(bytes, format));
                true
            }
            None => false,
        }
    }

    /// Encodes interleaved samples in the capture format and delivers them.
    pub fn push_samples(&self, samples: &[f32]) -> bool {
        let mut bytes = Vec::new();
        encode_samples(samples, self.format().encoding, &mut bytes);
        self.push(&bytes)
    }

    /// Delivers `duration_ms` of silence.
    pub fn push_silence(&self, duration_ms: u32) -> bool {
        let samples = self.format().samples_for_ms(duration_ms);
        self.push_samples(&vec![0.0; samples])
    }

    /// Delivers `duration_ms` of a sine at half scale, same on every channel.
    ///
    /// Phase carries over between calls.
    pub fn push_sine(&self, frequency: f64, duration_ms: u32) -> bool {
        let samples = {
            let mut shared = self.shared.lock();
            let format = shared.format;
            let channels = usize::from(format.channels.max(1));
            let frames = format.samples_for_ms(duration_ms) / channels;
            let step = 2.0 * std::f64::consts::PI * frequency / f64::from(format.sample_rate.max(1));

            let mut samples = Vec::with_capacity(frames * channels);
            for _ in 0..frames {
                let value = (0.5 * shared.phase.sin()) as f32;
                samples.extend(std::iter::repeat(value).take(channels));
                shared.phase = (shared.phase + step) % (2.0 * std::f64::consts::PI);
            }
            samples
        };
        self.push_samples(&samples)
    }

    /// Reports a capture stream error. Returns `false` if not started.
    pub fn fail(&self, reason: &str) -> bool {
        let mut shared = self.shared.lock();
        match shared.on_error.as_mut() {
            Some(on_error) => {
                on_error(reason.to_string());
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn started(format: AudioFormat) -> (MockCapture, MockCaptureFeed, Arc<Mutex<Vec<u8>>>) {
        let (mut mock, feed) = MockCapture::new(format);
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        mock.start(
            None,
            Box::new(move |block| sink.lock().extend_from_slice(block.bytes())),
            Box::new(|_| {}),
        )
        .unwrap();
        (mock, feed, received)
    }

    #[test]
    fn test_push_silence_length() {
        let format = AudioFormat::new(48000, 2, SampleEncoding::Float32);
        let (_mock, feed, received) = started(format);
        assert!(feed.push_silence(100));
        assert_eq!(received.lock().len(), 4800 * 8);
        assert!(received.lock().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_push_sine_pcm16() {
        let format = AudioFormat::new(16000, 1, SampleEncoding::Pcm16);
        let (_mock, feed, received) = started(format);
        feed.push_sine(440.0, 100);

        let bytes = received.lock();
        assert_eq!(bytes.len(), 1600 * 2);
        let samples: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert!(samples.iter().any(|s| *s > 0));
        assert!(samples.iter().any(|s| *s < 0));
    }

    #[test]
    fn test_fail_reaches_error_callback() {
        let (mut mock, feed) = MockCapture::new(AudioFormat::new(48000, 2, SampleEncoding::Float32));
        let errors = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&errors);
        mock.start(
            None,
            Box::new(|_| {}),
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        assert!(feed.fail("device invalidated"));
        assert_eq!(errors.load(Ordering::SeqCst), 1);

        mock.stop();
        assert!(!feed.fail("again"));
        assert!(!feed.is_started());
    }
}
