//! Loopback capture of the system output mix.
//!
//! [`LoopbackCapture`] owns one [`CaptureBackend`] and tracks the format it
//! negotiated. The backend delivers [`RawBlock`]s on its own thread until
//! it is stopped.

mod cpal_loopback;
mod mock;

pub use cpal_loopback::{list_capture_endpoints, CpalLoopback};
pub use mock::{MockCapture, MockCaptureFeed};

use crate::block::RawBlock;
use crate::format::AudioFormat;
use crate::RouterError;

/// Receives every captured block, on the capture thread.
pub type BlockCallback = Box<dyn FnMut(&RawBlock<'_>) + Send>;

/// Receives capture stream errors, on the capture thread.
pub type CaptureErrorCallback = Box<dyn FnMut(String) + Send>;

/// A render endpoint whose mix can be captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureEndpoint {
    /// Identifier accepted by [`RouterConfig::capture_endpoint`](crate::RouterConfig::capture_endpoint).
    pub id: String,
    /// Name shown to users.
    pub display_name: String,
    /// Whether this is the system's default output.
    pub is_default: bool,
}

/// A source of loopback audio.
///
/// # Implementation Notes
///
/// - `start` opens `endpoint` (or the default output when `None`) and
///   returns the format every block will carry
/// - `on_block` must not be called after `stop` returns
/// - the block's bytes only need to live for the duration of the call
pub trait CaptureBackend {
    /// Opens the endpoint and begins delivering blocks.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::CaptureUnavailable`] if the endpoint does not
    /// exist, access is denied, or its sample format is unsupported.
    fn start(
        &mut self,
        endpoint: Option<&str>,
        on_block: BlockCallback,
        on_error: CaptureErrorCallback,
    ) -> Result<AudioFormat, RouterError>;

    /// Stops delivery and releases the endpoint.
    fn stop(&mut self);

    /// Human-readable backend name for logging.
    fn name(&self) -> &'static str;
}

/// Capture session over a [`CaptureBackend`].
pub struct LoopbackCapture {
    backend: Box<dyn CaptureBackend>,
    endpoint: Option<String>,
    format: Option<AudioFormat>,
}

impl LoopbackCapture {
    /// Wraps `backend`, capturing the default output.
    pub fn new(backend: Box<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            endpoint: None,
            format: None,
        }
    }

    /// Selects the endpoint to open on the next `start`.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Starts capturing and returns the negotiated format.
    ///
    /// Calling this while already capturing returns the current format and
    /// leaves the running callbacks in place.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::CaptureUnavailable`] if the backend cannot open
    /// the endpoint.
    pub fn start(
        &mut self,
        on_block: BlockCallback,
        on_error: CaptureErrorCallback,
    ) -> Result<AudioFormat, RouterError> {
        if let Some(format) = self.format {
            return Ok(format);
        }

        let format = self
            .backend
            .start(self.endpoint.as_deref(), on_block, on_error)?;
        tracing::info!(
            backend = self.backend.name(),
            endpoint = self.endpoint.as_deref().unwrap_or("default"),
            format = %format,
            "Loopback capture started"
        );
        self.format = Some(format);
        Ok(format)
    }

    /// Format of the running capture, `None` when stopped.
    pub fn current_format(&self) -> Option<AudioFormat> {
        self.format
    }

    /// Returns `true` between a successful `start` and `stop`.
    pub fn is_capturing(&self) -> bool {
        self.format.is_some()
    }

    /// Stops capturing. Idempotent; no block is delivered after it returns.
    pub fn stop(&mut self) {
        if self.format.take().is_some() {
            self.backend.stop();
            tracing::info!(backend = self.backend.name(), "Loopback capture stopped");
        }
    }

    /// Name of the wrapped backend.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}

impl Drop for LoopbackCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::SampleEncoding;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(counter: &Arc<AtomicUsize>) -> BlockCallback {
        let counter = Arc::clone(counter);
        Box::new(move |block| {
            counter.fetch_add(block.bytes().len(), Ordering::SeqCst);
        })
    }

    #[test]
    fn test_start_reports_format() {
        let format = AudioFormat::new(48000, 2, SampleEncoding::Float32);
        let (mock, feed) = MockCapture::new(format);
        let mut capture = LoopbackCapture::new(Box::new(mock));
        assert_eq!(capture.current_format(), None);

        let bytes = Arc::new(AtomicUsize::new(0));
        let started = capture.start(counting(&bytes), Box::new(|_| {})).unwrap();
        assert_eq!(started, format);
        assert!(capture.is_capturing());

        feed.push(&[0u8; 64]);
        assert_eq!(bytes.load(Ordering::SeqCst), 64);
    }

    #[test]
    fn test_second_start_is_noop() {
        let format = AudioFormat::new(44100, 2, SampleEncoding::Pcm16);
        let (mock, feed) = MockCapture::new(format);
        let mut capture = LoopbackCapture::new(Box::new(mock));

        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        capture.start(counting(&first), Box::new(|_| {})).unwrap();
        capture.start(counting(&second), Box::new(|_| {})).unwrap();

        feed.push(&[0u8; 16]);
        assert_eq!(first.load(Ordering::SeqCst), 16);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stop_is_idempotent_and_final() {
        let format = AudioFormat::new(48000, 1, SampleEncoding::Float32);
        let (mock, feed) = MockCapture::new(format);
        let mut capture = LoopbackCapture::new(Box::new(mock));

        let bytes = Arc::new(AtomicUsize::new(0));
        capture.start(counting(&bytes), Box::new(|_| {})).unwrap();
        capture.stop();
        capture.stop();

        assert!(!feed.push(&[0u8; 8]));
        assert_eq!(bytes.load(Ordering::SeqCst), 0);
        assert_eq!(capture.current_format(), None);
    }

    #[test]
    fn test_unavailable_backend() {
        let mut capture = LoopbackCapture::new(Box::new(MockCapture::unavailable("no endpoint")));
        let err = capture
            .start(Box::new(|_| {}), Box::new(|_| {}))
            .unwrap_err();
        assert!(matches!(err, RouterError::CaptureUnavailable { .. }));
        assert!(!capture.is_capturing());
    }

    #[test]
    fn test_endpoint_is_forwarded() {
        let format = AudioFormat::new(48000, 2, SampleEncoding::Float32);
        let (mock, feed) = MockCapture::new(format);
        let mut capture =
            LoopbackCapture::new(Box::new(mock)).with_endpoint(Some("Speakers".to_string()));
        capture.start(Box::new(|_| {}), Box::new(|_| {})).unwrap();
        assert_eq!(feed.endpoint().as_deref(), Some("Speakers"));
    }
}
