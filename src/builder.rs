//! Builder pattern for [`Router`].

use crate::capture::{CaptureBackend, CpalLoopback, LoopbackCapture};
use crate::output::{CpalOutput, OutputBackend};
use crate::router::Router;
use crate::{event_callback, EventCallback, RouterConfig, RouterEvent};

/// Builder for configuring a [`Router`].
///
/// Use [`Router::builder()`] to create a new builder. Without explicit
/// backends the router captures through [`CpalLoopback`] and plays through
/// [`CpalOutput`].
///
/// # Example
///
/// ```no_run
/// use echo_route::{list_output_devices, OutputSink, Router};
///
/// let mut router = Router::builder()
///     .capture_endpoint("Speakers")
///     .on_event(|event| eprintln!("{event}"))
///     .build();
///
/// for device in list_output_devices()?.into_iter().take(2) {
///     router.add_sink(OutputSink::new(device))?;
/// }
/// router.start()?;
/// # Ok::<(), echo_route::RouterError>(())
/// ```
#[must_use]
pub struct RouterBuilder {
    /// Router configuration.
    config: RouterConfig,
    /// Capture backend, CPAL loopback when unset.
    capture: Option<Box<dyn CaptureBackend>>,
    /// Output backend, CPAL when unset.
    output: Option<Box<dyn OutputBackend>>,
    /// Event callback.
    event_callback: Option<EventCallback>,
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: RouterConfig::default(),
            capture: None,
            output: None,
            event_callback: None,
        }
    }

    /// Set custom router configuration.
    pub fn with_config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Capture a specific output endpoint instead of the system default.
    ///
    /// Ids come from [`list_capture_endpoints()`](crate::list_capture_endpoints).
    pub fn capture_endpoint(mut self, id: impl Into<String>) -> Self {
        self.config.capture_endpoint = Some(id.into());
        self
    }

    /// Use a custom capture backend.
    pub fn capture_backend<B: CaptureBackend + 'static>(mut self, backend: B) -> Self {
        self.capture = Some(Box::new(backend));
        self
    }

    /// Use a custom output backend.
    pub fn output_backend<B: OutputBackend + 'static>(mut self, backend: B) -> Self {
        self.output = Some(Box::new(backend));
        self
    }

    /// Set a callback to receive runtime events.
    ///
    /// Events include status transitions, per-sink faults, buffer overflows,
    /// and capture errors. The callback runs on audio threads and should
    /// return quickly.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(RouterEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(callback));
        self
    }

    /// Set a prebuilt event callback, such as one from
    /// [`event_channel()`](crate::event_channel).
    pub fn event_callback(mut self, callback: EventCallback) -> Self {
        self.event_callback = Some(callback);
        self
    }

    /// Builds an idle router with no sinks.
    pub fn build(self) -> Router {
        let backend = self
            .capture
            .unwrap_or_else(|| Box::new(CpalLoopback::new()));
        let output = self.output.unwrap_or_else(|| Box::new(CpalOutput::new()));
        let capture =
            LoopbackCapture::new(backend).with_endpoint(self.config.capture_endpoint.clone());

        tracing::debug!(
            capture = capture.backend_name(),
            output = output.name(),
            max_sinks = self.config.max_sinks,
            "Router built"
        );

        Router::new(self.config, capture, output, self.event_callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::MockCapture;
    use crate::format::{AudioFormat, SampleEncoding};
    use crate::output::MockOutput;
    use std::time::Duration;

    #[test]
    fn test_builder_default() {
        let builder = RouterBuilder::new();
        assert_eq!(builder.config, RouterConfig::default());
        assert!(builder.capture.is_none());
        assert!(builder.output.is_none());
        assert!(builder.event_callback.is_none());
    }

    #[test]
    fn test_builder_capture_endpoint() {
        let builder = Router::builder().capture_endpoint("Speakers");
        assert_eq!(builder.config.capture_endpoint.as_deref(), Some("Speakers"));
    }

    #[test]
    fn test_builder_config_applies() {
        let (capture, _) = MockCapture::new(AudioFormat::new(48000, 2, SampleEncoding::Float32));
        let router = Router::builder()
            .with_config(RouterConfig {
                buffer_duration: Duration::from_millis(250),
                max_sinks: 2,
                ..Default::default()
            })
            .capture_backend(capture)
            .output_backend(MockOutput::new())
            .build();

        assert_eq!(router.config().max_sinks, 2);
        assert_eq!(router.config().buffer_duration, Duration::from_millis(250));
        assert!(!router.is_running());
        assert!(router.sinks().is_empty());
    }

    #[test]
    fn test_builder_forwards_endpoint_to_capture() {
        let format = AudioFormat::new(48000, 2, SampleEncoding::Float32);
        let (capture, feed) = MockCapture::new(format);
        let mut router = Router::builder()
            .capture_endpoint("Headphones")
            .capture_backend(capture)
            .output_backend(MockOutput::new())
            .build();

        router
            .add_sink(crate::OutputSink::new(crate::OutputDeviceInfo::new(0, "A", 2)))
            .unwrap();
        router.start().unwrap();
        assert_eq!(feed.endpoint().as_deref(), Some("Headphones"));
    }
}
