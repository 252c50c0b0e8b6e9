//! Output device backends.
//!
//! An [`OutputBackend`] opens a physical output for a sink and drives the
//! sink's [`SinkRenderer`] from the device callback. Two backends ship:
//!
//! - [`CpalOutput`]: real devices through CPAL
//! - [`MockOutput`]: in-memory devices for tests, pulled by hand

mod cpal_output;
mod mock;

pub use cpal_output::{list_output_devices, CpalOutput};
pub use mock::MockOutput;

use crate::format::AudioFormat;
use crate::sink::SinkRenderer;
use crate::SinkError;

/// An output device the router can send audio to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputDeviceInfo {
    /// Position in the host's output device list; doubles as the sink id.
    pub index: usize,
    /// Display name reported by the OS.
    pub name: String,
    /// Channel count of the device's default configuration.
    pub channels: u16,
}

impl OutputDeviceInfo {
    /// Creates a device description.
    pub fn new(index: usize, name: impl Into<String>, channels: u16) -> Self {
        Self {
            index,
            name: name.into(),
            channels,
        }
    }
}

/// An open output stream.
///
/// Dropping the stream closes the device; no render callback runs after
/// the drop returns.
pub trait PlaybackStream {
    /// Starts or resumes rendering.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Playback`] if the device refuses to start.
    fn play(&mut self) -> Result<(), SinkError>;

    /// Outputs silence while keeping the device open.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Playback`] if the device cannot be paused.
    fn pause(&mut self) -> Result<(), SinkError>;
}

/// Opens output devices for sinks.
///
/// # Implementation Notes
///
/// - `open` must not start playback; the sink calls [`PlaybackStream::play`]
/// - the device must be opened with `format` (the capture format), since
///   the renderer produces samples at that rate and channel count
/// - device errors after `open` go through
///   [`SinkRenderer::error_reporter`]
pub trait OutputBackend {
    /// Opens `device` and hands it `renderer` for its callback.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::DeviceInitFailed`] if the device is missing or
    /// cannot run with `format`.
    fn open(
        &self,
        device: &OutputDeviceInfo,
        format: &AudioFormat,
        renderer: SinkRenderer,
    ) -> Result<Box<dyn PlaybackStream>, SinkError>;

    /// Human-readable backend name for logging.
    fn name(&self) -> &'static str;
}
