//! In-memory output backend for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{OutputBackend, OutputDeviceInfo, PlaybackStream};
use crate::format::AudioFormat;
use crate::sink::{SinkId, SinkRenderer};
use crate::SinkError;

/// Output backend whose "devices" are rendered on demand.
///
/// Nothing plays on its own: call [`pull`](Self::pull) to run a sink's
/// render path for a given number of samples, exactly as a device callback
/// would. Cloning shares the same devices.
///
/// # Example
///
/// ```
/// use echo_route::{AudioFormat, MockOutput, OutputDeviceInfo, OutputSink, SampleEncoding};
///
/// let output = MockOutput::new();
/// let mut sink = OutputSink::new(OutputDeviceInfo::new(0, "Speakers", 2));
/// sink.initialize(AudioFormat::new(48000, 2, SampleEncoding::Float32), &output)?;
/// sink.play()?;
///
/// // Nothing buffered yet: a full block of silence
/// assert_eq!(output.pull(sink.id(), 4), Some(vec![0.0; 4]));
/// # Ok::<(), echo_route::SinkError>(())
/// ```
#[derive(Clone, Default)]
pub struct MockOutput {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    devices: HashMap<usize, MockDevice>,
    failing: HashSet<usize>,
    opened: usize,
}

struct MockDevice {
    renderer: SinkRenderer,
    format: AudioFormat,
    playing: bool,
}

impl MockOutput {
    /// Creates a backend with no open devices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every future `open` of device `index` fail.
    pub fn fail_on(&self, index: usize) {
        self.state.lock().failing.insert(index);
    }

    /// Lets device `index` open again after [`fail_on`](Self::fail_on).
    pub fn recover(&self, index: usize) {
        self.state.lock().failing.remove(&index);
    }

    /// Renders `samples` interleaved samples for a playing sink.
    ///
    /// Returns `None` if the sink's device is not open or not playing.
    pub fn pull(&self, sink: SinkId, samples: usize) -> Option<Vec<f32>> {
        let mut state = self.state.lock();
        let device = state.devices.get_mut(&sink.index())?;
        if !device.playing {
            return None;
        }
        let mut out = vec![0.0; samples];
        device.renderer.render(&mut out);
        Some(out)
    }

    /// Returns `true` if the sink's device is open and playing.
    pub fn is_playing(&self, sink: SinkId) -> bool {
        self.state
            .lock()
            .devices
            .get(&sink.index())
            .is_some_and(|d| d.playing)
    }

    /// Returns `true` if the sink's device is open.
    pub fn is_open(&self, sink: SinkId) -> bool {
        self.state.lock().devices.contains_key(&sink.index())
    }

    /// Format the sink's device was opened with.
    pub fn format(&self, sink: SinkId) -> Option<AudioFormat> {
        self.state
            .lock()
            .devices
            .get(&sink.index())
            .map(|d| d.format)
    }

    /// Total successful `open` calls so far.
    pub fn open_count(&self) -> usize {
        self.state.lock().opened
    }
}

impl OutputBackend for MockOutput {
    fn open(
        &self,
        device: &OutputDeviceInfo,
        format: &AudioFormat,
        renderer: SinkRenderer,
    ) -> Result<Box<dyn PlaybackStream>, SinkError> {
        let mut state = self.state.lock();
        if state.failing.contains(&device.index) {
            return Err(SinkError::init_failed(format!(
                "mock device '{}' unavailable",
                device.name
            )));
        }
        state.devices.insert(
            device.index,
            MockDevice {
                renderer,
                format: *format,
                playing: false,
            },
        );
        state.opened += 1;
        Ok(Box::new(MockStream {
            index: device.index,
            state: Arc::clone(&self.state),
        }))
    }

    fn name(&self) -> &'static str {
        "mock output"
    }
}

struct MockStream {
    index: usize,
    state: Arc<Mutex<MockState>>,
}

impl MockStream {
    fn set_playing(&self, playing: bool) {
        if let Some(device) = self.state.lock().devices.get_mut(&self.index) {
            device.playing = playing;
        }
    }
}

impl PlaybackStream for MockStream {
    fn play(&mut self) -> Result<(), SinkError> {
        self.set_playing(true);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), SinkError> {
        self.set_playing(false);
        Ok(())
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.state.lock().devices.remove(&self.index);
    }
}
