//! Output sinks: one physical output device plus its buffer and effects.
//!
//! An [`OutputSink`] is split in two halves:
//!
//! - the control half (`OutputSink` itself), owned by the router and used
//!   on the control thread to initialize, play, stop, and reconfigure
//! - a shared feed, reached from the capture callback (to buffer captured
//!   bytes) and from the device callback (through a [`SinkRenderer`])
//!
//! Volume and delay live in atomics and the effect chain sits behind a
//! mutex that the render path locks once per block, so all settings can be
//! changed while audio is playing.

mod buffer;
mod render;

pub use buffer::WriteReport;
pub use render::SinkRenderer;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::config::DEFAULT_BUFFER_DURATION;
use crate::effects::{Effect, EffectChain, EffectId};
use crate::event::{EventCallback, RouterEvent};
use crate::format::AudioFormat;
use crate::output::{OutputBackend, OutputDeviceInfo, PlaybackStream};
use crate::{EffectError, SinkError};
use buffer::{sink_buffer, BufferWriter};

/// Longest per-sink output delay in milliseconds.
pub const MAX_OUTPUT_DELAY_MS: u32 = 2000;

/// Identifies a sink by the index of its output device.
///
/// Two sinks with the same id would drive the same device, so the router
/// rejects duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SinkId(usize);

impl SinkId {
    /// Creates an id from an output device index.
    pub const fn new(device_index: usize) -> Self {
        Self(device_index)
    }

    /// The output device index.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Running counters for one sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// Bytes accepted into the buffer.
    pub bytes_written: u64,
    /// Bytes discarded because the buffer was full.
    pub bytes_dropped: u64,
    /// Render calls that ran short of buffered audio.
    pub underruns: u64,
}

/// State shared between the control thread, capture callback, and device callback.
pub(crate) struct SinkFeed {
    id: SinkId,
    name: String,
    volume: AtomicU32,
    delay_ms: AtomicU32,
    paused: AtomicBool,
    /// Set while writes keep overflowing; cleared by a write that fits.
    overflowing: AtomicBool,
    pub(crate) chain: Mutex<EffectChain>,
    writer: Mutex<Option<BufferWriter>>,
    events: RwLock<Option<EventCallback>>,
    bytes_written: AtomicU64,
    bytes_dropped: AtomicU64,
    underruns: AtomicU64,
}

impl SinkFeed {
    fn new(id: SinkId, name: String) -> Self {
        Self {
            id,
            name,
            volume: AtomicU32::new(1.0f32.to_bits()),
            delay_ms: AtomicU32::new(0),
            paused: AtomicBool::new(false),
            overflowing: AtomicBool::new(false),
            chain: Mutex::new(EffectChain::new()),
            writer: Mutex::new(None),
            events: RwLock::new(None),
            bytes_written: AtomicU64::new(0),
            bytes_dropped: AtomicU64::new(0),
            underruns: AtomicU64::new(0),
        }
    }

    pub(crate) fn id(&self) -> SinkId {
        self.id
    }

    pub(crate) fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    pub(crate) fn delay_ms(&self) -> u32 {
        self.delay_ms.load(Ordering::Relaxed)
    }

    pub(crate) fn delay_frames(&self, sample_rate: u32) -> usize {
        let ms = f64::from(self.delay_ms());
        (f64::from(sample_rate) * ms / 1000.0).round() as usize
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub(crate) fn record_underrun(&self) {
        self.underruns.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn emit(&self, event: RouterEvent) {
        if let Some(callback) = self.events.read().as_ref() {
            callback(event);
        }
    }

    /// Logs a fault and reports it as a [`RouterEvent::SinkError`].
    pub(crate) fn report(&self, error: SinkError) {
        tracing::warn!(sink = %self.id, name = %self.name, error = %error, "Sink error");
        self.emit(RouterEvent::SinkError {
            sink: self.id,
            name: self.name.clone(),
            error,
        });
    }

    /// Appends captured bytes; never blocks on the render side.
    ///
    /// Every dropped byte is counted, but [`RouterEvent::BufferOverflow`]
    /// is emitted once per overflow episode: when a write first drops bytes
    /// after one that fit.
    pub(crate) fn write(&self, bytes: &[u8]) -> Result<WriteReport, SinkError> {
        let report = {
            let mut writer = self.writer.lock();
            let writer = writer.as_mut().ok_or(SinkError::NotInitialized)?;
            writer.push(bytes)
        };

        self.bytes_written
            .fetch_add(report.accepted as u64, Ordering::Relaxed);
        if report.overflowed() {
            self.bytes_dropped
                .fetch_add(report.dropped as u64, Ordering::Relaxed);
            tracing::trace!(sink = %self.id, dropped = report.dropped, "Buffer full");
            if !self.overflowing.swap(true, Ordering::Relaxed) {
                self.emit(RouterEvent::BufferOverflow {
                    sink: self.id,
                    name: self.name.clone(),
                    dropped_bytes: report.dropped,
                });
            }
        } else {
            self.overflowing.store(false, Ordering::Relaxed);
        }
        Ok(report)
    }

    fn stats(&self) -> SinkStats {
        SinkStats {
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_dropped: self.bytes_dropped.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
        }
    }
}

/// One output device in the routing set.
///
/// A sink is configured (volume, delay, effects) before or after it joins a
/// [`Router`](crate::Router); the router initializes it with the capture
/// format when routing starts. Configuration survives `stop`, `dispose`, and
/// removal from the router.
///
/// # Example
///
/// ```
/// use echo_route::effects::{BassBoost, Limiter};
/// use echo_route::{OutputDeviceInfo, OutputSink};
///
/// let device = OutputDeviceInfo::new(1, "Headphones", 2);
/// let mut sink = OutputSink::new(device)
///     .with_volume(0.8)
///     .with_delay_ms(120);
/// sink.add_effect(BassBoost::new().with_gain_db(6.0));
/// sink.add_effect(Limiter::new());
///
/// assert_eq!(sink.chain().len(), 2);
/// assert!(!sink.is_initialized());
/// ```
pub struct OutputSink {
    device: OutputDeviceInfo,
    feed: Arc<SinkFeed>,
    stream: Option<Box<dyn PlaybackStream>>,
    format: Option<AudioFormat>,
    buffer_duration: Duration,
    playing: bool,
}

impl OutputSink {
    /// Creates an idle sink for `device` at full volume with no delay.
    pub fn new(device: OutputDeviceInfo) -> Self {
        let feed = SinkFeed::new(SinkId::new(device.index), device.name.clone());
        Self {
            device,
            feed: Arc::new(feed),
            stream: None,
            format: None,
            buffer_duration: DEFAULT_BUFFER_DURATION,
            playing: false,
        }
    }

    /// Sets the initial volume.
    #[must_use]
    pub fn with_volume(self, volume: f32) -> Self {
        self.set_volume(volume);
        self
    }

    /// Sets the initial output delay.
    #[must_use]
    pub fn with_delay_ms(self, delay_ms: u32) -> Self {
        self.set_delay_ms(delay_ms);
        self
    }

    /// Sets the buffer length used by the next `initialize`.
    #[must_use]
    pub fn with_buffer_duration(mut self, duration: Duration) -> Self {
        self.buffer_duration = duration;
        self
    }

    /// Id derived from the device index.
    pub fn id(&self) -> SinkId {
        self.feed.id
    }

    /// Device display name.
    pub fn name(&self) -> &str {
        &self.device.name
    }

    /// The device this sink drives.
    pub fn device(&self) -> &OutputDeviceInfo {
        &self.device
    }

    /// Current volume in `[0, 1]`.
    pub fn volume(&self) -> f32 {
        self.feed.volume()
    }

    /// Sets the volume, clamped to `[0, 1]`, and returns the stored value.
    ///
    /// Applied from the next rendered block.
    pub fn set_volume(&self, volume: f32) -> f32 {
        let volume = if volume.is_nan() {
            1.0
        } else {
            volume.clamp(0.0, 1.0)
        };
        self.feed.volume.store(volume.to_bits(), Ordering::Relaxed);
        volume
    }

    /// Current output delay in milliseconds.
    pub fn delay_ms(&self) -> u32 {
        self.feed.delay_ms()
    }

    /// Sets the output delay, clamped to [`MAX_OUTPUT_DELAY_MS`], and
    /// returns the stored value.
    pub fn set_delay_ms(&self, delay_ms: u32) -> u32 {
        let delay_ms = delay_ms.min(MAX_OUTPUT_DELAY_MS);
        self.feed.delay_ms.store(delay_ms, Ordering::Relaxed);
        delay_ms
    }

    /// Buffer length used by `initialize`.
    pub fn buffer_duration(&self) -> Duration {
        self.buffer_duration
    }

    pub(crate) fn set_buffer_duration(&mut self, duration: Duration) {
        self.buffer_duration = duration;
    }

    pub(crate) fn set_events(&self, events: Option<EventCallback>) {
        *self.feed.events.write() = events;
    }

    pub(crate) fn feed(&self) -> Arc<SinkFeed> {
        Arc::clone(&self.feed)
    }

    /// Format the sink was initialized with.
    pub fn format(&self) -> Option<AudioFormat> {
        self.format
    }

    /// Returns `true` while the sink holds a buffer and an open device.
    pub fn is_initialized(&self) -> bool {
        self.stream.is_some()
    }

    /// Returns `true` while the device is playing.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Bytes waiting in the buffer (0 when not initialized).
    pub fn buffered_bytes(&self) -> usize {
        self.feed.writer.lock().as_ref().map_or(0, BufferWriter::occupied)
    }

    /// Buffer capacity in bytes (0 when not initialized).
    pub fn buffer_capacity(&self) -> usize {
        self.feed.writer.lock().as_ref().map_or(0, BufferWriter::capacity)
    }

    /// Counters since the sink was created.
    pub fn stats(&self) -> SinkStats {
        self.feed.stats()
    }

    /// Allocates the buffer, prepares effects, and opens the device.
    ///
    /// An already initialized sink is disposed first. On failure the sink
    /// holds no buffer, device, or effect state.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::DeviceInitFailed`] if the backend cannot open
    /// the device with `format`.
    pub fn initialize(
        &mut self,
        format: AudioFormat,
        backend: &dyn OutputBackend,
    ) -> Result<(), SinkError> {
        if self.is_initialized() {
            self.dispose();
        }

        let block_align = format.block_align();
        if block_align == 0 {
            return Err(SinkError::init_failed(format!("unusable format {format}")));
        }
        let capacity = format.bytes_for(self.buffer_duration);
        let (writer, reader) = sink_buffer(capacity, block_align);

        self.feed.chain.lock().prepare(format);
        let renderer = SinkRenderer::new(self.feed(), reader, format);

        let stream = match backend.open(&self.device, &format, renderer) {
            Ok(stream) => stream,
            Err(err) => {
                self.feed.chain.lock().release();
                return Err(err);
            }
        };

        tracing::info!(
            sink = %self.id(),
            name = %self.device.name,
            format = %format,
            buffer_bytes = writer.capacity(),
            "Sink initialized"
        );

        *self.feed.writer.lock() = Some(writer);
        self.feed.overflowing.store(false, Ordering::Relaxed);
        self.stream = Some(stream);
        self.format = Some(format);
        Ok(())
    }

    /// Appends captured bytes to the buffer without blocking.
    ///
    /// When the buffer is full the newest bytes are discarded, a
    /// [`RouterEvent::BufferOverflow`] is emitted, and the call still
    /// succeeds; the report says how much was dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::NotInitialized`] before `initialize` or after `stop`.
    pub fn write(&self, bytes: &[u8]) -> Result<WriteReport, SinkError> {
        self.feed.write(bytes)
    }

    /// Starts or resumes the device.
    ///
    /// # Errors
    ///
    /// [`SinkError::NotInitialized`] if there is no open device, or the
    /// backend's error if the device refuses to start.
    pub fn play(&mut self) -> Result<(), SinkError> {
        let stream = self.stream.as_mut().ok_or(SinkError::NotInitialized)?;
        stream.play()?;
        self.feed.paused.store(false, Ordering::Release);
        self.playing = true;
        Ok(())
    }

    /// Pauses the device, keeping it open.
    ///
    /// A paused sink is skipped by the capture fan-out, so resuming plays
    /// live audio rather than a stale backlog.
    ///
    /// # Errors
    ///
    /// [`SinkError::NotInitialized`] if there is no open device.
    pub fn pause(&mut self) -> Result<(), SinkError> {
        let stream = self.stream.as_mut().ok_or(SinkError::NotInitialized)?;
        self.feed.paused.store(true, Ordering::Release);
        stream.pause()?;
        self.playing = false;
        Ok(())
    }

    /// Stops the device and releases it and the buffer. Idempotent.
    pub fn stop(&mut self) {
        let had_stream = self.stream.take().is_some();
        self.feed.writer.lock().take();
        self.playing = false;
        if had_stream {
            tracing::debug!(sink = %self.id(), "Sink stopped");
        }
    }

    /// Stops the sink and frees every effect's per-channel state.
    pub fn dispose(&mut self) {
        self.stop();
        self.feed.chain.lock().release();
        self.format = None;
    }

    /// Locks the effect chain for inspection or direct edits.
    ///
    /// The render path waits on this lock, so keep the guard short-lived.
    pub fn chain(&self) -> MutexGuard<'_, EffectChain> {
        self.feed.chain.lock()
    }

    /// Appends an effect to the chain.
    pub fn add_effect(&self, effect: impl Into<Effect>) -> EffectId {
        self.feed.chain.lock().add(effect)
    }

    /// Removes an effect from the chain.
    pub fn remove_effect(&self, id: EffectId) -> Option<Effect> {
        self.feed.chain.lock().remove(id)
    }

    /// Removes every effect.
    pub fn clear_effects(&self) {
        self.feed.chain.lock().clear();
    }

    /// Enables or bypasses the whole chain.
    pub fn set_chain_enabled(&self, enabled: bool) {
        self.feed.chain.lock().set_enabled(enabled);
    }

    /// Sets one effect parameter, returning the clamped value.
    ///
    /// # Errors
    ///
    /// See [`EffectChain::set_param`].
    pub fn set_effect_param(&self, id: EffectId, name: &str, value: f32) -> Result<f32, EffectError> {
        self.feed.chain.lock().set_param(id, name, value)
    }

    /// Enables or bypasses one effect.
    ///
    /// # Errors
    ///
    /// See [`EffectChain::set_effect_enabled`].
    pub fn set_effect_enabled(&self, id: EffectId, enabled: bool) -> Result<(), EffectError> {
        self.feed.chain.lock().set_effect_enabled(id, enabled)
    }
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSink")
            .field("id", &self.id())
            .field("name", &self.device.name)
            .field("volume", &self.volume())
            .field("delay_ms", &self.delay_ms())
            .field("initialized", &self.is_initialized())
            .field("playing", &self.playing)
            .finish_non_exhaustive()
    }
}

impl Drop for OutputSink {
    fn drop(&mut self) {
        self.stop();
    }
}
