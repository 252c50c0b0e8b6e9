//! The router: one loopback capture fanned out to many output sinks.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::builder::RouterBuilder;
use crate::capture::{BlockCallback, CaptureErrorCallback, LoopbackCapture};
use crate::config::RouterConfig;
use crate::event::{EventCallback, RouterEvent};
use crate::format::AudioFormat;
use crate::output::OutputBackend;
use crate::sink::{OutputSink, SinkFeed, SinkId};
use crate::{RouterError, SinkError};

/// Sinks receiving captured blocks, shared with the capture callback.
///
/// Membership changes take the write lock, so a sink removed on the
/// control thread is never written to by a block already in flight.
type FeedList = Arc<RwLock<Vec<Arc<SinkFeed>>>>;

/// Statistics about a routing session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    /// Captured blocks delivered to the fan-out.
    pub blocks_routed: u64,
    /// Total captured bytes.
    pub bytes_captured: u64,
    /// Sink writes that failed.
    pub write_failures: u64,
    /// Sink writes that dropped bytes because a buffer was full.
    pub overflows: u64,
}

/// Counters and flags updated from the capture thread.
struct RouterState {
    blocks_routed: AtomicU64,
    bytes_captured: AtomicU64,
    write_failures: AtomicU64,
    overflows: AtomicU64,
    /// Set by the capture stream's error callback.
    capture_lost: AtomicBool,
}

impl RouterState {
    fn new() -> Self {
        Self {
            blocks_routed: AtomicU64::new(0),
            bytes_captured: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            overflows: AtomicU64::new(0),
            capture_lost: AtomicBool::new(false),
        }
    }

    fn snapshot(&self) -> RouterStats {
        RouterStats {
            blocks_routed: self.blocks_routed.load(Ordering::Relaxed),
            bytes_captured: self.bytes_captured.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
        }
    }
}

/// Routes the system's output mix to a set of output devices.
///
/// The router owns a [`LoopbackCapture`] and an ordered set of
/// [`OutputSink`]s, at most one per device. On every captured block it
/// copies the bytes into each started sink's buffer; each device then
/// renders at its own pace through the sink's effects, delay, and volume.
///
/// One sink failing (to open, or to accept a block) is reported through
/// the event callback and never stops the others.
///
/// # Example
///
/// ```
/// use echo_route::effects::Delay;
/// use echo_route::{
///     AudioFormat, MockCapture, MockOutput, OutputDeviceInfo, OutputSink, Router,
///     SampleEncoding,
/// };
///
/// let format = AudioFormat::new(48000, 2, SampleEncoding::Float32);
/// let (capture, feed) = MockCapture::new(format);
/// let output = MockOutput::new();
///
/// let mut router = Router::builder()
///     .capture_backend(capture)
///     .output_backend(output.clone())
///     .on_event(|event| println!("{event}"))
///     .build();
///
/// let sink = OutputSink::new(OutputDeviceInfo::new(0, "Speakers", 2));
/// sink.add_effect(Delay::new().with_delay_ms(100.0));
/// let id = router.add_sink(sink)?;
///
/// router.start()?;
/// feed.push_sine(440.0, 20);
/// let rendered = output.pull(id, 960).unwrap();
/// assert_eq!(rendered.len(), 960);
///
/// router.stop();
/// # Ok::<(), echo_route::RouterError>(())
/// ```
pub struct Router {
    config: RouterConfig,
    capture: LoopbackCapture,
    output: Box<dyn OutputBackend>,
    sinks: Vec<OutputSink>,
    feeds: FeedList,
    event_callback: Option<EventCallback>,
    state: Arc<RouterState>,
    format: Option<AudioFormat>,
}

impl Router {
    /// Creates a new builder for configuring a router.
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub(crate) fn new(
        config: RouterConfig,
        capture: LoopbackCapture,
        output: Box<dyn OutputBackend>,
        event_callback: Option<EventCallback>,
    ) -> Self {
        Self {
            config,
            capture,
            output,
            sinks: Vec::new(),
            feeds: Arc::new(RwLock::new(Vec::new())),
            event_callback,
            state: Arc::new(RouterState::new()),
            format: None,
        }
    }

    /// Sends an event to the callback if configured.
    fn emit_event(&self, event: RouterEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(event);
        }
    }

    /// The configuration the router was built with.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Registers a sink and returns its id.
    ///
    /// The sink adopts the router's buffer duration and event callback. When
    /// the router is running the sink is initialized and played at once; a
    /// failure there is reported as [`RouterEvent::SinkError`] and the sink
    /// stays registered but stopped.
    ///
    /// # Errors
    ///
    /// - [`RouterError::DuplicateDevice`] if a sink for the same device exists
    /// - [`RouterError::TooManySinks`] if [`RouterConfig::max_sinks`] is reached
    pub fn add_sink(&mut self, mut sink: OutputSink) -> Result<SinkId, RouterError> {
        let id = sink.id();
        if self.sinks.iter().any(|s| s.id() == id) {
            return Err(RouterError::DuplicateDevice {
                sink: id,
                name: sink.name().to_string(),
            });
        }
        if self.sinks.len() >= self.config.max_sinks {
            return Err(RouterError::TooManySinks {
                max: self.config.max_sinks,
            });
        }

        sink.set_buffer_duration(self.config.buffer_duration);
        sink.set_events(self.event_callback.clone());

        let name = sink.name().to_string();
        tracing::info!(sink = %id, name = %name, "Sink added");
        self.emit_event(RouterEvent::SinkAdded {
            sink: id,
            name: name.clone(),
        });

        if let Some(format) = self.format {
            match start_sink(&mut sink, format, self.output.as_ref()) {
                Ok(()) => self.feeds.write().push(sink.feed()),
                Err(error) => sink.feed().report(error),
            }
        }

        self.sinks.push(sink);
        Ok(id)
    }

    /// Stops, disposes, and unregisters a sink, handing it back.
    ///
    /// The returned sink keeps its volume, delay, and effects. Returns `None`
    /// if no sink has this id.
    pub fn remove_sink(&mut self, id: SinkId) -> Option<OutputSink> {
        let position = self.sinks.iter().position(|s| s.id() == id)?;

        self.feeds.write().retain(|feed| feed.id() != id);
        let mut sink = self.sinks.remove(position);
        sink.dispose();
        sink.set_events(None);

        tracing::info!(sink = %id, name = %sink.name(), "Sink removed");
        self.emit_event(RouterEvent::SinkRemoved {
            sink: id,
            name: sink.name().to_string(),
        });
        Some(sink)
    }

    /// Starts capture and every sink.
    ///
    /// Each sink is initialized with the capture format and played. A sink
    /// that fails is reported through [`RouterEvent::SinkError`] and left
    /// stopped while the others proceed. Calling `start` while running does
    /// nothing. After a capture error the stale session is stopped and a
    /// fresh one started.
    ///
    /// # Errors
    ///
    /// - [`RouterError::NoSinksConfigured`] if no sink was added
    /// - [`RouterError::CaptureUnavailable`] if capture cannot start
    /// - [`RouterError::RoutingStartFailed`] if not a single sink started;
    ///   capture and every sink are torn down before returning
    pub fn start(&mut self) -> Result<(), RouterError> {
        if self.is_running() {
            return Ok(());
        }
        if self.format.is_some() {
            tracing::info!("Restarting routing after capture loss");
            self.stop();
        }
        if self.sinks.is_empty() {
            return Err(RouterError::NoSinksConfigured);
        }

        self.state.capture_lost.store(false, Ordering::Release);
        let on_block = self.block_callback();
        let on_error = self.capture_error_callback();
        let format = self.capture.start(on_block, on_error)?;

        let mut started = Vec::with_capacity(self.sinks.len());
        let mut failed = 0;
        for sink in &mut self.sinks {
            match start_sink(sink, format, self.output.as_ref()) {
                Ok(()) => started.push(sink.feed()),
                Err(error) => {
                    failed += 1;
                    sink.feed().report(error);
                }
            }
        }

        if started.is_empty() {
            self.capture.stop();
            for sink in &mut self.sinks {
                sink.dispose();
            }
            tracing::error!(failed, "No output device could be started");
            return Err(RouterError::RoutingStartFailed { failed });
        }

        let active_sinks = started.len();
        *self.feeds.write() = started;
        self.format = Some(format);

        tracing::info!(format = %format, active_sinks, failed, "Audio routing started");
        self.emit_event(RouterEvent::RoutingStarted {
            format,
            active_sinks,
        });
        Ok(())
    }

    /// Stops capture, then every sink. Idempotent and safe in any state.
    ///
    /// Sink configuration is kept for the next [`start`](Self::start).
    pub fn stop(&mut self) {
        self.capture.stop();
        self.feeds.write().clear();
        for sink in &mut self.sinks {
            sink.stop();
        }

        if self.format.take().is_some() {
            let stats = self.stats();
            tracing::info!(
                blocks_routed = stats.blocks_routed,
                write_failures = stats.write_failures,
                overflows = stats.overflows,
                "Audio routing stopped"
            );
            self.emit_event(RouterEvent::RoutingStopped);
        }
    }

    /// Returns `true` between a successful `start` and `stop`, as long as
    /// the capture stream has not reported an error.
    pub fn is_running(&self) -> bool {
        self.format.is_some() && !self.state.capture_lost.load(Ordering::Acquire)
    }

    /// Format negotiated with the capture endpoint while running.
    pub fn format(&self) -> Option<AudioFormat> {
        self.format.filter(|_| self.is_running())
    }

    /// Initializes and plays a registered sink again while routing runs.
    ///
    /// Use this to recover a sink whose device failed to open, or one that
    /// was stopped by hand. The sink rejoins the fan-out on success. When
    /// the router is not running this does nothing; the sink starts with
    /// the next [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// - [`RouterError::SinkNotFound`] if no sink has this id
    /// - [`RouterError::SinkStartFailed`] if the device cannot be started;
    ///   the sink stays registered and stopped
    pub fn restart_sink(&mut self, id: SinkId) -> Result<(), RouterError> {
        let position = self
            .sinks
            .iter()
            .position(|s| s.id() == id)
            .ok_or(RouterError::SinkNotFound { sink: id })?;
        let Some(format) = self.format() else {
            return Ok(());
        };

        self.feeds.write().retain(|feed| feed.id() != id);
        let sink = &mut self.sinks[position];
        match start_sink(sink, format, self.output.as_ref()) {
            Ok(()) => {
                tracing::info!(sink = %id, name = %sink.name(), "Sink restarted");
                self.feeds.write().push(sink.feed());
                Ok(())
            }
            Err(error) => {
                tracing::warn!(sink = %id, name = %sink.name(), error = %error, "Sink restart failed");
                Err(RouterError::SinkStartFailed { sink: id, error })
            }
        }
    }

    /// The sink for `id`, if registered.
    pub fn sink(&self, id: SinkId) -> Option<&OutputSink> {
        self.sinks.iter().find(|s| s.id() == id)
    }

    /// Mutable access to the sink for `id`, if registered.
    pub fn sink_mut(&mut self, id: SinkId) -> Option<&mut OutputSink> {
        self.sinks.iter_mut().find(|s| s.id() == id)
    }

    /// All registered sinks in the order they were added.
    pub fn sinks(&self) -> &[OutputSink] {
        &self.sinks
    }

    /// Counters since the router was built.
    pub fn stats(&self) -> RouterStats {
        self.state.snapshot()
    }

    /// Fans each captured block out to the started sinks, in order.
    fn block_callback(&self) -> BlockCallback {
        let feeds = Arc::clone(&self.feeds);
        let state = Arc::clone(&self.state);

        Box::new(move |block| {
            let bytes = block.bytes();
            state.blocks_routed.fetch_add(1, Ordering::Relaxed);
            state
                .bytes_captured
                .fetch_add(bytes.len() as u64, Ordering::Relaxed);

            for feed in feeds.read().iter() {
                if feed.is_paused() {
                    continue;
                }
                match feed.write(bytes) {
                    Ok(report) if report.overflowed() => {
                        state.overflows.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(_) => {}
                    Err(error) => {
                        state.write_failures.fetch_add(1, Ordering::Relaxed);
                        feed.report(SinkError::write_failed(error.to_string()));
                    }
                }
            }
        })
    }

    /// Marks the session lost and reports the capture error.
    fn capture_error_callback(&self) -> CaptureErrorCallback {
        let callback = self.event_callback.clone();
        let state = Arc::clone(&self.state);
        Box::new(move |reason| {
            state.capture_lost.store(true, Ordering::Release);
            tracing::warn!(reason = %reason, "Capture stream error, routing halted");
            if let Some(ref callback) = callback {
                callback(RouterEvent::CaptureError { reason });
            }
        })
    }
}

/// Initializes and plays one sink, leaving it disposed on failure.
fn start_sink(
    sink: &mut OutputSink,
    format: AudioFormat,
    output: &dyn OutputBackend,
) -> Result<(), SinkError> {
    sink.initialize(format, output)?;
    if let Err(error) = sink.play() {
        sink.dispose();
        return Err(error);
    }
    Ok(())
}

impl Drop for Router {
    fn drop(&mut self) {
        self.stop();
    }
}
