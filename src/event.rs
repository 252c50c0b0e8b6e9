//! Runtime events for observing the router.
//!
//! Events are push notifications about lifecycle transitions and isolated
//! faults. The router keeps running after any event is emitted; they exist
//! so a UI or logger can follow along without the core depending on it.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::format::AudioFormat;
use crate::sink::SinkId;
use crate::SinkError;

/// Events emitted by the [`Router`](crate::Router) and its sinks.
///
/// Status transitions (`SinkAdded`, `SinkRemoved`, `RoutingStarted`,
/// `RoutingStopped`) render as human-readable text through [`Display`].
/// Faults carry the id of the sink they belong to.
///
/// # Example
///
/// ```
/// use echo_route::RouterEvent;
///
/// fn handle_event(event: RouterEvent) {
///     match event {
///         RouterEvent::SinkError { sink, name, error } => {
///             eprintln!("{name} ({sink}) failed: {error}");
///         }
///         RouterEvent::BufferOverflow { name, dropped_bytes, .. } => {
///             eprintln!("{name} dropped {dropped_bytes} bytes");
///         }
///         other if other.is_status() => println!("{other}"),
///         other => eprintln!("{other}"),
///     }
/// }
/// ```
///
/// [`Display`]: std::fmt::Display
#[derive(Debug, Clone)]
pub enum RouterEvent {
    /// A sink was registered with the router.
    SinkAdded {
        /// Id of the new sink.
        sink: SinkId,
        /// Display name of the device.
        name: String,
    },

    /// A sink was stopped, disposed, and removed from the router.
    SinkRemoved {
        /// Id of the removed sink.
        sink: SinkId,
        /// Display name of the device.
        name: String,
    },

    /// Capture started and at least one sink is playing.
    RoutingStarted {
        /// Format negotiated with the capture endpoint.
        format: AudioFormat,
        /// Number of sinks that started playing.
        active_sinks: usize,
    },

    /// Capture and all sinks were stopped.
    RoutingStopped,

    /// A single sink failed; the others keep running.
    SinkError {
        /// Id of the failing sink.
        sink: SinkId,
        /// Display name of the device.
        name: String,
        /// What went wrong.
        error: SinkError,
    },

    /// A sink's buffer was full and the newest captured bytes were discarded.
    ///
    /// This happens when a device renders slower than the capture produces,
    /// or when it stalls. The sink glitches audibly but never blocks capture
    /// or the other sinks. Emitted once when a sink starts overflowing; the
    /// next overflow after a write that fits is reported again.
    BufferOverflow {
        /// Id of the overflowing sink.
        sink: SinkId,
        /// Display name of the device.
        name: String,
        /// Number of bytes discarded by the first overflowing write.
        dropped_bytes: usize,
    },

    /// The capture stream reported an error and routing has halted.
    ///
    /// [`Router::is_running`](crate::Router::is_running) turns `false`;
    /// calling `start` again opens a fresh session.
    CaptureError {
        /// Description reported by the capture backend.
        reason: String,
    },
}

impl RouterEvent {
    /// Returns `true` for lifecycle status transitions.
    pub fn is_status(&self) -> bool {
        matches!(
            self,
            Self::SinkAdded { .. }
                | Self::SinkRemoved { .. }
                | Self::RoutingStarted { .. }
                | Self::RoutingStopped
        )
    }

    /// Returns the sink this event refers to, if any.
    pub fn sink(&self) -> Option<SinkId> {
        match self {
            Self::SinkAdded { sink, .. }
            | Self::SinkRemoved { sink, .. }
            | Self::SinkError { sink, .. }
            | Self::BufferOverflow { sink, .. } => Some(*sink),
            Self::RoutingStarted { .. } | Self::RoutingStopped | Self::CaptureError { .. } => None,
        }
    }
}

impl fmt::Display for RouterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SinkAdded { name, .. } => write!(f, "Added device: {name}"),
            Self::SinkRemoved { name, .. } => write!(f, "Removed device: {name}"),
            Self::RoutingStarted {
                format,
                active_sinks,
            } => write!(
                f,
                "Audio routing started ({format}, {active_sinks} device(s))"
            ),
            Self::RoutingStopped => f.write_str("Audio routing stopped"),
            Self::SinkError { name, error, .. } => {
                write!(f, "Error on device {name}: {error}")
            }
            Self::BufferOverflow {
                name,
                dropped_bytes,
                ..
            } => write!(f, "Buffer full on device {name}: dropped {dropped_bytes} bytes"),
            Self::CaptureError { reason } => write!(f, "Capture error: {reason}"),
        }
    }
}

/// Callback type for receiving runtime events.
///
/// Register an event callback via [`RouterBuilder::on_event()`]. The callback
/// may be invoked from the capture thread or a device thread, so it should
/// return quickly.
///
/// [`RouterBuilder::on_event()`]: crate::RouterBuilder::on_event
pub type EventCallback = Arc<dyn Fn(RouterEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use echo_route::{event_callback, RouterEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(RouterEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Creates an [`EventCallback`] that forwards into a tokio channel.
///
/// The sender side never blocks, so the callback is safe to invoke from
/// audio threads. Events sent after the receiver is dropped are discarded.
///
/// # Example
///
/// ```
/// use echo_route::event_channel;
///
/// let (callback, mut events) = event_channel();
/// // Pass `callback` to RouterBuilder::event_callback, then:
/// // while let Some(event) = events.recv().await { ... }
/// # drop(callback);
/// # assert!(events.try_recv().is_err());
/// ```
pub fn event_channel() -> (EventCallback, mpsc::UnboundedReceiver<RouterEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback = event_callback(move |event| {
        let _ = tx.send(event);
    });
    (callback, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::SampleEncoding;

    #[test]
    fn test_status_text() {
        let event = RouterEvent::SinkAdded {
            sink: SinkId::new(1),
            name: "Headphones".to_string(),
        };
        assert!(event.is_status());
        assert_eq!(event.to_string(), "Added device: Headphones");
        assert_eq!(RouterEvent::RoutingStopped.to_string(), "Audio routing stopped");
    }

    #[test]
    fn test_routing_started_text() {
        let event = RouterEvent::RoutingStarted {
            format: AudioFormat::new(48000, 2, SampleEncoding::Float32),
            active_sinks: 2,
        };
        assert_eq!(
            event.to_string(),
            "Audio routing started (48000Hz/2ch/32-bit float, 2 device(s))"
        );
    }

    #[test]
    fn test_fault_refers_to_sink() {
        let event = RouterEvent::SinkError {
            sink: SinkId::new(3),
            name: "HDMI".to_string(),
            error: SinkError::NotInitialized,
        };
        assert!(!event.is_status());
        assert_eq!(event.sink(), Some(SinkId::new(3)));
        assert_eq!(RouterEvent::RoutingStopped.sink(), None);
    }

    #[test]
    fn test_event_callback_helper() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let callback = event_callback(move |_| {
            called_clone.store(true, Ordering::SeqCst);
        });

        callback(RouterEvent::RoutingStopped);
        assert!(called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_event_channel_delivers_in_order() {
        let (callback, mut rx) = event_channel();
        callback(RouterEvent::RoutingStopped);
        callback(RouterEvent::CaptureError {
            reason: "device unplugged".to_string(),
        });

        assert!(matches!(rx.recv().await, Some(RouterEvent::RoutingStopped)));
        assert!(matches!(
            rx.recv().await,
            Some(RouterEvent::CaptureError { .. })
        ));
    }

    #[test]
    fn test_event_channel_survives_dropped_receiver() {
        let (callback, rx) = event_channel();
        drop(rx);
        callback(RouterEvent::RoutingStopped);
    }
}
