//! Error types for echo-route.
//!
//! Errors are split into two categories:
//! - **Fatal errors** ([`RouterError`]): returned synchronously from control calls
//! - **Per-sink faults** ([`SinkError`]): isolated to one output and surfaced via
//!   [`RouterEvent::SinkError`](crate::RouterEvent::SinkError) when they happen
//!   on the audio path

use crate::sink::SinkId;

/// Errors returned from [`Router`](crate::Router) control operations.
///
/// Runtime issues on the audio path (a sink's device failing to open, a
/// write failing, buffer overflow) are reported through the event callback
/// instead and never fail the call that triggered them.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// No loopback endpoint exists, or the OS refused to open it.
    #[error("loopback capture unavailable: {reason}")]
    CaptureUnavailable {
        /// Why capture could not be started.
        reason: String,
    },

    /// A sink for the same output device is already registered.
    #[error("device '{name}' ({sink}) is already added")]
    DuplicateDevice {
        /// Id of the device that was added twice.
        sink: SinkId,
        /// Display name of the device.
        name: String,
    },

    /// `start()` was called with no sinks registered.
    #[error("no output devices configured - add at least one sink")]
    NoSinksConfigured,

    /// Capture started but not a single sink could be initialized.
    #[error("routing failed to start: all {failed} output device(s) failed to initialize")]
    RoutingStartFailed {
        /// Number of sinks that failed.
        failed: usize,
    },

    /// The configured sink limit was reached.
    #[error("maximum of {max} output devices supported")]
    TooManySinks {
        /// The configured limit.
        max: usize,
    },

    /// No sink is registered under the given id.
    #[error("no output device registered as {sink}")]
    SinkNotFound {
        /// The id that was looked up.
        sink: SinkId,
    },

    /// A sink restarted by hand could not be initialized or played.
    #[error("output device {sink} failed to start: {error}")]
    SinkStartFailed {
        /// Id of the sink.
        sink: SinkId,
        /// What went wrong.
        #[source]
        error: SinkError,
    },

    /// An error from the underlying audio library (CPAL).
    #[error("audio backend error: {0}")]
    Backend(String),
}

impl RouterError {
    /// Creates a capture-unavailable error with the given reason.
    pub fn capture_unavailable(reason: impl Into<String>) -> Self {
        Self::CaptureUnavailable {
            reason: reason.into(),
        }
    }
}

/// Faults isolated to a single [`OutputSink`](crate::OutputSink).
///
/// Sink errors never stop other sinks. The router reports them through
/// [`RouterEvent::SinkError`](crate::RouterEvent::SinkError) and leaves the
/// offending sink stopped; nothing is retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// The physical output could not be opened or armed.
    #[error("device initialization failed: {reason}")]
    DeviceInitFailed {
        /// Underlying reason reported by the backend.
        reason: String,
    },

    /// The sink was used before `initialize` or after `stop`.
    #[error("sink not initialized (call initialize first)")]
    NotInitialized,

    /// Delivering captured bytes to the sink failed.
    #[error("write failed: {reason}")]
    WriteFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// The device reported an error while playing.
    #[error("playback error: {reason}")]
    Playback {
        /// Description reported by the device.
        reason: String,
    },
}

impl SinkError {
    /// Creates a device-init error with the given reason.
    pub fn init_failed(reason: impl Into<String>) -> Self {
        Self::DeviceInitFailed {
            reason: reason.into(),
        }
    }

    /// Creates a playback error with the given reason.
    pub fn playback(reason: impl Into<String>) -> Self {
        Self::Playback {
            reason: reason.into(),
        }
    }

    /// Creates a write-failed error with the given reason.
    pub fn write_failed(reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            reason: reason.into(),
        }
    }
}

/// Errors from effect parameter access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EffectError {
    /// The effect has no parameter with this name.
    #[error("effect '{effect}' has no parameter '{name}'")]
    UnknownParameter {
        /// Name of the effect.
        effect: &'static str,
        /// The parameter name that was requested.
        name: String,
    },

    /// No effect in the chain has the given id.
    #[error("no effect with id {0} in chain")]
    EffectNotFound(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_error_display() {
        let err = RouterError::DuplicateDevice {
            sink: SinkId::new(2),
            name: "Speakers".to_string(),
        };
        assert_eq!(err.to_string(), "device 'Speakers' (#2) is already added");
    }

    #[test]
    fn test_capture_unavailable() {
        let err = RouterError::capture_unavailable("no default output device");
        assert_eq!(
            err.to_string(),
            "loopback capture unavailable: no default output device"
        );
    }

    #[test]
    fn test_sink_start_failed_keeps_source() {
        use std::error::Error;

        let err = RouterError::SinkStartFailed {
            sink: SinkId::new(3),
            error: SinkError::init_failed("device busy"),
        };
        assert_eq!(
            err.to_string(),
            "output device #3 failed to start: device initialization failed: device busy"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_sink_error_init_failed() {
        let err = SinkError::init_failed("device busy");
        assert_eq!(err.to_string(), "device initialization failed: device busy");
    }

    #[test]
    fn test_effect_error_unknown_parameter() {
        let err = EffectError::UnknownParameter {
            effect: "Limiter",
            name: "ratio".to_string(),
        };
        assert!(err.to_string().contains("ratio"));
    }
}
