//! Configuration types for the router.

use std::time::Duration;

/// Default per-sink buffer length.
pub const DEFAULT_BUFFER_DURATION: Duration = Duration::from_secs(2);

/// Default maximum number of output devices.
pub const DEFAULT_MAX_SINKS: usize = 5;

/// Configuration for router behavior.
///
/// Use [`RouterConfig::default()`] for sensible defaults, or customize as needed.
///
/// # Example
///
/// ```
/// use echo_route::RouterConfig;
/// use std::time::Duration;
///
/// let config = RouterConfig {
///     buffer_duration: Duration::from_millis(500),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    /// Length of each sink's de-jitter buffer.
    ///
    /// When the buffer fills, newly captured bytes are discarded and a
    /// [`RouterEvent::BufferOverflow`] is emitted.
    /// Default: 2 seconds
    ///
    /// [`RouterEvent::BufferOverflow`]: crate::RouterEvent::BufferOverflow
    pub buffer_duration: Duration,

    /// Maximum number of sinks the router accepts.
    ///
    /// Default: 5
    pub max_sinks: usize,

    /// Capture endpoint id to open, or `None` for the system default output.
    ///
    /// Ids come from [`list_capture_endpoints()`](crate::list_capture_endpoints).
    pub capture_endpoint: Option<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            buffer_duration: DEFAULT_BUFFER_DURATION,
            max_sinks: DEFAULT_MAX_SINKS,
            capture_endpoint: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_config_defaults() {
        let config = RouterConfig::default();
        assert_eq!(config.buffer_duration, Duration::from_secs(2));
        assert_eq!(config.max_sinks, 5);
        assert!(config.capture_endpoint.is_none());
    }

    #[test]
    fn test_router_config_override() {
        let config = RouterConfig {
            max_sinks: 8,
            ..Default::default()
        };
        assert_eq!(config.max_sinks, 8);
        assert_eq!(config.buffer_duration, DEFAULT_BUFFER_DURATION);
    }
}
