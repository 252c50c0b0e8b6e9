//! # echo-route
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Loopback audio routing with per-device effects.
//!
//! `echo-route` captures whatever the machine is playing and re-renders it,
//! independently, to any number of output devices. Every device gets its
//! own effect chain (bass boost, equalizer, compressor, limiter, delay,
//! reverb), volume, and delay offset, and one device failing never
//! disturbs the others.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use echo_route::effects::{BassBoost, Limiter};
//! use echo_route::{list_output_devices, OutputSink, Router};
//!
//! let mut router = Router::builder()
//!     .on_event(|e| tracing::info!(%e, "router event"))
//!     .build();
//!
//! for device in list_output_devices()?.into_iter().take(2) {
//!     let sink = OutputSink::new(device).with_volume(0.8);
//!     sink.add_effect(BassBoost::new().with_gain_db(6.0));
//!     sink.add_effect(Limiter::new());
//!     router.add_sink(sink)?;
//! }
//!
//! router.start()?;
//! // ... audio plays until
//! router.stop();
//! # Ok::<(), echo_route::RouterError>(())
//! ```
//!
//! ## Architecture
//!
//! The crate maintains a strict thread boundary:
//!
//! - **Capture Thread**: the loopback callback copies each block into every
//!   sink's buffer and never blocks
//! - **Ring Buffers**: one bounded SPSC queue per sink; when full, the newest
//!   bytes are dropped so a stalled device cannot back up capture
//! - **Device Threads**: each output device pulls from its own buffer and
//!   runs delay, effects, and volume at its own cadence
//!
//! Membership changes and settings are made from the control thread while
//! audio runs.

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod block;
mod builder;
pub mod capture;
mod config;
pub mod effects;
mod error;
mod event;
pub mod format;
pub mod output;
mod router;
mod sink;

pub use block::RawBlock;
pub use builder::RouterBuilder;
pub use capture::{
    list_capture_endpoints, BlockCallback, CaptureBackend, CaptureEndpoint, CaptureErrorCallback,
    CpalLoopback, LoopbackCapture, MockCapture, MockCaptureFeed,
};
pub use config::RouterConfig;
pub use error::{EffectError, RouterError, SinkError};
pub use event::{event_callback, event_channel, EventCallback, RouterEvent};
pub use format::{AudioFormat, SampleEncoding};
pub use output::{
    list_output_devices, CpalOutput, MockOutput, OutputBackend, OutputDeviceInfo, PlaybackStream,
};
pub use router::{Router, RouterStats};
pub use sink::{OutputSink, SinkId, SinkRenderer, SinkStats, WriteReport, MAX_OUTPUT_DELAY_MS};
