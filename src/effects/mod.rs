//! DSP effects and the per-sink effect chain.
//!
//! Every effect processes interleaved `f32` blocks in place and keeps its
//! own per-channel state (filter history, envelopes, delay lines). State is
//! sized by [`Effect::prepare`] from the session's [`AudioFormat`] and
//! survives across arbitrarily sized blocks, so a device asking for 441
//! frames and then 512 frames hears one continuous signal.
//!
//! The set of effects is closed:
//!
//! | Effect        | Parameters                                                   |
//! |---------------|--------------------------------------------------------------|
//! | [`BassBoost`] | `frequency`, `gain_db`                                       |
//! | [`Equalizer`] | `low_db`, `mid_db`, `high_db`                                |
//! | [`Compressor`]| `threshold_db`, `ratio`, `attack_ms`, `release_ms`, `makeup_db` |
//! | [`Limiter`]   | `threshold_db`                                               |
//! | [`Delay`]     | `delay_ms`, `feedback`, `wet`                                |
//! | [`Reverb`]    | `wet`, `room_size`                                           |
//!
//! Parameter writes are clamped to each parameter's range, never rejected.
//!
//! # Example
//!
//! ```
//! use echo_route::effects::{Delay, EffectChain, Limiter};
//! use echo_route::{AudioFormat, SampleEncoding};
//!
//! let mut chain = EffectChain::new();
//! let delay = chain.add(Delay::new().with_delay_ms(120.0).with_wet(0.4));
//! chain.add(Limiter::new());
//!
//! chain.prepare(AudioFormat::new(48000, 2, SampleEncoding::Float32));
//!
//! // Out-of-range writes are clamped
//! assert_eq!(chain.set_param(delay, "feedback", 5.0), Ok(0.9));
//!
//! let mut block = vec![0.0f32; 960];
//! chain.process(&mut block);
//! ```

mod bass_boost;
mod biquad;
mod chain;
mod compressor;
mod delay;
mod equalizer;
mod limiter;
mod reverb;

pub use bass_boost::BassBoost;
pub use chain::{EffectChain, EffectId};
pub use compressor::Compressor;
pub use delay::Delay;
pub use equalizer::Equalizer;
pub use limiter::Limiter;
pub use reverb::Reverb;

use crate::format::AudioFormat;
use crate::EffectError;

/// Describes one named effect control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    /// Parameter name used with [`Effect::set_param`].
    pub name: &'static str,
    /// Lowest accepted value.
    pub min: f32,
    /// Highest accepted value.
    pub max: f32,
    /// Value a freshly constructed effect starts with.
    pub default: f32,
}

impl ParamSpec {
    pub(crate) const fn new(name: &'static str, min: f32, max: f32, default: f32) -> Self {
        Self {
            name,
            min,
            max,
            default,
        }
    }

    /// Clamps `value` into this parameter's range. NaN maps to the default.
    #[must_use]
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.default;
        }
        value.clamp(self.min, self.max)
    }
}

/// Converts decibels to a linear amplitude factor.
#[inline]
pub(crate) fn db_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Converts a linear amplitude factor to decibels.
#[inline]
pub(crate) fn linear_to_db(linear: f32) -> f32 {
    20.0 * linear.log10()
}

pub(crate) fn unknown_param(effect: &'static str, name: &str) -> EffectError {
    EffectError::UnknownParameter {
        effect,
        name: name.to_string(),
    }
}

/// Contract shared by every effect kind.
pub(crate) trait EffectKernel {
    fn name(&self) -> &'static str;
    fn is_enabled(&self) -> bool;
    fn set_enabled(&mut self, enabled: bool);
    fn params(&self) -> &'static [ParamSpec];
    fn param(&self, name: &str) -> Option<f32>;
    /// Writes a clamped value. Returns `false` for unknown names.
    fn write_param(&mut self, name: &str, value: f32) -> bool;
    fn prepare(&mut self, sample_rate: u32, channels: usize);
    fn release(&mut self);
    fn is_prepared(&self) -> bool;
    fn process(&mut self, block: &mut [f32]);
}

/// One of the six effect kinds.
///
/// Construct the concrete effect, configure it, and convert it with `into()`
/// (or pass it straight to [`EffectChain::add`]).
#[derive(Debug, Clone)]
pub enum Effect {
    /// Low-shelf bass boost.
    BassBoost(BassBoost),
    /// Three-band equalizer.
    Equalizer(Equalizer),
    /// Downward compressor with makeup gain.
    Compressor(Compressor),
    /// Hard limiter.
    Limiter(Limiter),
    /// Feedback delay.
    Delay(Delay),
    /// Comb-bank reverb.
    Reverb(Reverb),
}

impl Effect {
    fn kernel(&self) -> &dyn EffectKernel {
        match self {
            Self::BassBoost(e) => e,
            Self::Equalizer(e) => e,
            Self::Compressor(e) => e,
            Self::Limiter(e) => e,
            Self::Delay(e) => e,
            Self::Reverb(e) => e,
        }
    }

    fn kernel_mut(&mut self) -> &mut dyn EffectKernel {
        match self {
            Self::BassBoost(e) => e,
            Self::Equalizer(e) => e,
            Self::Compressor(e) => e,
            Self::Limiter(e) => e,
            Self::Delay(e) => e,
            Self::Reverb(e) => e,
        }
    }

    /// Human-readable effect name.
    pub fn name(&self) -> &'static str {
        self.kernel().name()
    }

    /// Whether the chain applies this effect.
    pub fn is_enabled(&self) -> bool {
        self.kernel().is_enabled()
    }

    /// Enables or bypasses this effect without removing it from its chain.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.kernel_mut().set_enabled(enabled);
    }

    /// The named controls this effect exposes.
    pub fn params(&self) -> &'static [ParamSpec] {
        self.kernel().params()
    }

    /// Current value of a named control.
    pub fn param(&self, name: &str) -> Option<f32> {
        self.kernel().param(name)
    }

    /// Sets a named control, clamping to its range.
    ///
    /// Returns the value actually stored.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError::UnknownParameter`] if the effect has no control
    /// with this name.
    pub fn set_param(&mut self, name: &str, value: f32) -> Result<f32, EffectError> {
        let kernel = self.kernel_mut();
        if !kernel.write_param(name, value) {
            return Err(unknown_param(kernel.name(), name));
        }
        kernel
            .param(name)
            .ok_or_else(|| unknown_param(kernel.name(), name))
    }

    /// Allocates per-channel state for `format`, discarding any previous state.
    pub fn prepare(&mut self, format: &AudioFormat) {
        self.kernel_mut()
            .prepare(format.sample_rate, usize::from(format.channels));
    }

    /// Frees per-channel state. Parameters are kept.
    pub fn release(&mut self) {
        self.kernel_mut().release();
    }

    /// Returns `true` once per-channel state exists.
    pub fn is_prepared(&self) -> bool {
        self.kernel().is_prepared()
    }

    /// Processes an interleaved block in place.
    ///
    /// Unprepared effects leave the block untouched. The enable flag is the
    /// chain's concern; this always runs the effect.
    pub fn process(&mut self, block: &mut [f32]) {
        self.kernel_mut().process(block);
    }
}

macro_rules! impl_into_effect {
    ($($kind:ident),*) => {
        $(
            impl From<$kind> for Effect {
                fn from(effect: $kind) -> Self {
                    Self::$kind(effect)
                }
            }
        )*
    };
}

impl_into_effect!(BassBoost, Equalizer, Compressor, Limiter, Delay, Reverb);
