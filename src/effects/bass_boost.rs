use super::biquad::{BiquadState, Coefficients};
use super::{EffectKernel, ParamSpec};

const SHELF_SLOPE: f32 = 0.707;

const PARAMS: &[ParamSpec] = &[
    ParamSpec::new("frequency", 20.0, 250.0, 100.0),
    ParamSpec::new("gain_db", 0.0, 12.0, 0.0),
];

/// Low-shelf boost below a corner frequency.
///
/// Bypassed entirely while `gain_db` is 0.
#[derive(Debug, Clone)]
pub struct BassBoost {
    enabled: bool,
    frequency: f32,
    gain_db: f32,
    sample_rate: u32,
    coefficients: Coefficients,
    states: Vec<BiquadState>,
}

impl BassBoost {
    /// Creates a bass boost at 100 Hz with 0 dB gain.
    pub fn new() -> Self {
        Self {
            enabled: true,
            frequency: PARAMS[0].default,
            gain_db: PARAMS[1].default,
            sample_rate: 0,
            coefficients: Coefficients::IDENTITY,
            states: Vec::new(),
        }
    }

    /// Sets the shelf corner frequency in Hz.
    #[must_use]
    pub fn with_frequency(mut self, hz: f32) -> Self {
        self.set_frequency(hz);
        self
    }

    /// Sets the boost in dB.
    #[must_use]
    pub fn with_gain_db(mut self, db: f32) -> Self {
        self.set_gain_db(db);
        self
    }

    /// Corner frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Boost in dB.
    pub fn gain_db(&self) -> f32 {
        self.gain_db
    }

    /// Sets the corner frequency, clamped to 20..=250 Hz.
    pub fn set_frequency(&mut self, hz: f32) {
        self.frequency = PARAMS[0].clamp(hz);
        self.update_coefficients();
    }

    /// Sets the boost, clamped to 0..=12 dB.
    pub fn set_gain_db(&mut self, db: f32) {
        self.gain_db = PARAMS[1].clamp(db);
        self.update_coefficients();
    }

    fn update_coefficients(&mut self) {
        if self.sample_rate > 0 {
            self.coefficients =
                Coefficients::low_shelf(self.sample_rate, self.frequency, SHELF_SLOPE, self.gain_db);
        }
    }
}

impl Default for BassBoost {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectKernel for BassBoost {
    fn name(&self) -> &'static str {
        "Bass Boost"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn params(&self) -> &'static [ParamSpec] {
        PARAMS
    }

    fn param(&self, name: &str) -> Option<f32> {
        match name {
            "frequency" => Some(self.frequency),
            "gain_db" => Some(self.gain_db),
            _ => None,
        }
    }

    fn write_param(&mut self, name: &str, value: f32) -> bool {
        match name {
            "frequency" => self.set_frequency(value),
            "gain_db" => self.set_gain_db(value),
            _ => return false,
        }
        true
    }

    fn prepare(&mut self, sample_rate: u32, channels: usize) {
        self.sample_rate = sample_rate;
        self.states = vec![BiquadState::default(); channels];
        self.update_coefficients();
    }

    fn release(&mut self) {
        self.sample_rate = 0;
        self.states = Vec::new();
    }

    fn is_prepared(&self) -> bool {
        !self.states.is_empty()
    }

    fn process(&mut self, block: &mut [f32]) {
        if self.states.is_empty() || self.gain_db <= 0.0 {
            return;
        }
        let channels = self.states.len();
        for (i, sample) in block.iter_mut().enumerate() {
            *sample = self.states[i % channels].process(&self.coefficients, *sample);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_gain_is_bypassed() {
        let mut boost = BassBoost::new();
        boost.prepare(48000, 2);
        let mut block = vec![0.3f32, -0.3, 0.7, -0.7];
        boost.process(&mut block);
        assert_eq!(block, vec![0.3, -0.3, 0.7, -0.7]);
    }

    #[test]
    fn test_boosts_low_frequencies() {
        let mut boost = BassBoost::new().with_gain_db(12.0);
        boost.prepare(48000, 1);

        // 40 Hz sine, one second; measure the steady-state peak
        let mut block: Vec<f32> = (0..48000)
            .map(|i| 0.1 * (2.0 * std::f32::consts::PI * 40.0 * i as f32 / 48000.0).sin())
            .collect();
        boost.process(&mut block);

        let peak = block[24000..].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.2, "peak {peak} should be boosted well above the input");
    }

    #[test]
    fn test_state_is_per_channel() {
        let mut boost = BassBoost::new().with_gain_db(6.0);
        boost.prepare(48000, 2);

        // Signal only on the left channel; right must stay silent
        let mut block = vec![0.0f32; 64];
        for frame in block.chunks_mut(2) {
            frame[0] = 0.5;
        }
        boost.process(&mut block);
        assert!(block.iter().skip(1).step_by(2).all(|s| *s == 0.0));
    }

    #[test]
    fn test_setters_clamp() {
        let mut boost = BassBoost::new();
        boost.set_frequency(5.0);
        boost.set_gain_db(40.0);
        assert_eq!(boost.frequency(), 20.0);
        assert_eq!(boost.gain_db(), 12.0);
    }
}
